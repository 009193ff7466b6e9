//! Process-wide session event bus
//!
//! Carries login/logout notifications so disconnected parts of the
//! application can react to session changes without direct coupling.
//! Purely in-memory; fan-out is synchronous and in subscription order.

use log::warn;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// Why a session was destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    UserInitiated,
    TokenExpired,
    TokenRefreshFailed,
    Unauthorized,
}

impl LogoutReason {
    /// The wire name of the reason
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserInitiated => "user_initiated",
            Self::TokenExpired => "token_expired",
            Self::TokenRefreshFailed => "token_refresh_failed",
            Self::Unauthorized => "unauthorized",
        }
    }
}

/// A session-state change
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A session was created
    Login { user: serde_json::Value },
    /// The session was destroyed
    Logout { reason: LogoutReason },
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Login { .. } => EventKind::Login,
            Self::Logout { .. } => EventKind::Logout,
        }
    }
}

/// Which events a subscriber wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Login,
    Logout,
}

type Handler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

struct BusState {
    next_id: u64,
    subscribers: Vec<(u64, EventKind, Handler)>,
}

/// Typed publish/subscribe channel for session events
#[derive(Clone)]
pub struct SessionEventBus {
    state: Arc<Mutex<BusState>>,
}

impl Default for SessionEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEventBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Register a handler for events of `kind`. The handler stays
    /// registered until the returned subscription is explicitly
    /// unsubscribed; dropping the handle does not detach it.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, kind, Arc::new(handler)));
        Subscription {
            state: Arc::clone(&self.state),
            id,
        }
    }

    /// Deliver `event` to every matching subscriber, in subscription order.
    /// A panicking subscriber is logged and does not prevent the remaining
    /// subscribers from running.
    pub fn publish(&self, event: &SessionEvent) {
        let handlers: Vec<Handler> = {
            let state = self.state.lock().unwrap();
            state
                .subscribers
                .iter()
                .filter(|(_, kind, _)| *kind == event.kind())
                .map(|(_, _, handler)| Arc::clone(handler))
                .collect()
        };

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!("session event subscriber panicked");
            }
        }
    }
}

/// Handle for removing a subscriber from the bus
pub struct Subscription {
    state: Arc<Mutex<BusState>>,
    id: u64,
}

impl Subscription {
    /// Remove the handler from the bus
    pub fn unsubscribe(self) {
        let mut state = self.state.lock().unwrap();
        state.subscribers.retain(|(id, _, _)| *id != self.id);
    }
}
