//! Single-flight token refresh
//!
//! The coordinator owns the one authoritative in-flight refresh. However
//! many callers request a refresh concurrently, at most one network call to
//! the refresh endpoint is outstanding, and every caller receives the
//! outcome of that single call.

use log::{debug, warn};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::error::Error;
use crate::events::{LogoutReason, SessionEvent, SessionEventBus};
use crate::session::TokenResponse;
use crate::storage::SessionStore;

/// Path of the token refresh endpoint, relative to the API base URL
pub(crate) const REFRESH_PATH: &str = "/auth/refresh";

/// Outcome shared between all waiters of one refresh attempt.
/// Broadcast payloads must be cloneable, so this is a separate enum from
/// the public error type.
#[derive(Debug, Clone)]
enum RefreshOutcome {
    Refreshed(String),
    TokenExpired,
    Failed(String),
}

struct Inner {
    http: reqwest::Client,
    refresh_url: String,
    store: Arc<SessionStore>,
    events: SessionEventBus,
    inflight: Mutex<Option<broadcast::Sender<RefreshOutcome>>>,
}

/// Deduplicates concurrent refresh requests into a single network call
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: &str,
        store: Arc<SessionStore>,
        events: SessionEventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                refresh_url: format!("{}{}", base_url, REFRESH_PATH),
                store,
                events,
                inflight: Mutex::new(None),
            }),
        }
    }

    /// Refresh the access token, joining the in-flight attempt if one
    /// exists.
    ///
    /// On success every waiter resolves with the new access token and the
    /// store holds the replacement session. On failure the session is
    /// destroyed, a single `logout` is published, and every waiter gets the
    /// same error. Either way the coordinator is idle again before any
    /// waiter observes the outcome, so a refresh requested afterwards
    /// starts a fresh attempt.
    pub async fn refresh(&self) -> Result<String, Error> {
        let mut receiver = {
            let mut slot = self.inner.inflight.lock().unwrap();
            let joined = slot.as_ref().map(|sender| sender.subscribe());
            match joined {
                Some(receiver) => {
                    debug!("joining in-flight token refresh");
                    receiver
                }
                None => {
                    let (sender, receiver) = broadcast::channel(1);
                    *slot = Some(sender.clone());

                    // The spawned task owns the network call: a waiter
                    // dropping its future cannot strand the others.
                    let inner = Arc::clone(&self.inner);
                    tokio::spawn(async move {
                        let outcome = execute(&inner).await;
                        // Reset to idle strictly before fan-out, so every
                        // waiter sees a settled coordinator.
                        *inner.inflight.lock().unwrap() = None;
                        let _ = sender.send(outcome);
                    });
                    receiver
                }
            }
        };

        match receiver.recv().await {
            Ok(RefreshOutcome::Refreshed(token)) => Ok(token),
            Ok(RefreshOutcome::TokenExpired) => Err(Error::RefreshTokenExpired),
            Ok(RefreshOutcome::Failed(msg)) => Err(Error::RefreshFailed(msg)),
            Err(_) => Err(Error::RefreshFailed("refresh task aborted".to_string())),
        }
    }
}

async fn execute(inner: &Inner) -> RefreshOutcome {
    // An absent session and one whose refresh token has expired both read
    // as `None`; in either case there is nothing to exchange.
    let session = match inner.store.read() {
        Some(session) => session,
        None => return deny_expired(inner),
    };

    debug!("refreshing access token");
    let result = inner
        .http
        .post(&inner.refresh_url)
        .bearer_auth(&session.refresh_token)
        .send()
        .await;

    let response = match result {
        Ok(response) => response,
        Err(err) => return fail(inner, format!("refresh request failed: {}", err)),
    };

    if !response.status().is_success() {
        return fail(
            inner,
            format!("refresh endpoint returned {}", response.status()),
        );
    }

    let body = match response.json::<TokenResponse>().await {
        Ok(body) => body,
        Err(err) => return fail(inner, format!("invalid refresh response: {}", err)),
    };

    // Replace all token fields atomically, keeping the persistence choice
    // made at login.
    let new_session = body.into_session(session.persistence);
    let access_token = new_session.access_token.clone();
    if let Err(err) = inner.store.write(&new_session) {
        return fail(inner, format!("failed to persist session: {}", err));
    }

    debug!("access token refreshed");
    RefreshOutcome::Refreshed(access_token)
}

fn deny_expired(inner: &Inner) -> RefreshOutcome {
    if inner.store.clear() {
        warn!("refresh token expired, destroying session");
        inner.events.publish(&SessionEvent::Logout {
            reason: LogoutReason::TokenExpired,
        });
    }
    RefreshOutcome::TokenExpired
}

fn fail(inner: &Inner, msg: String) -> RefreshOutcome {
    warn!("token refresh failed: {}", msg);
    if inner.store.clear() {
        inner.events.publish(&SessionEvent::Logout {
            reason: LogoutReason::TokenRefreshFailed,
        });
    }
    RefreshOutcome::Failed(msg)
}
