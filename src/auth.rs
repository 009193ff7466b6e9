//! Login, registration and logout against the FreightOps issuer

use log::debug;
use serde_json::json;
use std::sync::Arc;

use crate::error::Error;
use crate::events::{LogoutReason, SessionEvent, SessionEventBus};
use crate::session::{Persistence, Session, TokenResponse};
use crate::storage::SessionStore;

/// Client for session creation and destruction
pub struct Auth {
    http: reqwest::Client,
    base_url: String,
    store: Arc<SessionStore>,
    events: SessionEventBus,
}

impl Auth {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: String,
        store: Arc<SessionStore>,
        events: SessionEventBus,
    ) -> Self {
        Self {
            http,
            base_url,
            store,
            events,
        }
    }

    /// Sign in with email and password.
    ///
    /// `remember_me` selects durable persistence; the choice is made once
    /// here and kept for the lifetime of the session. A successful sign-in
    /// fully replaces any prior session and publishes a `Login` event.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<Session, Error> {
        let body = json!({ "email": email, "password": password });
        self.create_session("/auth/login", &body, remember_me).await
    }

    /// Register a new account, signing in on success
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: Option<serde_json::Value>,
        remember_me: bool,
    ) -> Result<Session, Error> {
        let mut body = json!({ "email": email, "password": password });
        if let Some(profile) = profile {
            body["profile"] = profile;
        }
        self.create_session("/auth/register", &body, remember_me)
            .await
    }

    async fn create_session(
        &self,
        path: &str,
        body: &serde_json::Value,
        remember_me: bool,
    ) -> Result<Session, Error> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::BAD_REQUEST
        {
            // The stored session, if any, is left untouched.
            return Err(Error::InvalidCredentials);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(format!(
                "authentication failed with status {}: {}",
                status, text
            )));
        }

        let body = response.json::<TokenResponse>().await?;
        let persistence = if remember_me {
            Persistence::Durable
        } else {
            Persistence::Ephemeral
        };
        let session = body.into_session(persistence);
        self.store.write(&session)?;

        debug!("session created");
        self.events.publish(&SessionEvent::Login {
            user: session.user.clone(),
        });
        Ok(session)
    }

    /// Destroy the current session.
    ///
    /// Clears both stores and publishes a single `Logout` with reason
    /// `user_initiated`. Idempotent: a second call, or a concurrent call
    /// from another site, finds nothing to clear and publishes nothing.
    pub fn sign_out(&self) {
        if self.store.clear() {
            debug!("session destroyed by user");
            self.events.publish(&SessionEvent::Logout {
                reason: LogoutReason::UserInitiated,
            });
        }
    }

    /// The current session, if one exists and is still refreshable
    pub fn current_session(&self) -> Option<Session> {
        self.store.read()
    }

    /// The cached profile of the current user
    pub fn current_user(&self) -> Option<serde_json::Value> {
        self.store.read().map(|session| session.user)
    }
}
