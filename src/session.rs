//! Session entity and wire types

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which store holds the session, chosen once at login from the
/// "remember me" preference and never changed mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Kept only for the lifetime of the process
    Ephemeral,
    /// Persisted across restarts
    Durable,
}

/// The current authenticated session.
///
/// All four token fields are replaced together on login and on every
/// successful refresh; a failed refresh leaves the session untouched.
#[derive(Debug, Clone)]
pub struct Session {
    /// Short-lived credential attached to outbound calls
    pub access_token: String,

    /// Longer-lived credential used only against the refresh endpoint
    pub refresh_token: String,

    /// Access token expiry, epoch milliseconds
    pub access_token_expires_at: i64,

    /// Refresh token expiry, epoch milliseconds
    pub refresh_token_expires_at: i64,

    /// Opaque user profile returned by the issuer
    pub user: serde_json::Value,

    /// Which store holds this session
    pub persistence: Persistence,
}

impl Session {
    /// Whether the access token is within `buffer` of expiry
    pub fn is_access_token_expired(&self, buffer: Duration) -> bool {
        now_ms() + buffer.as_millis() as i64 >= self.access_token_expires_at
    }

    /// Whether the refresh token has expired
    pub fn is_refresh_token_expired(&self) -> bool {
        now_ms() >= self.refresh_token_expires_at
    }
}

/// On-disk/in-store session layout. Field names are shared between the
/// ephemeral and durable media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub auth_token: String,
    pub refresh_token: String,
    pub token_expiration_date: i64,
    pub refresh_token_expiration_date: i64,
    pub user: serde_json::Value,
}

impl PersistedSession {
    pub(crate) fn from_session(session: &Session) -> Self {
        Self {
            auth_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            token_expiration_date: session.access_token_expires_at,
            refresh_token_expiration_date: session.refresh_token_expires_at,
            user: session.user.clone(),
        }
    }

    pub(crate) fn into_session(self, persistence: Persistence) -> Session {
        Session {
            access_token: self.auth_token,
            refresh_token: self.refresh_token,
            access_token_expires_at: self.token_expiration_date,
            refresh_token_expires_at: self.refresh_token_expiration_date,
            user: self.user,
            persistence,
        }
    }
}

/// Body returned by the issuer on login, registration and refresh.
/// Expiration fields are epoch milliseconds; `payload` is the user profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub auth_token: String,
    pub refresh_token: String,
    pub token_expiration_date: i64,
    pub refresh_token_expiration_date: i64,
    pub payload: serde_json::Value,
}

impl TokenResponse {
    pub(crate) fn into_session(self, persistence: Persistence) -> Session {
        Session {
            access_token: self.auth_token,
            refresh_token: self.refresh_token,
            access_token_expires_at: self.token_expiration_date,
            refresh_token_expires_at: self.refresh_token_expiration_date,
            user: self.payload,
            persistence,
        }
    }
}

/// Current time in epoch milliseconds
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(access_in_ms: i64, refresh_in_ms: i64) -> Session {
        let now = now_ms();
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            access_token_expires_at: now + access_in_ms,
            refresh_token_expires_at: now + refresh_in_ms,
            user: json!({ "id": "u1" }),
            persistence: Persistence::Ephemeral,
        }
    }

    #[test]
    fn access_token_expiry_respects_buffer() {
        let s = session(30_000, 600_000);
        assert!(s.is_access_token_expired(Duration::from_secs(60)));

        let s = session(120_000, 600_000);
        assert!(!s.is_access_token_expired(Duration::from_secs(60)));
    }

    #[test]
    fn refresh_token_expiry_uses_no_buffer() {
        let s = session(-1_000, 600_000);
        assert!(!s.is_refresh_token_expired());

        let s = session(-10_000, -1_000);
        assert!(s.is_refresh_token_expired());
    }

    #[test]
    fn persisted_layout_uses_wire_field_names() {
        let s = session(60_000, 600_000);
        let value = serde_json::to_value(PersistedSession::from_session(&s)).unwrap();
        assert!(value.get("authToken").is_some());
        assert!(value.get("refreshToken").is_some());
        assert!(value.get("tokenExpirationDate").is_some());
        assert!(value.get("refreshTokenExpirationDate").is_some());
        assert!(value.get("user").is_some());
    }

    #[test]
    fn token_response_maps_payload_to_user() {
        let response: TokenResponse = serde_json::from_value(json!({
            "authToken": "a1",
            "refreshToken": "r1",
            "tokenExpirationDate": 1_000,
            "refreshTokenExpirationDate": 2_000,
            "payload": { "email": "ops@example.com" }
        }))
        .unwrap();

        let session = response.into_session(Persistence::Durable);
        assert_eq!(session.access_token, "a1");
        assert_eq!(session.refresh_token, "r1");
        assert_eq!(session.user["email"], "ops@example.com");
        assert_eq!(session.persistence, Persistence::Durable);
    }
}
