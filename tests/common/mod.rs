#![allow(dead_code)]

use chrono::Utc;
use freightops_client::prelude::*;
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Issuer response body with expiries relative to now
pub fn token_body(
    access_token: &str,
    refresh_token: &str,
    access_ttl_ms: i64,
    refresh_ttl_ms: i64,
) -> serde_json::Value {
    let now = Utc::now().timestamp_millis();
    json!({
        "authToken": access_token,
        "refreshToken": refresh_token,
        "tokenExpirationDate": now + access_ttl_ms,
        "refreshTokenExpirationDate": now + refresh_ttl_ms,
        "payload": { "id": "u1", "email": "ops@example.com" }
    })
}

/// Mount a login endpoint returning `body`
pub async fn mount_login(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Collect every logout reason published on the client's event bus
pub fn collect_logout_reasons(client: &Client) -> Arc<Mutex<Vec<LogoutReason>>> {
    let reasons = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&reasons);
    // The subscription stays registered for the whole test.
    client.events().subscribe(EventKind::Logout, move |event| {
        if let SessionEvent::Logout { reason } = event {
            captured.lock().unwrap().push(*reason);
        }
    });
    reasons
}
