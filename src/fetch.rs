//! Authenticated request building and execution
//!
//! Every business call goes through `ApiRequest`, which attaches the
//! current access token, refreshes it proactively when it is close to
//! expiry, and retries a call exactly once after an authorization failure.

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::events::{LogoutReason, SessionEvent, SessionEventBus};
use crate::refresh::{RefreshCoordinator, REFRESH_PATH};
use crate::storage::SessionStore;

/// Executes API requests with session handling applied
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<SessionStore>,
    coordinator: RefreshCoordinator,
    events: SessionEventBus,
    refresh_buffer: Duration,
}

impl ApiClient {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: String,
        store: Arc<SessionStore>,
        coordinator: RefreshCoordinator,
        events: SessionEventBus,
        refresh_buffer: Duration,
    ) -> Self {
        Self {
            http,
            base_url,
            store,
            coordinator,
            events,
            refresh_buffer,
        }
    }

    /// Create a GET request
    pub fn get(&self, path: &str) -> ApiRequest<'_> {
        self.request(Method::GET, path)
    }

    /// Create a POST request
    pub fn post(&self, path: &str) -> ApiRequest<'_> {
        self.request(Method::POST, path)
    }

    /// Create a PUT request
    pub fn put(&self, path: &str) -> ApiRequest<'_> {
        self.request(Method::PUT, path)
    }

    /// Create a PATCH request
    pub fn patch(&self, path: &str) -> ApiRequest<'_> {
        self.request(Method::PATCH, path)
    }

    /// Create a DELETE request
    pub fn delete(&self, path: &str) -> ApiRequest<'_> {
        self.request(Method::DELETE, path)
    }

    /// Create a request with an arbitrary method
    pub fn request(&self, method: Method, path: &str) -> ApiRequest<'_> {
        ApiRequest::new(self, method, path)
    }
}

/// Builder for a single API request
pub struct ApiRequest<'a> {
    client: &'a ApiClient,
    method: Method,
    path: String,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl<'a> ApiRequest<'a> {
    fn new(client: &'a ApiClient, method: Method, path: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        Self {
            client,
            method,
            path: path.to_string(),
            headers,
            query: Vec::new(),
            body: None,
        }
    }

    /// Add a header to the request
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Add a query parameter to the request
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a JSON body to the request
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, Error> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// Execute the request and parse the response as JSON
    pub async fn execute<T: DeserializeOwned>(self) -> Result<T, Error> {
        let response = self.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(format!(
                "request failed with status {}: {}",
                status, text
            )));
        }

        Ok(response.json::<T>().await?)
    }

    /// Execute the request and return the raw response.
    ///
    /// Applies the session rules: a proactive refresh when the access token
    /// is within the refresh buffer of expiry, and after a 401 exactly one
    /// refresh-and-retry. Requests to the refresh endpoint are exempt from
    /// both. Network errors are surfaced unchanged.
    pub async fn send(self) -> Result<reqwest::Response, Error> {
        let client = self.client;
        let exempt = self.path == REFRESH_PATH;

        if !exempt {
            if let Some(session) = client.store.read() {
                if session.is_access_token_expired(client.refresh_buffer) {
                    // On failure the session is already destroyed; the call
                    // proceeds unauthenticated and fails downstream.
                    if let Err(err) = client.coordinator.refresh().await {
                        debug!("proactive refresh failed, sending unauthenticated: {}", err);
                    }
                }
            }
        }

        // The retry decision is a local value, not request state.
        let mut retried = false;
        loop {
            let url = format!("{}{}", client.base_url, self.path);
            let mut request = client
                .http
                .request(self.method.clone(), &url)
                .headers(self.headers.clone());

            if !self.query.is_empty() {
                request = request.query(&self.query);
            }
            if let Some(body) = &self.body {
                request = request.body(body.clone());
            }
            if !exempt {
                if let Some(session) = client.store.read() {
                    request = request.bearer_auth(&session.access_token);
                }
            }

            let response = request.send().await?;

            if response.status() == StatusCode::UNAUTHORIZED && !exempt {
                if retried {
                    return Err(expire_session(client));
                }
                retried = true;

                debug!("request unauthorized, attempting token refresh");
                match client.coordinator.refresh().await {
                    Ok(_) => continue,
                    // The coordinator has already destroyed the session and
                    // published its logout; `expire_session` will find
                    // nothing left to clear and stays silent.
                    Err(_) => return Err(expire_session(client)),
                }
            }

            return Ok(response);
        }
    }
}

fn expire_session(client: &ApiClient) -> Error {
    if client.store.clear() {
        client.events.publish(&SessionEvent::Logout {
            reason: LogoutReason::Unauthorized,
        });
    }
    Error::SessionExpired
}
