//! FreightOps API client
//!
//! Session and token-refresh core for the FreightOps operations dashboard:
//! durable session storage with a "remember me" choice, single-flight token
//! refresh, proactive and retry-once reactive renewal on every API call,
//! and a typed login/logout event bus.

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod refresh;
pub mod session;
pub mod storage;

use std::sync::Arc;
use url::Url;

use crate::auth::Auth;
use crate::config::ClientOptions;
use crate::error::Error;
use crate::events::SessionEventBus;
use crate::fetch::ApiClient;
use crate::refresh::RefreshCoordinator;
use crate::session::Session;
use crate::storage::SessionStore;

/// The main entry point for the FreightOps client
pub struct Client {
    /// The base URL of the FreightOps API
    pub base_url: String,
    /// Auth client for session creation and destruction
    auth: Auth,
    /// Request executor with session handling applied
    api: ApiClient,
    /// Single-flight refresh coordinator shared by all requests
    coordinator: RefreshCoordinator,
    /// Bus carrying login/logout notifications
    events: SessionEventBus,
    /// Client options
    pub options: ClientOptions,
}

impl Client {
    /// Create a new client with default options
    ///
    /// # Example
    ///
    /// ```
    /// use freightops_client::Client;
    ///
    /// let client = Client::new("https://api.example.com").unwrap();
    /// ```
    pub fn new(base_url: &str) -> Result<Self, Error> {
        Self::new_with_options(base_url, ClientOptions::default())
    }

    /// Create a new client with custom options
    ///
    /// # Example
    ///
    /// ```
    /// use freightops_client::{Client, config::ClientOptions};
    /// use std::time::Duration;
    ///
    /// let options = ClientOptions::default()
    ///     .with_refresh_buffer(Duration::from_secs(120));
    /// let client = Client::new_with_options("https://api.example.com", options).unwrap();
    /// ```
    pub fn new_with_options(base_url: &str, options: ClientOptions) -> Result<Self, Error> {
        Url::parse(base_url)?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let store = Arc::new(match &options.session_file {
            Some(path) => SessionStore::with_session_file(path),
            None => SessionStore::in_memory(),
        });
        let events = SessionEventBus::new();

        let coordinator = RefreshCoordinator::new(
            http.clone(),
            &base_url,
            Arc::clone(&store),
            events.clone(),
        );
        let auth = Auth::new(
            http.clone(),
            base_url.clone(),
            Arc::clone(&store),
            events.clone(),
        );
        let api = ApiClient::new(
            http,
            base_url.clone(),
            store,
            coordinator.clone(),
            events.clone(),
            options.refresh_buffer,
        );

        Ok(Self {
            base_url,
            auth,
            api,
            coordinator,
            events,
            options,
        })
    }

    /// Get the auth client for sign-in, sign-up and sign-out
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Get the request executor for business API calls
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Get the refresh coordinator
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Get the session event bus
    pub fn events(&self) -> &SessionEventBus {
        &self.events
    }

    /// The current session, if any
    pub fn session(&self) -> Option<Session> {
        self.auth.current_session()
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::ClientOptions;
    pub use crate::error::Error;
    pub use crate::events::{EventKind, LogoutReason, SessionEvent};
    pub use crate::Client;
}
