//! Configuration options for the FreightOps client

use std::path::PathBuf;
use std::time::Duration;

/// Configuration options for the FreightOps client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// The request timeout applied to every outbound call, including the
    /// token refresh call
    pub request_timeout: Option<Duration>,

    /// How far ahead of access-token expiry a request triggers a proactive
    /// refresh
    pub refresh_buffer: Duration,

    /// Where the durable ("remember me") session is persisted; when unset
    /// the durable store is memory-backed and lives only as long as the
    /// process
    pub session_file: Option<PathBuf>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            refresh_buffer: Duration::from_secs(60),
            session_file: None,
        }
    }
}

impl ClientOptions {
    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the proactive refresh buffer
    pub fn with_refresh_buffer(mut self, value: Duration) -> Self {
        self.refresh_buffer = value;
        self
    }

    /// Set the durable session file path
    pub fn with_session_file(mut self, value: PathBuf) -> Self {
        self.session_file = Some(value);
        self
    }
}
