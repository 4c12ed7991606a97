use std::time::Duration;

/// Fixed delay between a transport error and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Timeout for establishing the TCP/TLS connection of a stream request.
/// The stream itself has no overall timeout; it is expected to stay open.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables shared by every connection built from one `ConnectionBuilder`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Backoff between a transport error and the reconnect attempt.
    pub reconnect_delay: Duration,
    /// Connect timeout for each stream request.
    pub connect_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: format!("sse/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reconnect backoff delay.
    pub fn with_reconnect_delay(mut self, reconnect_delay: Duration) -> Self {
        self.reconnect_delay = reconnect_delay;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}
