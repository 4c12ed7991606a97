use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Observable health of a shared stream connection.
///
/// `Error` is transient: the connection schedules a retry and moves back to
/// `Connecting` once the backoff delay elapses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Idle => "idle",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ConnectionStatusParseError;

impl FromStr for ConnectionStatus {
    type Err = ConnectionStatusParseError;
    fn from_str(status: &str) -> Result<ConnectionStatus, Self::Err> {
        match status.to_lowercase().as_str() {
            "idle" => Ok(ConnectionStatus::Idle),
            "connecting" => Ok(ConnectionStatus::Connecting),
            "connected" => Ok(ConnectionStatus::Connected),
            "error" => Ok(ConnectionStatus::Error),
            _ => Err(ConnectionStatusParseError),
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
