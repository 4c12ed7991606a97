//! Error types for the `sse` crate.
//!
//! One `Error` struct carrying an `error_kind` tree plus an optional boxed source.
//! Transport errors never reach subscribers; a `StreamConnection` consumes them and
//! reports them through its status channel instead.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the multiplexer.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// Opening or reading the event stream failed. Always retryable.
    Transport(TransportErrorKind),
    /// A pending URL or headers input failed to resolve.
    Resolve,
    /// Invalid configuration supplied by the caller.
    Config,
}

#[derive(Debug, PartialEq)]
pub enum TransportErrorKind {
    Request,
    UnexpectedStatus(u16),
    UnexpectedContentType(String),
    Stream,
    InvalidHeader,
}

impl Error {
    pub fn is_transport(&self) -> bool {
        matches!(self.error_kind, ErrorKind::Transport(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Transport(TransportErrorKind::UnexpectedStatus(status)) => {
                write!(f, "Transport error: unexpected status {status}")
            }
            ErrorKind::Transport(TransportErrorKind::UnexpectedContentType(content_type)) => {
                write!(f, "Transport error: unexpected content type {content_type:?}")
            }
            ErrorKind::Transport(kind) => write!(f, "Transport error: {:?}", kind),
            ErrorKind::Resolve => write!(f, "Resolve error"),
            ErrorKind::Config => write!(f, "Config error"),
        }?;

        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if let Some(status) = err.status() {
            TransportErrorKind::UnexpectedStatus(status.as_u16())
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Stream
        } else {
            TransportErrorKind::Request
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Transport(error_kind),
        }
    }
}

/// Helper function to create transport errors.
pub fn transport_error(kind: TransportErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Transport(kind),
    }
}

/// Helper function to create resolution errors.
pub fn resolve_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Resolve,
    }
}

/// Helper function to create configuration errors.
pub fn config_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Config,
    }
}
