//! Session lifecycle events.
//!
//! This crate lets the code that owns the user session announce boundaries (sign
//! out, account switch, shutdown) without depending on the infrastructure that must
//! react to them, such as the SSE connection registry.
//!
//! # Architecture
//!
//! - **SessionEvent**: every session boundary the application can cross
//! - **EventHandler**: trait for reacting to an event
//! - **EventPublisher**: calls registered handlers in order

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Session boundaries after which per-user state must not survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The user explicitly signed out.
    SignedOut { user_id: String },
    /// A different account became active without a full sign out.
    AccountSwitched {
        previous_user_id: String,
        user_id: String,
    },
    /// The process is exiting.
    Shutdown,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionEvent::SignedOut { .. } => write!(f, "signed_out"),
            SessionEvent::AccountSwitched { .. } => write!(f, "account_switched"),
            SessionEvent::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Trait for handling session events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &SessionEvent);
}

/// Publishes session events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Returns a publisher with `handler` appended. Clones made earlier are unaffected.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub async fn publish(&self, event: SessionEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
