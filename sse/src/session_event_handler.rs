use crate::registry::ConnectionRegistry;
use async_trait::async_trait;
use events::{EventHandler, SessionEvent};
use log::*;
use std::sync::Arc;

/// Tears down every shared SSE connection when the session boundary moves.
///
/// Connections carry the credentials they were created with, so none of them may
/// outlive the user that opened them.
pub struct RegistrySessionHandler {
    registry: Arc<ConnectionRegistry>,
}

impl RegistrySessionHandler {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl EventHandler for RegistrySessionHandler {
    async fn handle(&self, event: &SessionEvent) {
        match event {
            SessionEvent::SignedOut { user_id } => {
                info!("User {} signed out, closing SSE connections", user_id);
            }
            SessionEvent::AccountSwitched {
                previous_user_id,
                user_id,
            } => {
                info!(
                    "Account switched from {} to {}, closing SSE connections",
                    previous_user_id, user_id
                );
            }
            SessionEvent::Shutdown => {
                info!("Shutting down, closing SSE connections");
            }
        }

        self.registry.clear();
    }
}
