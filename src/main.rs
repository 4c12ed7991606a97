use anyhow::{bail, Result};
use events::{EventPublisher, SessionEvent};
use log::*;
use service::{config::Config, logging::Logger};
use sse::error::config_error;
use sse::{
    ConnectionBuilder, ConnectionConfig, ConnectionRegistry, RegistrySessionHandler,
    SubscriptionHandle, SubscriptionOptions,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

mod output;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::new();
    Logger::init_logger(&config)?;

    if config.urls.is_empty() {
        bail!("No SSE URLs provided, set --urls or URLS");
    }
    let headers = config
        .headers()
        .map_err(|e| config_error(&e.to_string()))?;

    let builder = ConnectionBuilder::http(
        ConnectionConfig::new()
            .with_reconnect_delay(config.reconnect_delay())
            .with_connect_timeout(config.connect_timeout())
            .with_user_agent(config.user_agent.clone()),
    )?;

    let registry = Arc::new(ConnectionRegistry::new());
    let publisher = EventPublisher::new()
        .with_handler(Arc::new(RegistrySessionHandler::new(registry.clone())));

    output::print_banner(&config.urls);

    let mut subscriptions = Vec::with_capacity(config.urls.len());
    let mut watchers: Vec<JoinHandle<()>> = Vec::with_capacity(config.urls.len());
    for url in &config.urls {
        let label = url.clone();
        let handle = SubscriptionHandle::new(
            registry.clone(),
            builder.clone(),
            SubscriptionOptions::new(url.as_str()).with_headers(headers.clone()),
            move |message| output::print_message(&label, message),
        );

        let label = url.clone();
        let mut changes = handle.status_changes();
        watchers.push(tokio::spawn(async move {
            output::print_status(&label, *changes.borrow_and_update());
            while changes.changed().await.is_ok() {
                output::print_status(&label, *changes.borrow_and_update());
            }
        }));

        subscriptions.push(handle);
    }

    info!(
        "Watching {} SSE endpoint(s) over {} connection(s)",
        subscriptions.len(),
        registry.len()
    );

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");

    publisher.publish(SessionEvent::Shutdown).await;
    drop(subscriptions);
    for watcher in watchers {
        watcher.abort();
    }

    Ok(())
}
