//! Client-side Server-Sent Events (SSE) connection multiplexer.
//!
//! Many consumers often want the same event stream. This crate keeps one long-lived
//! HTTP request per URL and fans its events out to every interested subscriber, so
//! mounting ten views on one feed still costs a single request.
//!
//! # Architecture
//!
//! - **One connection per URL**: `ConnectionRegistry` hands out a shared
//!   `StreamConnection` for each resolved URL. The first creator's headers are fixed
//!   for the connection's lifetime.
//! - **Idempotent connect**: a connection never has more than one request in flight,
//!   however many subscribers attach in the same tick.
//! - **Retry, never throw**: transport failures surface only as `ConnectionStatus::Error`
//!   followed by a reconnect after a fixed backoff. Nothing is propagated to subscribers.
//! - **Sequential fan-out**: every registered listener sees an event before any
//!   listener sees the next one.
//! - **Explicit teardown**: connections stay registered after their last subscriber
//!   leaves. Sessions end them with `ConnectionRegistry::clear()`, usually through
//!   `RegistrySessionHandler`.
//!
//! # Subscribing
//!
//! ```rust,ignore
//! use sse::{ConnectionBuilder, ConnectionConfig, ConnectionRegistry, SubscriptionHandle, SubscriptionOptions};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ConnectionRegistry::new());
//! let builder = ConnectionBuilder::http(ConnectionConfig::default())?;
//!
//! let handle = SubscriptionHandle::new(
//!     registry.clone(),
//!     builder,
//!     SubscriptionOptions::new("https://api.example.com/events"),
//!     |message| println!("{}: {}", message.event, message.data),
//! );
//!
//! let mut status = handle.status_changes();
//! ```
//!
//! # Modules
//!
//! - `connection`: `StreamConnection`, its retry loop, and `ConnectionBuilder`
//! - `registry`: URL-keyed `ConnectionRegistry`
//! - `subscription`: `SubscriptionHandle`, the two-phase resolve-then-bind consumer API
//! - `transport`: the `Transport` seam and its reqwest-backed `HttpTransport`
//! - `session_event_handler`: clears the registry on session lifecycle events

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod registry;
pub mod session_event_handler;
pub mod status;
pub mod subscription;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use config::ConnectionConfig;
pub use connection::{ConnectionBuilder, StreamConnection, Unsubscribe};
pub use error::Error;
pub use message::Message;
pub use registry::ConnectionRegistry;
pub use session_event_handler::RegistrySessionHandler;
pub use status::ConnectionStatus;
pub use subscription::{Resolvable, SubscriptionHandle, SubscriptionOptions};
pub use transport::{Headers, HttpTransport, Transport};
