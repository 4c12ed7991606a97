use crate::config::ConnectionConfig;
use crate::error::Error;
use crate::message::Message;
use crate::status::ConnectionStatus;
use crate::transport::{Headers, HttpTransport, StreamRequest, Transport};
use futures_util::stream::StreamExt;
use log::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub type MessageListener = Arc<dyn Fn(&Message) + Send + Sync>;
/// Called with each status change, one call at a time per connection.
///
/// Must not call `connect` or `disconnect` on the connection that notified it.
pub type StatusListener = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

/// Phase of the single network attempt a connection may own.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    #[default]
    None,
    /// Request sent, response not yet open. This is the in-flight window.
    Opening,
    Streaming,
    /// Waiting out the reconnect delay after a transport error.
    Backoff,
}

#[derive(Default)]
struct State {
    status: ConnectionStatus,
    attempt: Attempt,
    cancel: Option<CancellationToken>,
    listeners: Vec<MessageListener>,
    status_listeners: Vec<StatusListener>,
    last_event_id: Option<String>,
}

impl State {
    /// Distinct update: returns the listeners to notify only if the status changed.
    fn set_status(&mut self, next: ConnectionStatus) -> Option<Vec<StatusListener>> {
        if self.status == next {
            return None;
        }
        self.status = next;
        Some(self.status_listeners.clone())
    }
}

struct Inner {
    url: String,
    headers: Headers,
    transport: Arc<dyn Transport>,
    reconnect_delay: Duration,
    /// Held from a status write until its fan-out returns, so listeners see writes in order.
    status_order: Mutex<()>,
    state: Mutex<State>,
}

/// One shared, auto-reconnecting event stream for a single URL.
///
/// Clones are handles to the same connection. Incoming messages are fanned out to
/// every registered listener in registration order; status changes are fanned out
/// with "distinct" semantics. Transport errors never escape: they surface as
/// `ConnectionStatus::Error` followed by a reconnect after the configured delay.
#[derive(Clone)]
pub struct StreamConnection {
    inner: Arc<Inner>,
}

impl StreamConnection {
    pub fn new(
        url: impl Into<String>,
        headers: Headers,
        transport: Arc<dyn Transport>,
        config: &ConnectionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                headers,
                transport,
                reconnect_delay: config.reconnect_delay,
                status_order: Mutex::new(()),
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Headers fixed when the connection was created.
    pub fn headers(&self) -> &Headers {
        &self.inner.headers
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock_state().status
    }

    /// True while a request is opening, streaming, or waiting to retry.
    pub fn is_active(&self) -> bool {
        self.inner.lock_state().attempt != Attempt::None
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock_state().listeners.len()
    }

    /// Starts a connection attempt unless one is already opening or streaming.
    ///
    /// A pending reconnect delay is cut short. Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        let _order = self.inner.lock_status_order();
        let (token, last_event_id, notify) = {
            let mut state = self.inner.lock_state();
            if matches!(state.attempt, Attempt::Opening | Attempt::Streaming) {
                debug!("SSE connection to {} already in flight", self.inner.url);
                return;
            }

            if let Some(previous) = state.cancel.take() {
                previous.cancel();
            }
            let token = CancellationToken::new();
            state.cancel = Some(token.clone());
            state.attempt = Attempt::Opening;
            let notify = state.set_status(ConnectionStatus::Connecting);
            (token, state.last_event_id.clone(), notify)
        };

        if let Some(listeners) = notify {
            notify_status(&listeners, ConnectionStatus::Connecting);
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(inner.run(token, last_event_id));
    }

    /// Cancels the active request or pending reconnect. Listeners stay registered,
    /// so a later `connect()` resumes delivery to them.
    pub fn disconnect(&self) {
        let _order = self.inner.lock_status_order();
        let notify = {
            let mut state = self.inner.lock_state();
            if let Some(token) = state.cancel.take() {
                token.cancel();
            }
            state.attempt = Attempt::None;
            state.set_status(ConnectionStatus::Idle)
        };

        if let Some(listeners) = notify {
            debug!("SSE connection to {} disconnected", self.inner.url);
            notify_status(&listeners, ConnectionStatus::Idle);
        }
    }

    /// Disconnects and drops every listener.
    pub fn close(&self) {
        self.disconnect();

        let mut state = self.inner.lock_state();
        state.listeners.clear();
        state.status_listeners.clear();
    }

    /// Registers a message listener and makes sure the connection is running.
    pub fn subscribe(&self, listener: MessageListener) -> Unsubscribe {
        let idle = {
            let mut state = self.inner.lock_state();
            if !state.listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
                state.listeners.push(Arc::clone(&listener));
            }
            state.attempt == Attempt::None
        };

        if idle {
            self.connect();
        }

        Unsubscribe {
            inner: Arc::downgrade(&self.inner),
            listener: Listener::Message(listener),
        }
    }

    /// Registers a status listener and immediately replays the current status to it.
    pub fn subscribe_status(&self, listener: StatusListener) -> Unsubscribe {
        let order = self.inner.lock_status_order();
        let current = {
            let mut state = self.inner.lock_state();
            if !state.status_listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
                state.status_listeners.push(Arc::clone(&listener));
            }
            state.status
        };

        notify_status(std::slice::from_ref(&listener), current);
        drop(order);

        Unsubscribe {
            inner: Arc::downgrade(&self.inner),
            listener: Listener::Status(listener),
        }
    }

    /// Removes a message listener. Returns false if it was not registered.
    pub fn remove_listener(&self, listener: &MessageListener) -> bool {
        self.inner.remove(&Listener::Message(Arc::clone(listener)))
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Always taken before `state`, never while holding it.
    fn lock_status_order(&self) -> MutexGuard<'_, ()> {
        self.status_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the attempt owned by `token` to `attempt`, updating status.
    /// Returns false if the attempt was cancelled or superseded.
    fn transition(
        &self,
        token: &CancellationToken,
        attempt: Attempt,
        status: ConnectionStatus,
    ) -> bool {
        let _order = self.lock_status_order();
        let notify = {
            let mut state = self.lock_state();
            if token.is_cancelled() {
                return false;
            }
            state.attempt = attempt;
            if attempt == Attempt::None {
                state.cancel = None;
            }
            state.set_status(status)
        };

        if let Some(listeners) = notify {
            notify_status(&listeners, status);
        }
        true
    }

    fn remove(&self, listener: &Listener) -> bool {
        let mut state = self.lock_state();
        match listener {
            Listener::Message(listener) => {
                let before = state.listeners.len();
                state.listeners.retain(|l| !Arc::ptr_eq(l, listener));
                state.listeners.len() != before
            }
            Listener::Status(listener) => {
                let before = state.status_listeners.len();
                state.status_listeners.retain(|l| !Arc::ptr_eq(l, listener));
                state.status_listeners.len() != before
            }
        }
    }

    /// Fans `message` out unless the attempt owned by `token` was cancelled.
    fn dispatch(&self, token: &CancellationToken, message: &Message) -> bool {
        let listeners = {
            let mut state = self.lock_state();
            if token.is_cancelled() {
                return false;
            }
            if !message.id.is_empty() {
                state.last_event_id = Some(message.id.clone());
            }
            state.listeners.clone()
        };

        for listener in listeners.iter() {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(message))).is_err() {
                error!(
                    "SSE message listener for {} panicked on {} event",
                    self.url, message.event
                );
            }
        }
        true
    }

    async fn run(self: Arc<Self>, token: CancellationToken, last_event_id: Option<String>) {
        let request = StreamRequest {
            url: self.url.clone(),
            headers: self.headers.clone(),
            last_event_id,
        };

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            outcome = self.stream(request, &token) => outcome,
        };
        if token.is_cancelled() {
            return;
        }

        match outcome {
            Ok(()) => {
                info!("SSE stream closed: {}", self.url);
                self.transition(&token, Attempt::None, ConnectionStatus::Idle);
            }
            Err(e) => {
                warn!(
                    "SSE error on {}: {}. Reconnecting in {:?}",
                    self.url, e, self.reconnect_delay
                );
                if !self.transition(&token, Attempt::Backoff, ConnectionStatus::Error) {
                    return;
                }

                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(self.reconnect_delay) => {}
                }

                debug!("Reconnecting SSE stream {}", self.url);
                StreamConnection { inner: self }.connect();
            }
        }
    }

    async fn stream(&self, request: StreamRequest, token: &CancellationToken) -> Result<(), Error> {
        let mut messages = self.transport.open(request).await?;

        info!("SSE connected: {}", self.url);
        if !self.transition(token, Attempt::Streaming, ConnectionStatus::Connected) {
            return Ok(());
        }

        while let Some(message) = messages.next().await {
            if !self.dispatch(token, &message?) {
                break;
            }
        }

        Ok(())
    }
}

fn notify_status(listeners: &[StatusListener], status: ConnectionStatus) {
    for listener in listeners {
        if panic::catch_unwind(AssertUnwindSafe(|| listener(status))).is_err() {
            error!("SSE status listener panicked on {} status", status);
        }
    }
}

enum Listener {
    Message(MessageListener),
    Status(StatusListener),
}

/// Removes exactly the listener it was returned for.
///
/// Holds only a weak reference to the connection; unsubscribing after the
/// connection is gone, or twice via `remove_listener`, is a no-op.
#[must_use = "the listener stays registered until `unsubscribe` is called"]
pub struct Unsubscribe {
    inner: Weak<Inner>,
    listener: Listener,
}

impl Unsubscribe {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.remove(&self.listener);
        }
    }
}

/// Builds connections that share one transport and configuration.
#[derive(Clone)]
pub struct ConnectionBuilder {
    transport: Arc<dyn Transport>,
    config: ConnectionConfig,
}

impl ConnectionBuilder {
    pub fn new(transport: Arc<dyn Transport>, config: ConnectionConfig) -> Self {
        Self { transport, config }
    }

    /// Builder backed by the reqwest transport.
    pub fn http(config: ConnectionConfig) -> Result<Self, Error> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn build(&self, url: &str, headers: Headers) -> StreamConnection {
        StreamConnection::new(url, headers, Arc::clone(&self.transport), &self.config)
    }
}
