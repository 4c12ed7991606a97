//! Consumer-side binding onto a shared `StreamConnection`.
//!
//! A `SubscriptionHandle` resolves a possibly pending URL and headers pair, then
//! acquires the shared connection for that URL from the registry and forwards its
//! messages to the caller's latest handler. Resolution and binding are two phases:
//!
//! 1. **Resolve**: await the URL, then the headers (an empty map when absent). Every
//!    input change bumps an epoch; a resolution that finishes under an older epoch is
//!    discarded, so late futures never write into a superseded subscription.
//! 2. **Bind**: with a concrete URL and the subscription still enabled, `get_or_create`
//!    the connection and subscribe one message listener and one status listener.
//!
//! Teardown only unsubscribes those two listeners. The connection stays in the
//! registry for its other subscribers until someone calls `remove` or `clear`.

use crate::connection::{ConnectionBuilder, StreamConnection, Unsubscribe};
use crate::error::Error;
use crate::message::Message;
use crate::registry::ConnectionRegistry;
use crate::status::ConnectionStatus;
use crate::transport::Headers;
use futures_util::future::BoxFuture;
use log::*;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

/// A subscription input that is either known now or still pending.
pub enum Resolvable<T> {
    Ready(T),
    Pending(BoxFuture<'static, Result<T, Error>>),
}

impl<T> Resolvable<T> {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, Error>> + Send + 'static,
    {
        Resolvable::Pending(Box::pin(future))
    }

    pub async fn resolve(self) -> Result<T, Error> {
        match self {
            Resolvable::Ready(value) => Ok(value),
            Resolvable::Pending(future) => future.await,
        }
    }
}

/// Raw inputs of a subscription.
pub struct SubscriptionOptions {
    pub url: Resolvable<Option<String>>,
    pub headers: Resolvable<Headers>,
    pub enabled: bool,
}

impl SubscriptionOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Resolvable::Ready(Some(url.into())),
            headers: Resolvable::Ready(Headers::new()),
            enabled: true,
        }
    }

    /// Options whose URL is not known yet. A resolved `None` means "do not connect".
    pub fn pending_url<F>(url: F) -> Self
    where
        F: Future<Output = Result<Option<String>, Error>> + Send + 'static,
    {
        Self {
            url: Resolvable::pending(url),
            headers: Resolvable::Ready(Headers::new()),
            enabled: true,
        }
    }

    /// Options with no URL; nothing connects until an update supplies one.
    pub fn unresolved() -> Self {
        Self {
            url: Resolvable::Ready(None),
            headers: Resolvable::Ready(Headers::new()),
            enabled: true,
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Resolvable::Ready(headers);
        self
    }

    pub fn with_pending_headers<F>(mut self, headers: F) -> Self
    where
        F: Future<Output = Result<Headers, Error>> + Send + 'static,
    {
        self.headers = Resolvable::pending(headers);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

struct Binding {
    url: String,
    connection: StreamConnection,
    active: Arc<AtomicBool>,
    unsubscribe: Unsubscribe,
    unsubscribe_status: Unsubscribe,
}

impl Binding {
    fn release(self) {
        self.active.store(false, Ordering::Release);
        self.unsubscribe.unsubscribe();
        self.unsubscribe_status.unsubscribe();
    }
}

#[derive(Default)]
struct State {
    epoch: u64,
    enabled: bool,
    resolved_url: Option<String>,
    resolved_headers: Headers,
    resolver: Option<JoinHandle<()>>,
    binding: Option<Binding>,
}

struct Shared {
    registry: Arc<ConnectionRegistry>,
    builder: ConnectionBuilder,
    handler: RwLock<MessageHandler>,
    status: watch::Sender<ConnectionStatus>,
    state: Mutex<State>,
}

/// One consumer's live subscription to a shared stream connection.
///
/// Dropping the handle (or calling `close`) unsubscribes from the connection.
pub struct SubscriptionHandle {
    shared: Arc<Shared>,
}

impl SubscriptionHandle {
    /// Creates the subscription and starts resolving `options`.
    ///
    /// Ready inputs bind immediately and pending ones resolve on a spawned task. Either
    /// way binding may start a connection, so this must always be called from within a
    /// Tokio runtime.
    pub fn new<F>(
        registry: Arc<ConnectionRegistry>,
        builder: ConnectionBuilder,
        options: SubscriptionOptions,
        handler: F,
    ) -> Self
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let (status, _) = watch::channel(ConnectionStatus::Idle);
        let shared = Arc::new(Shared {
            registry,
            builder,
            handler: RwLock::new(Arc::new(handler)),
            status,
            state: Mutex::new(State::default()),
        });

        shared.apply(options);
        Self { shared }
    }

    /// Replaces the raw inputs, superseding any resolution still in flight.
    pub fn update(&self, options: SubscriptionOptions) {
        self.shared.apply(options);
    }

    /// Disabling unbinds immediately. Re-enabling rebinds to the last resolved URL, if any.
    pub fn set_enabled(&self, enabled: bool) {
        let rebind = {
            let mut state = self.shared.lock_state();
            if state.enabled == enabled {
                return;
            }
            state.epoch += 1;
            state.enabled = enabled;
            if let Some(resolver) = state.resolver.take() {
                resolver.abort();
            }
            if let Some(binding) = state.binding.take() {
                binding.release();
            }
            enabled.then(|| {
                (
                    state.epoch,
                    state.resolved_url.clone(),
                    state.resolved_headers.clone(),
                )
            })
        };

        if let Some((epoch, url, headers)) = rebind {
            self.shared.bind(epoch, url, headers);
        }
    }

    /// Swaps the message handler. Already bound listeners pick it up on the next message.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        *self
            .shared
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(handler);
    }

    /// Last status reported by the bound connection (`Idle` before the first binding).
    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    pub fn status_changes(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    pub fn resolved_url(&self) -> Option<String> {
        self.shared.lock_state().resolved_url.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.lock_state().enabled
    }

    /// The shared connection this subscription is bound to, if any.
    pub fn connection(&self) -> Option<StreamConnection> {
        self.shared
            .lock_state()
            .binding
            .as_ref()
            .map(|binding| binding.connection.clone())
    }

    pub fn close(self) {}
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        let mut state = self.shared.lock_state();
        state.epoch += 1;
        state.enabled = false;
        if let Some(resolver) = state.resolver.take() {
            resolver.abort();
        }
        if let Some(binding) = state.binding.take() {
            debug!("Releasing SSE subscription to {}", binding.url);
            binding.release();
        }
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handler(&self) -> MessageHandler {
        Arc::clone(&self.handler.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn apply(self: &Arc<Self>, options: SubscriptionOptions) {
        let epoch = {
            let mut state = self.lock_state();
            state.epoch += 1;
            state.enabled = options.enabled;
            if let Some(resolver) = state.resolver.take() {
                resolver.abort();
            }
            if !options.enabled {
                if let Some(binding) = state.binding.take() {
                    binding.release();
                }
                return;
            }
            state.epoch
        };

        match (options.url, options.headers) {
            (Resolvable::Ready(url), Resolvable::Ready(headers)) => {
                self.bind(epoch, url, headers);
            }
            (url, headers) => {
                let resolver = tokio::spawn(resolve(Arc::downgrade(self), epoch, url, headers));
                let mut state = self.lock_state();
                if state.epoch == epoch {
                    state.resolver = Some(resolver);
                } else {
                    resolver.abort();
                }
            }
        }
    }

    /// Phase B. Ignored unless `epoch` is still current and the subscription is enabled.
    fn bind(self: &Arc<Self>, epoch: u64, url: Option<String>, headers: Headers) {
        let url = url.filter(|url| !url.is_empty());

        let mut state = self.lock_state();
        if state.epoch != epoch || !state.enabled {
            debug!("Discarding stale SSE subscription inputs");
            return;
        }

        let unchanged = state.binding.as_ref().map(|binding| &binding.url) == url.as_ref()
            && state.resolved_headers == headers;
        state.resolved_url = url.clone();
        state.resolved_headers = headers.clone();
        if unchanged {
            return;
        }

        if let Some(binding) = state.binding.take() {
            binding.release();
        }
        if let Some(url) = url {
            state.binding = Some(self.attach(url, headers));
        }
    }

    fn attach(self: &Arc<Self>, url: String, headers: Headers) -> Binding {
        let connection = self
            .registry
            .get_or_create(&url, || self.builder.build(&url, headers.clone()));

        check_shared_headers(&connection, &headers);

        let active = Arc::new(AtomicBool::new(true));

        let weak = Arc::downgrade(self);
        let message_active = Arc::clone(&active);
        let unsubscribe = connection.subscribe(Arc::new(move |message: &Message| {
            if !message_active.load(Ordering::Acquire) {
                return;
            }
            if let Some(shared) = weak.upgrade() {
                let handler = shared.handler();
                handler(message);
            }
        }));

        let weak = Arc::downgrade(self);
        let status_active = Arc::clone(&active);
        let unsubscribe_status =
            connection.subscribe_status(Arc::new(move |status: ConnectionStatus| {
                if !status_active.load(Ordering::Acquire) {
                    return;
                }
                if let Some(shared) = weak.upgrade() {
                    shared.status.send_replace(status);
                }
            }));

        Binding {
            url,
            connection,
            active,
            unsubscribe,
            unsubscribe_status,
        }
    }
}

/// The first creator's headers win. Returns false, with a warning, when `headers` differ.
fn check_shared_headers(connection: &StreamConnection, headers: &Headers) -> bool {
    if connection.headers() == headers {
        return true;
    }
    warn!(
        "SSE connection for {} is shared with different headers; keeping the headers it was created with",
        connection.url()
    );
    false
}

/// Phase A: await the URL, then the headers, then hand off to `bind`.
async fn resolve(
    shared: Weak<Shared>,
    epoch: u64,
    url: Resolvable<Option<String>>,
    headers: Resolvable<Headers>,
) {
    let resolved = async {
        let url = url.resolve().await?;
        let headers = headers.resolve().await?;
        Ok::<_, Error>((url, headers))
    }
    .await;

    let Some(shared) = shared.upgrade() else {
        return;
    };

    match resolved {
        Ok((url, headers)) => shared.bind(epoch, url, headers),
        Err(e) => error!("SSE subscription resolve error: {}", e),
    }
}
