//! In-memory transport and helpers for unit tests.

use crate::error::{transport_error, Error, TransportErrorKind};
use crate::message::Message;
use crate::status::ConnectionStatus;
use crate::transport::{MessageStream, StreamRequest, Transport};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

type Session = mpsc::UnboundedSender<Result<Message, Error>>;

/// Fake transport: every `open` becomes a session the test can push messages into.
#[derive(Default)]
pub(crate) struct FakeTransport {
    requests: Mutex<Vec<StreamRequest>>,
    sessions: Mutex<Vec<Session>>,
    failures: Mutex<VecDeque<Error>>,
    gate: Option<Semaphore>,
}

impl FakeTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Opens block until `release_open` is called once per attempt.
    pub(crate) fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        })
    }

    pub(crate) fn release_open(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// Makes the next `open` call fail with a 503.
    pub(crate) fn fail_next_open(&self) {
        self.failures.lock().unwrap().push_back(transport_error(
            TransportErrorKind::UnexpectedStatus(503),
            "Service Unavailable",
        ));
    }

    pub(crate) fn open_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Sessions whose stream is still held by a connection.
    pub(crate) fn live_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|session| !session.is_closed())
            .count()
    }

    pub(crate) fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub(crate) fn push(&self, session: usize, message: Message) {
        let _ = self.sessions.lock().unwrap()[session].send(Ok(message));
    }

    pub(crate) fn break_stream(&self, session: usize) {
        let _ = self.sessions.lock().unwrap()[session].send(Err(transport_error(
            TransportErrorKind::Stream,
            "connection reset",
        )));
    }

    /// Server-side graceful end of the stream.
    pub(crate) fn close(&self, session: usize) {
        let mut sessions = self.sessions.lock().unwrap();
        let (closed, _) = mpsc::unbounded_channel();
        sessions[session] = closed;
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&self, request: StreamRequest) -> Result<MessageStream, Error> {
        self.requests.lock().unwrap().push(request);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.lock().unwrap().push(tx);

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }
}

/// Polls `condition` until it holds, panicking after two seconds.
pub(crate) async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 2s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Records every value a listener is called with.
pub(crate) struct Recorder<T> {
    values: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub(crate) fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn values(&self) -> Vec<T> {
        self.values.lock().unwrap().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.values.lock().unwrap().len()
    }

    pub(crate) fn sink(&self) -> Arc<Mutex<Vec<T>>> {
        Arc::clone(&self.values)
    }
}

impl Recorder<ConnectionStatus> {
    pub(crate) fn listener(&self) -> Arc<dyn Fn(ConnectionStatus) + Send + Sync> {
        let values = self.sink();
        Arc::new(move |status| values.lock().unwrap().push(status))
    }
}

impl Recorder<Message> {
    pub(crate) fn listener(&self) -> Arc<dyn Fn(&Message) + Send + Sync> {
        let values = self.sink();
        Arc::new(move |message: &Message| values.lock().unwrap().push(message.clone()))
    }
}
