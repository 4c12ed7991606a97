#![allow(dead_code)]

use async_stream::stream;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures_util::Stream;
use sse::Message;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

type Client = mpsc::UnboundedSender<Result<Event, Infallible>>;

#[derive(Clone, Default)]
struct ServerState {
    clients: Arc<Mutex<HashMap<String, Vec<Client>>>>,
    requests: Arc<Mutex<Vec<(String, HeaderMap)>>>,
}

/// Local SSE server: every `GET /:feed` becomes a live client the test can push to.
pub struct TestServer {
    addr: SocketAddr,
    state: ServerState,
}

impl TestServer {
    pub async fn start() -> Self {
        let state = ServerState::default();
        let app = Router::new()
            .route("/:feed", get(stream_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self, feed: &str) -> String {
        format!("http://{}/{}", self.addr, feed)
    }

    /// Sends one event to every client currently connected to `feed`.
    pub fn send(&self, feed: &str, event: &str, data: &str, id: &str) {
        let clients = self.state.clients.lock().unwrap();
        for client in clients.get(feed).into_iter().flatten() {
            let _ = client.send(Ok(Event::default().event(event).data(data).id(id)));
        }
    }

    /// Ends every open response on `feed` cleanly.
    pub fn finish(&self, feed: &str) {
        self.state.clients.lock().unwrap().remove(feed);
    }

    pub fn request_count(&self, feed: &str) -> usize {
        self.requests_for(feed).len()
    }

    pub fn requests_for(&self, feed: &str) -> Vec<HeaderMap> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path == feed)
            .map(|(_, headers)| headers.clone())
            .collect()
    }
}

async fn stream_handler(
    Path(feed): Path<String>,
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    state.requests.lock().unwrap().push((feed.clone(), headers));

    let (tx, mut rx) = mpsc::unbounded_channel();
    state
        .clients
        .lock()
        .unwrap()
        .entry(feed)
        .or_default()
        .push(tx);

    let stream = stream! {
        while let Some(event) = rx.recv().await {
            yield event;
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_millis(100)))
}

pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Shared buffer a message handler can push into.
#[derive(Clone, Default)]
pub struct Inbox {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl Inbox {
    pub fn handler(&self) -> impl Fn(&Message) + Send + Sync + 'static {
        let messages = Arc::clone(&self.messages);
        move |message: &Message| messages.lock().unwrap().push(message.clone())
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn data(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|message| message.data.clone())
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|message| message.id.clone())
            .collect()
    }
}
