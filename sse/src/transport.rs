//! Network seam between a `StreamConnection` and the wire.
//!
//! `HttpTransport` is the production implementation: a streaming reqwest GET whose
//! body is parsed as Server-Sent Events.

use crate::config::ConnectionConfig;
use crate::error::{transport_error, Error, TransportErrorKind};
use crate::message::Message;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::stream::{BoxStream, StreamExt};
use log::*;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Client;
use std::collections::BTreeMap;

/// Extra request headers, fixed for the lifetime of a connection.
pub type Headers = BTreeMap<String, String>;

/// Messages read from an open stream. The stream ending (`None`) is a graceful close.
pub type MessageStream = BoxStream<'static, Result<Message, Error>>;

pub const EVENT_STREAM: &str = "text/event-stream";

static LAST_EVENT_ID: &str = "last-event-id";

/// Everything needed to open one stream request.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub url: String,
    pub headers: Headers,
    /// Id of the last event delivered on a previous attempt, sent as `Last-Event-ID`.
    pub last_event_id: Option<String>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the stream. Returning `Ok` marks the connection as open.
    async fn open(&self, request: StreamRequest) -> Result<MessageStream, Error>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &ConnectionConfig) -> Result<Self, Error> {
        // No overall request timeout: the response body is meant to stay open.
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client })
    }

    fn request_headers(request: &StreamRequest) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        if let Some(id) = &request.last_event_id {
            headers.insert(HeaderName::from_static(LAST_EVENT_ID), header_value(id)?);
        }

        // Fixed connection headers override the defaults above.
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                transport_error(TransportErrorKind::InvalidHeader, &e.to_string())
            })?;
            headers.insert(name, header_value(value)?);
        }

        Ok(headers)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value)
        .map_err(|e| transport_error(TransportErrorKind::InvalidHeader, &e.to_string()))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: StreamRequest) -> Result<MessageStream, Error> {
        let headers = Self::request_headers(&request)?;

        debug!("Opening SSE stream {}", request.url);

        let response = self
            .client
            .get(&request.url)
            .headers(headers)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(transport_error(
                TransportErrorKind::UnexpectedStatus(status.as_u16()),
                status.canonical_reason().unwrap_or("non-success response"),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with(EVENT_STREAM) {
            return Err(transport_error(
                TransportErrorKind::UnexpectedContentType(content_type),
                "expected an event stream response",
            ));
        }

        let messages = response
            .bytes_stream()
            .eventsource()
            .map(|event| match event {
                Ok(event) => Ok(Message::from(event)),
                Err(e) => Err(transport_error(TransportErrorKind::Stream, &e.to_string())),
            });

        Ok(messages.boxed())
    }
}
