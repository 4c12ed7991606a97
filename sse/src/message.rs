use serde::de::DeserializeOwned;
use std::time::Duration;

/// One event received from a Server-Sent Events stream.
///
/// The payload is kept as the raw `data` string; decoding it is the subscriber's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub event: String,
    pub data: String,
    pub id: String,
    pub retry: Option<Duration>,
}

impl Message {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: String::new(),
            retry: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Check if this message carries the given event name.
    pub fn is_event(&self, event: &str) -> bool {
        self.event == event
    }

    /// Decode the `data` field as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.data)
    }
}

impl From<eventsource_stream::Event> for Message {
    fn from(event: eventsource_stream::Event) -> Self {
        Self {
            event: event.event,
            data: event.data,
            id: event.id,
            retry: event.retry,
        }
    }
}
