use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use super::types::StreamEvent;
use crate::core::message::Message;

/// Errors that can occur while talking to the response service.
#[derive(Debug)]
pub enum TransportError {
    /// Transport misconfigured (bad header name or value).
    Config(String),
    /// Network-level failure (timeout, DNS, connection refused).
    Network(String),
    /// Service returned a non-2xx response.
    Api { status: u16, message: String },
    /// Failed to parse the service's stream.
    Parse(String),
    /// The service reported an error mid-stream.
    Stream(String),
    /// The mpsc channel was closed (event loop dropped the receiver).
    ChannelClosed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Config(msg) => write!(f, "config error: {msg}"),
            TransportError::Network(msg) => write!(f, "network error: {msg}"),
            TransportError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            TransportError::Parse(msg) => write!(f, "parse error: {msg}"),
            TransportError::Stream(msg) => write!(f, "stream error: {msg}"),
            TransportError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Everything a transport needs to produce a response.
pub struct TransportRequest<'a> {
    /// Full conversation, oldest first, ending with the new user message.
    pub messages: &'a [Message],
}

/// The boundary to the response-generating service.
///
/// `stream` returns `Ok(())` once the response is finished; every delta has
/// been sent on `sender` by then. Stopping is done by aborting the task
/// running `stream`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the name of the transport.
    fn name(&self) -> &str;

    /// Streams a response for the given request, sending events to the provided channel.
    async fn stream(
        &self,
        request: TransportRequest<'_>,
        sender: Sender<StreamEvent>,
    ) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = TransportError::Api {
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "API error (HTTP 500): boom");
    }

    #[test]
    fn test_dropped_receiver_closes_stream() {
        use crate::test_support::ScriptedTransport;

        let transport = ScriptedTransport {
            events: vec![StreamEvent::TextDelta("lost".into())],
            fail_with: None,
        };
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        drop(rx);

        let result = tokio_test::block_on(transport.stream(TransportRequest { messages: &[] }, tx));
        assert!(matches!(result, Err(TransportError::ChannelClosed)));
    }
}
