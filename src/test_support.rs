//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use crate::core::state::{ChatSettings, Session, SessionListener};
use crate::transport::{StreamEvent, Transport, TransportError, TransportRequest};

/// Records every notification so tests can assert on them.
#[derive(Default)]
pub struct RecordingListener {
    sent: Mutex<Vec<String>>,
    received: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl SessionListener for RecordingListener {
    fn message_sent(&self, text: &str) {
        self.sent.lock().unwrap().push(text.to_string());
    }

    fn response_received(&self, text: &str) {
        self.received.lock().unwrap().push(text.to_string());
    }

    fn error(&self, error: &dyn std::error::Error) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

/// A transport that replays a fixed list of events, then optionally fails.
pub struct ScriptedTransport {
    pub events: Vec<StreamEvent>,
    pub fail_with: Option<String>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(
        &self,
        _request: TransportRequest<'_>,
        sender: Sender<StreamEvent>,
    ) -> Result<(), TransportError> {
        for event in &self.events {
            sender
                .send(event.clone())
                .await
                .map_err(|_| TransportError::ChannelClosed)?;
        }
        match &self.fail_with {
            Some(message) => Err(TransportError::Stream(message.clone())),
            None => Ok(()),
        }
    }
}

/// Creates a test Session with default settings and a no-op listener.
pub fn test_session() -> Session {
    Session::new(
        ChatSettings::default(),
        Arc::new(crate::core::state::NoopListener),
        None,
    )
}

/// Creates a test Session wired to a RecordingListener.
pub fn recording_session() -> (Session, Arc<RecordingListener>) {
    let listener = Arc::new(RecordingListener::default());
    let session = Session::new(ChatSettings::default(), listener.clone(), None);
    (session, listener)
}
