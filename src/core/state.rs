//! # Session State
//!
//! Core chat session state. Contains conversation data only - no terminal
//! or network types. Scroll state lives in [`crate::core::viewport`].
//!
//! ```text
//! Session
//! ├── messages: Vec<Message>              // canonical history
//! ├── status: SessionStatus               // idle/submitted/streaming/error
//! ├── error: Option<String>               // user-visible transport error
//! ├── upload_failures: Vec<UploadFailure> // isolated per-file errors
//! ├── pending_uploads: VecDeque           // files waiting to be encoded
//! ├── uploading: Option<PendingUpload>    // file being encoded right now
//! ├── active_request: Option<u64>         // request whose events are accepted
//! ├── settings: ChatSettings
//! └── listener: Arc<dyn SessionListener>  // message sent / response / error
//! ```
//!
//! State changes only happen through `update(session, action)` in action.rs.

use log::warn;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::core::attachment::PendingUpload;
use crate::core::message::{Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Submitted,
    Streaming,
    Error,
}

impl SessionStatus {
    /// True while a request is outstanding. Input is disabled and the stop
    /// control is shown.
    pub fn is_loading(self) -> bool {
        matches!(self, SessionStatus::Submitted | SessionStatus::Streaming)
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Submitted => "submitted",
            SessionStatus::Streaming => "streaming",
            SessionStatus::Error => "error",
        }
    }
}

/// Behavioral knobs resolved from config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSettings {
    /// New tool calls start in `pending` and wait for approve/reject.
    pub require_tool_approval: bool,
    /// Maximum submission length in characters.
    pub max_input_length: Option<usize>,
    /// Seeds the default conversation when no history is supplied.
    pub system_prompt: Option<String>,
}

/// One attachment that failed to encode. Other uploads are unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    pub upload_id: String,
    pub file: String,
    pub message: String,
}

/// Notifications fired by the session. All methods default to no-ops.
pub trait SessionListener: Send + Sync {
    /// A message was sent; `text` is the literal submitted text.
    fn message_sent(&self, _text: &str) {}

    /// A response finished; `text` is the concatenation of its text parts.
    fn response_received(&self, _text: &str) {}

    /// A transport or attachment error occurred.
    fn error(&self, _error: &dyn std::error::Error) {}
}

/// Listener that ignores everything.
pub struct NoopListener;

impl SessionListener for NoopListener {}

pub struct Session {
    pub messages: Vec<Message>,
    pub status: SessionStatus,
    pub error: Option<String>,
    pub upload_failures: Vec<UploadFailure>,
    pub pending_uploads: VecDeque<PendingUpload>,
    pub uploading: Option<PendingUpload>,
    pub active_request: Option<u64>,
    pub settings: ChatSettings,
    pub(crate) listener: Arc<dyn SessionListener>,
    next_request_id: u64,
}

impl Session {
    /// Creates a session from already-normalized history.
    ///
    /// `None` means no history was supplied and the default conversation is
    /// used (the configured system prompt, if any). `Some(vec![])` starts
    /// with no messages at all.
    pub fn new(
        settings: ChatSettings,
        listener: Arc<dyn SessionListener>,
        history: Option<Vec<Message>>,
    ) -> Self {
        let messages = history.unwrap_or_else(|| default_messages(&settings));
        warn_on_duplicate_ids(&messages);
        Self {
            messages,
            status: SessionStatus::Idle,
            error: None,
            upload_failures: Vec::new(),
            pending_uploads: VecDeque::new(),
            uploading: None,
            active_request: None,
            settings,
            listener,
            next_request_id: 0,
        }
    }

    /// True when a new submission must be refused.
    pub fn is_busy(&self) -> bool {
        self.status.is_loading() || self.uploading.is_some()
    }

    /// Allocates a request id, marks it active, and moves to `submitted`.
    pub(crate) fn begin_request(&mut self) -> u64 {
        self.next_request_id += 1;
        self.active_request = Some(self.next_request_id);
        self.status = SessionStatus::Submitted;
        self.next_request_id
    }

    /// The trailing message, if it is still open.
    pub fn open_message(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.is_open())
    }

    /// The trailing open assistant message, created on first use.
    pub(crate) fn open_assistant_mut(&mut self) -> &mut Message {
        let needs_new = !matches!(
            self.messages.last(),
            Some(m) if m.is_open() && m.role == Role::Assistant
        );
        if needs_new {
            self.messages.push(Message::open_assistant());
        }
        let last = self.messages.len() - 1;
        &mut self.messages[last]
    }

    /// Seals the trailing open message, returning its text.
    pub(crate) fn seal_open(&mut self) -> Option<String> {
        let msg = self.messages.last_mut().filter(|m| m.is_open())?;
        msg.seal();
        Some(msg.text())
    }

    /// The most recent user message.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }
}

fn default_messages(settings: &ChatSettings) -> Vec<Message> {
    settings
        .system_prompt
        .as_deref()
        .map(|prompt| vec![Message::system_text(prompt)])
        .unwrap_or_default()
}

fn warn_on_duplicate_ids(messages: &[Message]) {
    let mut seen = HashSet::new();
    for msg in messages {
        if !seen.insert(msg.id.as_str()) {
            warn!("History contains duplicate message id {}", msg.id);
        }
    }
}
