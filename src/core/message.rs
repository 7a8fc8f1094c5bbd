//! # Canonical Messages
//!
//! Every conversation entry is a [`Message`]: an id, a role, and an ordered
//! list of parts. Parts are never reordered once created; streaming only
//! extends the last text part or appends a new one.
//!
//! ```text
//! Message
//! ├── id: String                 // unique within a session
//! ├── role: Role                 // user | assistant | system | tool
//! ├── parts: Vec<MessagePart>    // text or file, in arrival order
//! ├── tool_calls: Vec<ToolCall>  // assistant only
//! ├── reasoning: Vec<ReasoningStep>
//! ├── attachments: Vec<AttachmentDescriptor>
//! └── state: MessageState        // Open while streaming, then Closed
//! ```
//!
//! Only an `Open` message accepts new content. The session guarantees at
//! most one open message at a time.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::core::attachment::AttachmentDescriptor;
use crate::core::tool_call::ToolCall;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "AI",
            Role::System => "System",
            Role::Tool => "Tool",
        }
    }
}

/// Whether a text part is still receiving deltas.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextState {
    Streaming,
    #[default]
    Done,
}

/// A file carried inline by a message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilePart {
    pub media_type: String,
    pub filename: String,
    /// Resolvable location; for local uploads this is a `data:` URL.
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "WirePart", into = "WirePart")]
pub enum MessagePart {
    Text { text: String, state: TextState },
    File(FilePart),
    /// A part type we don't interpret (`step-start`, `reasoning`, `tool-*`),
    /// kept verbatim so it round-trips.
    Other(Map<String, Value>),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum KnownPart {
    Text {
        text: String,
        #[serde(default)]
        state: TextState,
    },
    File(FilePart),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WirePart {
    Known(KnownPart),
    Other(Map<String, Value>),
}

impl TryFrom<WirePart> for MessagePart {
    type Error = String;

    fn try_from(wire: WirePart) -> Result<Self, Self::Error> {
        match wire {
            WirePart::Known(KnownPart::Text { text, state }) => Ok(MessagePart::Text { text, state }),
            WirePart::Known(KnownPart::File(file)) => Ok(MessagePart::File(file)),
            WirePart::Other(map) => match map.get("type") {
                Some(Value::String(kind)) if kind != "text" && kind != "file" => {
                    Ok(MessagePart::Other(map))
                }
                Some(Value::String(kind)) => Err(format!("malformed {kind} part")),
                _ => Err("message part has no \"type\"".to_string()),
            },
        }
    }
}

impl From<MessagePart> for WirePart {
    fn from(part: MessagePart) -> Self {
        match part {
            MessagePart::Text { text, state } => WirePart::Known(KnownPart::Text { text, state }),
            MessagePart::File(file) => WirePart::Known(KnownPart::File(file)),
            MessagePart::Other(map) => WirePart::Other(map),
        }
    }
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text {
            text: text.into(),
            state: TextState::Done,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessagePart::Text { text, .. } => Some(text),
            MessagePart::File(_) | MessagePart::Other(_) => None,
        }
    }
}

/// Open messages accept deltas; closed ones are sealed for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageState {
    Open,
    #[default]
    Closed,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningKind {
    #[default]
    Thinking,
    Planning,
    Executing,
    Reflection,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReasoningStep {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ReasoningKind,
}

impl ReasoningStep {
    pub fn thinking(content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            title: "Thinking".to_string(),
            content: content.into(),
            timestamp: Some(Utc::now().to_rfc3339()),
            kind: ReasoningKind::Thinking,
        }
    }
}

/// Returned when a message already holds an attachment with the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateAttachment(pub String);

impl fmt::Display for DuplicateAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate attachment id: {}", self.0)
    }
}

impl std::error::Error for DuplicateAttachment {}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub parts: Vec<MessagePart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasoning: Vec<ReasoningStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip)]
    state: MessageState,
}

/// Generate a new message/attachment id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Message {
    /// A closed message with the given parts.
    pub fn new(id: impl Into<String>, role: Role, parts: Vec<MessagePart>) -> Self {
        Self {
            id: id.into(),
            role,
            parts,
            tool_calls: Vec::new(),
            reasoning: Vec::new(),
            attachments: Vec::new(),
            metadata: None,
            state: MessageState::Closed,
        }
    }

    pub fn user_text(text: &str) -> Self {
        Self::new(new_id(), Role::User, vec![MessagePart::text(text)])
    }

    pub fn system_text(text: &str) -> Self {
        Self::new(new_id(), Role::System, vec![MessagePart::text(text)])
    }

    /// An empty assistant message ready to receive deltas.
    pub fn open_assistant() -> Self {
        let mut msg = Self::new(new_id(), Role::Assistant, Vec::new());
        msg.state = MessageState::Open;
        msg
    }

    pub fn state(&self) -> MessageState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == MessageState::Open
    }

    /// Concatenated text of all text parts. File parts are skipped.
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(MessagePart::as_text).collect()
    }

    /// Extends the trailing text part, or starts a new one after a file part.
    /// Returns false (and changes nothing) if the message is closed.
    pub fn append_text(&mut self, delta: &str) -> bool {
        if !self.is_open() {
            return false;
        }
        if let Some(MessagePart::Text { text, state }) = self.parts.last_mut() {
            text.push_str(delta);
            *state = TextState::Streaming;
            return true;
        }
        self.parts.push(MessagePart::Text {
            text: delta.to_string(),
            state: TextState::Streaming,
        });
        true
    }

    /// Extends the current reasoning step, or starts one.
    pub fn append_reasoning(&mut self, delta: &str) -> bool {
        if !self.is_open() {
            return false;
        }
        match self.reasoning.last_mut() {
            Some(step) => step.content.push_str(delta),
            None => self.reasoning.push(ReasoningStep::thinking(delta)),
        }
        true
    }

    /// Adds a file part together with its descriptor.
    pub fn attach(
        &mut self,
        descriptor: AttachmentDescriptor,
        part: FilePart,
    ) -> Result<(), DuplicateAttachment> {
        if self.attachments.iter().any(|a| a.id == descriptor.id) {
            return Err(DuplicateAttachment(descriptor.id));
        }
        self.attachments.push(descriptor);
        self.parts.push(MessagePart::File(part));
        Ok(())
    }

    pub fn tool_call_mut(&mut self, id: &str) -> Option<&mut ToolCall> {
        self.tool_calls.iter_mut().find(|tc| tc.id == id)
    }

    /// Marks every streaming text part done and closes the message.
    pub fn seal(&mut self) {
        for part in &mut self.parts {
            if let MessagePart::Text { state, .. } = part {
                *state = TextState::Done;
            }
        }
        self.state = MessageState::Closed;
    }
}
