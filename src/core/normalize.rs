//! # History Normalization
//!
//! Conversations can be seeded from two representations:
//!
//! - **Canonical**: part-based [`Message`]s, passed through untouched.
//! - **Legacy**: flat `{ id, role, content }` records, each wrapped as a
//!   single completed text part.
//!
//! The representation is an explicit tag ([`InitialMessages`]). Raw JSON is
//! classified exactly once, in [`InitialMessages::from_json`], and anything
//! that doesn't fully parse as the chosen shape is an error.
//!
//! `normalize(None)` and `normalize(Some(empty))` differ on purpose: `None`
//! means "no history supplied, use the session default", while an empty list
//! means "start with no messages at all".

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::core::message::{Message, MessagePart, Role};

/// A flat historical record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LegacyRecord {
    pub id: String,
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InitialMessages {
    Canonical(Vec<Message>),
    Legacy(Vec<LegacyRecord>),
}

#[derive(Debug)]
pub enum NormalizeError {
    /// The top-level value was not a JSON array.
    NotAnArray,
    /// The array did not match the shape chosen from its first element.
    Shape(serde_json::Error),
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::NotAnArray => write!(f, "history must be a JSON array"),
            NormalizeError::Shape(e) => write!(f, "malformed history: {e}"),
        }
    }
}

impl std::error::Error for NormalizeError {}

fn has_parts(value: &Value) -> bool {
    value
        .get("parts")
        .and_then(Value::as_array)
        .is_some_and(|parts| !parts.is_empty())
}

impl InitialMessages {
    /// Classifies a JSON array by its first element: a non-empty `parts`
    /// array means canonical, anything else means legacy.
    pub fn from_json(value: Value) -> Result<Self, NormalizeError> {
        let Value::Array(items) = value else {
            return Err(NormalizeError::NotAnArray);
        };
        let canonical = items.first().is_some_and(has_parts);
        let value = Value::Array(items);
        if canonical {
            serde_json::from_value(value)
                .map(InitialMessages::Canonical)
                .map_err(NormalizeError::Shape)
        } else {
            serde_json::from_value(value)
                .map(InitialMessages::Legacy)
                .map_err(NormalizeError::Shape)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            InitialMessages::Canonical(msgs) => msgs.len(),
            InitialMessages::Legacy(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<LegacyRecord> for Message {
    fn from(record: LegacyRecord) -> Self {
        Message::new(record.id, record.role, vec![MessagePart::text(record.content)])
    }
}

/// Produces canonical messages, or `None` when no history was supplied.
pub fn normalize(initial: Option<InitialMessages>) -> Option<Vec<Message>> {
    match initial? {
        InitialMessages::Canonical(msgs) => Some(msgs),
        InitialMessages::Legacy(records) => Some(records.into_iter().map(Message::from).collect()),
    }
}
