//! # Transcript Files
//!
//! Conversations are stored as a JSON array of messages. Loading accepts
//! both canonical and legacy arrays (see [`crate::core::normalize`]);
//! saving always writes canonical messages.
//!
//! Writes use atomic rename (write `.tmp`, then `rename()`) for crash safety.

use log::{debug, info};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use crate::core::message::Message;
use crate::core::normalize::{InitialMessages, NormalizeError};

#[derive(Debug)]
pub enum TranscriptError {
    Io(io::Error),
    Json(serde_json::Error),
    Shape(NormalizeError),
}

impl fmt::Display for TranscriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptError::Io(e) => write!(f, "transcript I/O error: {e}"),
            TranscriptError::Json(e) => write!(f, "transcript is not valid JSON: {e}"),
            TranscriptError::Shape(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TranscriptError {}

/// Reads a history file, classifying it as canonical or legacy.
pub fn load(path: &Path) -> Result<InitialMessages, TranscriptError> {
    let json = fs::read_to_string(path).map_err(TranscriptError::Io)?;
    let value: serde_json::Value = serde_json::from_str(&json).map_err(TranscriptError::Json)?;
    let initial = InitialMessages::from_json(value).map_err(TranscriptError::Shape)?;
    info!("Loaded {} message(s) from {}", initial.len(), path.display());
    Ok(initial)
}

/// Atomically write `data` as JSON to `path` (via `.tmp` + rename).
fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<(), TranscriptError> {
    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(data).map_err(TranscriptError::Json)?;
    fs::write(&tmp_path, json).map_err(TranscriptError::Io)?;
    fs::rename(&tmp_path, path).map_err(TranscriptError::Io)?;
    Ok(())
}

/// Saves the conversation. A still-open message is written as if sealed.
pub fn save(path: &Path, messages: &[Message]) -> Result<(), TranscriptError> {
    let snapshot: Vec<Message> = messages
        .iter()
        .cloned()
        .map(|mut m| {
            m.seal();
            m
        })
        .collect();
    atomic_write_json(path, &snapshot)?;
    debug!("Saved {} message(s) to {}", snapshot.len(), path.display());
    Ok(())
}
