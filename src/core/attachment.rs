//! # Attachment Encoding
//!
//! Turns a local file into something a transport can carry: the whole file
//! is read into memory and embedded as a base64 `data:` URL, tagged with its
//! media type and original filename. Nothing references the local path
//! after encoding.
//!
//! Failures are reported per file ([`EncodeError`] names the file), so a
//! multi-file submission can say exactly which one broke.

use base64::Engine;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::message::{FilePart, new_id};

/// Media type used when the file's type can't be guessed.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    File,
    Audio,
    Video,
}

impl AttachmentKind {
    pub fn from_media_type(media_type: &str) -> Self {
        match media_type.split('/').next() {
            Some("image") => AttachmentKind::Image,
            Some("audio") => AttachmentKind::Audio,
            Some("video") => AttachmentKind::Video,
            _ => AttachmentKind::File,
        }
    }
}

/// Immutable description of a file carried by a message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub url: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// A file that was accepted by a submission and is waiting to be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub id: String,
    pub path: PathBuf,
    pub name: String,
}

impl PendingUpload {
    pub fn new(path: PathBuf) -> Self {
        let name = display_name(&path);
        Self {
            id: new_id(),
            path,
            name,
        }
    }
}

/// The result of encoding one file.
#[derive(Clone, PartialEq)]
pub struct EncodedAttachment {
    pub descriptor: AttachmentDescriptor,
    pub part: FilePart,
}

// The data URL can be megabytes; keep it out of logs.
impl fmt::Debug for EncodedAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedAttachment")
            .field("name", &self.descriptor.name)
            .field("media_type", &self.part.media_type)
            .field("size", &self.descriptor.size)
            .finish()
    }
}

impl EncodedAttachment {
    /// The synthetic text sent alongside the file.
    pub fn notice(&self) -> String {
        upload_notice(&self.descriptor.name, self.descriptor.size.unwrap_or(0))
    }
}

/// A single file that could not be read.
#[derive(Debug)]
pub struct EncodeError {
    pub file: String,
    pub source: io::Error,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to read '{}': {}", self.file, self.source)
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Reads `path` fully and embeds it as a `data:` URL.
pub async fn encode(path: &Path) -> Result<EncodedAttachment, EncodeError> {
    let name = display_name(path);
    let data = tokio::fs::read(path).await.map_err(|source| EncodeError {
        file: name.clone(),
        source,
    })?;

    let media_type = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_MEDIA_TYPE)
        .to_string();
    let payload = base64::engine::general_purpose::STANDARD.encode(&data);
    let url = format!("data:{media_type};base64,{payload}");
    debug!(
        "Encoded attachment '{}' ({} bytes, {})",
        name,
        data.len(),
        media_type
    );

    Ok(EncodedAttachment {
        descriptor: AttachmentDescriptor {
            id: new_id(),
            kind: AttachmentKind::from_media_type(&media_type),
            url: url.clone(),
            name: name.clone(),
            size: Some(data.len() as u64),
            mime_type: Some(media_type.clone()),
        },
        part: FilePart {
            media_type,
            filename: name,
            url,
        },
    })
}

/// Human-readable size: `512.0 KB`, `1.5 MB`. Zero renders as empty.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return String::new();
    }
    let kb = bytes as f64 / 1024.0;
    if kb < 1024.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{:.1} MB", kb / 1024.0)
    }
}

/// `Uploaded file: name (12.34 KB)`
pub fn upload_notice(name: &str, bytes: u64) -> String {
    format!("Uploaded file: {} ({:.2} KB)", name, bytes as f64 / 1024.0)
}
