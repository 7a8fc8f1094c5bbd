//! # Actions
//!
//! Everything that can happen to a session becomes an `Action`.
//! User presses Enter? That's `Action::Submit`.
//! The transport streams a fragment? That's `Action::TransportEvent`.
//!
//! The `update()` function applies an action to the session and returns an
//! [`Effect`] describing the I/O the caller must perform. No I/O happens
//! here: spawning requests, aborting them, and reading files are all done by
//! the event loop.
//!
//! ```text
//! Session + Action  →  update()  →  Effect (or ValidationError)
//! ```
//!
//! ## Status transitions
//!
//! ```text
//!   idle ──submit──▶ submitted ──delta──▶ streaming ──complete──▶ idle
//!                        │                   │  └──cancel──▶ idle
//!                        └───────fail────────┴──▶ error ──dismiss/submit──▶ idle
//! ```
//!
//! ## Stale events
//!
//! Every request gets a fresh id. Transport events are applied only when
//! their id matches `Session::active_request`; after a cancel there is no
//! active request, so late deltas are dropped.
//!
//! ## Uploads
//!
//! Files accepted by `Submit` are queued and encoded one at a time, in order,
//! only while no request is outstanding. Each encoded file is sent as its own
//! user message. A file that fails to encode is recorded in
//! `Session::upload_failures` and skipped; the session status is untouched.

use log::{debug, info, warn};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

use crate::core::attachment::{EncodeError, EncodedAttachment, PendingUpload};
use crate::core::message::{Message, new_id};
use crate::core::state::{Session, SessionStatus, UploadFailure};
use crate::core::tool_call::{ToolCall, ToolCallStatus};
use crate::transport::{StreamEvent, TransportError};

#[derive(Debug)]
pub enum Action {
    /// Send a message. Either `text` or `files` must be non-empty.
    Submit { text: String, files: Vec<PathBuf> },
    /// An incremental event from the transport.
    TransportEvent { request_id: u64, event: StreamEvent },
    /// The transport finished the response.
    TransportComplete { request_id: u64 },
    /// The transport failed.
    TransportFailed {
        request_id: u64,
        error: TransportError,
    },
    /// Stop the streaming response, keeping what arrived so far.
    Cancel,
    /// Clear the error banner.
    DismissError,
    /// Send the last user message again.
    Retry,
    AttachmentEncoded {
        upload_id: String,
        attachment: EncodedAttachment,
    },
    AttachmentFailed {
        upload_id: String,
        error: EncodeError,
    },
    /// Drop a queued upload that hasn't been encoded yet.
    RemoveAttachment(String),
    ApproveToolCall(String),
    RejectToolCall(String),
    /// Externally driven tool call progress.
    ToolCallUpdate {
        id: String,
        status: ToolCallStatus,
        result: Option<Value>,
        error: Option<String>,
    },
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Submit { .. } => "Submit",
            Action::TransportEvent { .. } => "TransportEvent",
            Action::TransportComplete { .. } => "TransportComplete",
            Action::TransportFailed { .. } => "TransportFailed",
            Action::Cancel => "Cancel",
            Action::DismissError => "DismissError",
            Action::Retry => "Retry",
            Action::AttachmentEncoded { .. } => "AttachmentEncoded",
            Action::AttachmentFailed { .. } => "AttachmentFailed",
            Action::RemoveAttachment(_) => "RemoveAttachment",
            Action::ApproveToolCall(_) => "ApproveToolCall",
            Action::RejectToolCall(_) => "RejectToolCall",
            Action::ToolCallUpdate { .. } => "ToolCallUpdate",
        }
    }
}

/// I/O the caller must perform after an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    /// Start a transport request for the current messages under this id.
    SpawnRequest(u64),
    /// Abort the in-flight transport request.
    StopTransport,
    /// Read and encode this file, then dispatch `AttachmentEncoded`/`AttachmentFailed`.
    EncodeAttachment(PendingUpload),
    /// Relay a tool approval decision to whoever executes tools.
    ToolDecision { id: String, approved: bool },
}

/// A submission refused up front. The session is left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Blank text and no files.
    Empty,
    /// A request or upload is already in flight.
    Busy,
    /// Text exceeds the configured maximum length (in characters).
    TooLong { max: usize, actual: usize },
    /// Retry requested but there is no user message to resend.
    NothingToRetry,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Empty => write!(f, "message is empty"),
            ValidationError::Busy => write!(f, "a response is still in progress"),
            ValidationError::TooLong { max, actual } => {
                write!(f, "message is too long ({actual} > {max} characters)")
            }
            ValidationError::NothingToRetry => write!(f, "nothing to retry"),
        }
    }
}

impl std::error::Error for ValidationError {}

pub fn update(session: &mut Session, action: Action) -> Result<Effect, ValidationError> {
    debug!(
        "update: {} (status={})",
        action.label(),
        session.status.label()
    );
    match action {
        Action::Submit { text, files } => submit(session, text, files),
        Action::Retry => retry(session),
        Action::TransportEvent { request_id, event } => {
            if !is_active(session, request_id) {
                return Ok(Effect::None);
            }
            apply_event(session, event);
            Ok(Effect::None)
        }
        Action::TransportComplete { request_id } => {
            if !is_active(session, request_id) {
                return Ok(Effect::None);
            }
            session.active_request = None;
            session.status = SessionStatus::Idle;
            let text = session.seal_open().unwrap_or_default();
            info!("Response complete ({} chars)", text.len());
            session.listener.response_received(&text);
            Ok(next_upload(session))
        }
        Action::TransportFailed { request_id, error } => {
            if !is_active(session, request_id) {
                return Ok(Effect::None);
            }
            warn!("Transport failed: {}", error);
            session.active_request = None;
            session.seal_open();
            session.status = SessionStatus::Error;
            session.error = Some(error.to_string());
            session.listener.error(&error);
            // Queued uploads wait until the error is dismissed or a new message is sent
            Ok(Effect::None)
        }
        Action::Cancel => {
            if session.status != SessionStatus::Streaming {
                debug!("Cancel ignored: not streaming");
                return Ok(Effect::None);
            }
            info!("Response cancelled");
            session.active_request = None;
            session.seal_open();
            session.status = SessionStatus::Idle;
            if !session.pending_uploads.is_empty() {
                info!(
                    "Dropping {} queued upload(s) on cancel",
                    session.pending_uploads.len()
                );
                session.pending_uploads.clear();
            }
            Ok(Effect::StopTransport)
        }
        Action::DismissError => {
            session.upload_failures.clear();
            if session.status != SessionStatus::Error {
                return Ok(Effect::None);
            }
            session.status = SessionStatus::Idle;
            session.error = None;
            Ok(next_upload(session))
        }
        Action::AttachmentEncoded {
            upload_id,
            attachment,
        } => {
            if !take_upload(session, &upload_id) {
                return Ok(Effect::None);
            }
            let notice = attachment.notice();
            let mut msg = Message::user_text(&notice);
            if let Err(e) = msg.attach(attachment.descriptor, attachment.part) {
                // Fresh message, so this can't collide
                warn!("Failed to attach upload {}: {}", upload_id, e);
            }
            Ok(send_user_message(session, msg, &notice))
        }
        Action::AttachmentFailed { upload_id, error } => {
            if !take_upload(session, &upload_id) {
                return Ok(Effect::None);
            }
            warn!("Upload failed: {}", error);
            session.listener.error(&error);
            session.upload_failures.push(UploadFailure {
                upload_id,
                message: error.to_string(),
                file: error.file,
            });
            Ok(next_upload(session))
        }
        Action::RemoveAttachment(id) => {
            let before = session.pending_uploads.len();
            session.pending_uploads.retain(|u| u.id != id);
            if session.pending_uploads.len() == before {
                debug!("RemoveAttachment: {} is not queued", id);
            }
            Ok(Effect::None)
        }
        Action::ApproveToolCall(id) => Ok(decide_tool_call(session, id, true)),
        Action::RejectToolCall(id) => Ok(decide_tool_call(session, id, false)),
        Action::ToolCallUpdate {
            id,
            status,
            result,
            error,
        } => {
            let Some(tc) = find_tool_call_mut(session, &id) else {
                warn!("ToolCallUpdate for unknown tool call {}", id);
                return Ok(Effect::None);
            };
            if let Err(e) = tc.transition(status) {
                warn!("{}", e);
                return Ok(Effect::None);
            }
            if result.is_some() {
                tc.result = result;
            }
            if error.is_some() {
                tc.error = error;
            }
            Ok(Effect::None)
        }
    }
}

fn is_active(session: &Session, request_id: u64) -> bool {
    if session.active_request == Some(request_id) {
        return true;
    }
    debug!(
        "Dropping event for stale request {} (active={:?})",
        request_id, session.active_request
    );
    false
}

fn submit(session: &mut Session, text: String, files: Vec<PathBuf>) -> Result<Effect, ValidationError> {
    let has_text = !text.trim().is_empty();
    if !has_text && files.is_empty() {
        return Err(ValidationError::Empty);
    }
    if session.is_busy() {
        return Err(ValidationError::Busy);
    }
    if let Some(max) = session.settings.max_input_length {
        let actual = text.chars().count();
        if actual > max {
            return Err(ValidationError::TooLong { max, actual });
        }
    }

    if session.status == SessionStatus::Error {
        session.status = SessionStatus::Idle;
        session.error = None;
    }
    session
        .pending_uploads
        .extend(files.into_iter().map(PendingUpload::new));

    if has_text {
        let msg = Message::user_text(&text);
        Ok(send_user_message(session, msg, &text))
    } else {
        Ok(next_upload(session))
    }
}

fn retry(session: &mut Session) -> Result<Effect, ValidationError> {
    if session.is_busy() {
        return Err(ValidationError::Busy);
    }
    let Some(last) = session.last_user_message() else {
        return Err(ValidationError::NothingToRetry);
    };
    let mut msg = last.clone();
    msg.id = new_id();
    let text = msg.text();
    info!("Retrying last user message");
    Ok(send_user_message(session, msg, &text))
}

/// Appends a user message and starts a request for it.
fn send_user_message(session: &mut Session, msg: Message, text: &str) -> Effect {
    session.error = None;
    session.listener.message_sent(text);
    session.messages.push(msg);
    let request_id = session.begin_request();
    info!(
        "Submitted message (request={}, messages={})",
        request_id,
        session.messages.len()
    );
    Effect::SpawnRequest(request_id)
}

/// Starts encoding the next queued file if nothing else is in flight.
fn next_upload(session: &mut Session) -> Effect {
    if session.is_busy() || session.status == SessionStatus::Error {
        return Effect::None;
    }
    match session.pending_uploads.pop_front() {
        Some(upload) => {
            debug!("Encoding upload {} ({})", upload.id, upload.name);
            session.uploading = Some(upload.clone());
            Effect::EncodeAttachment(upload)
        }
        None => Effect::None,
    }
}

/// Clears `uploading` if it matches `upload_id`.
fn take_upload(session: &mut Session, upload_id: &str) -> bool {
    match &session.uploading {
        Some(u) if u.id == upload_id => {
            session.uploading = None;
            true
        }
        _ => {
            warn!("Result for unexpected upload {}", upload_id);
            false
        }
    }
}

fn apply_event(session: &mut Session, event: StreamEvent) {
    session.status = SessionStatus::Streaming;
    match event {
        StreamEvent::TextDelta(delta) => {
            session.open_assistant_mut().append_text(&delta);
        }
        StreamEvent::ReasoningDelta(delta) => {
            session.open_assistant_mut().append_reasoning(&delta);
        }
        StreamEvent::ToolCall {
            id,
            name,
            arguments,
        } => {
            if find_tool_call_mut(session, &id).is_some() {
                warn!("Ignoring duplicate tool call {}", id);
                return;
            }
            let requires_approval = session.settings.require_tool_approval;
            info!("Tool call {} ({}) received", id, name);
            session
                .open_assistant_mut()
                .tool_calls
                .push(ToolCall::new(id, name, arguments, requires_approval));
        }
        StreamEvent::ToolOutput { id, output } => {
            let Some(tc) = find_tool_call_mut(session, &id) else {
                warn!("Output for unknown tool call {}", id);
                return;
            };
            if let Err(e) = tc.ensure_started().and_then(|_| tc.complete(output)) {
                warn!("{}", e);
            }
        }
        StreamEvent::ToolError { id, error } => {
            let Some(tc) = find_tool_call_mut(session, &id) else {
                warn!("Error for unknown tool call {}", id);
                return;
            };
            if let Err(e) = tc.ensure_started().and_then(|_| tc.fail(error)) {
                warn!("{}", e);
            }
        }
    }
}

fn find_tool_call_mut<'a>(session: &'a mut Session, id: &str) -> Option<&'a mut ToolCall> {
    session
        .messages
        .iter_mut()
        .rev()
        .find_map(|m| m.tool_call_mut(id))
}

fn decide_tool_call(session: &mut Session, id: String, approved: bool) -> Effect {
    let Some(tc) = find_tool_call_mut(session, &id) else {
        warn!("Decision for unknown tool call {}", id);
        return Effect::None;
    };
    let result = if approved { tc.approve() } else { tc.reject() };
    match result {
        Ok(()) => {
            info!("Tool call {} {}", id, tc.status.label());
            Effect::ToolDecision { id, approved }
        }
        Err(e) => {
            warn!("{}", e);
            Effect::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;
    use crate::test_support::{RecordingListener, recording_session, test_session};
    use serde_json::{Map, json};
    use std::io;

    fn submit_text(session: &mut Session, text: &str) -> Result<Effect, ValidationError> {
        update(
            session,
            Action::Submit {
                text: text.to_string(),
                files: vec![],
            },
        )
    }

    fn delta(request_id: u64, text: &str) -> Action {
        Action::TransportEvent {
            request_id,
            event: StreamEvent::TextDelta(text.to_string()),
        }
    }

    /// Submits and returns the spawned request id.
    fn start(session: &mut Session, text: &str) -> u64 {
        match submit_text(session, text).unwrap() {
            Effect::SpawnRequest(id) => id,
            other => panic!("expected SpawnRequest, got {:?}", other),
        }
    }

    fn encoded(name: &str) -> EncodedAttachment {
        use crate::core::attachment::{AttachmentDescriptor, AttachmentKind};
        use crate::core::message::FilePart;
        let url = "data:text/plain;base64,aGk=".to_string();
        EncodedAttachment {
            descriptor: AttachmentDescriptor {
                id: new_id(),
                kind: AttachmentKind::File,
                url: url.clone(),
                name: name.to_string(),
                size: Some(2048),
                mime_type: Some("text/plain".to_string()),
            },
            part: FilePart {
                media_type: "text/plain".to_string(),
                filename: name.to_string(),
                url,
            },
        }
    }

    #[test]
    fn test_empty_submit_rejected_without_mutation() {
        let mut session = test_session();
        assert_eq!(submit_text(&mut session, ""), Err(ValidationError::Empty));
        assert_eq!(submit_text(&mut session, "   \n\t"), Err(ValidationError::Empty));
        assert!(session.messages.is_empty());
        assert_eq!(session.status, SessionStatus::Idle);
    }

    #[test]
    fn test_submit_appends_user_message() {
        let (mut session, listener) = recording_session();
        start(&mut session, "hi");
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.messages[0].text(), "hi");
        assert_eq!(session.status, SessionStatus::Submitted);
        assert_eq!(listener.sent(), vec!["hi".to_string()]);
    }

    #[test]
    fn test_concurrent_submit_rejected() {
        let mut session = test_session();
        let id = start(&mut session, "first");
        assert_eq!(submit_text(&mut session, "second"), Err(ValidationError::Busy));
        update(&mut session, delta(id, "x")).unwrap();
        assert_eq!(submit_text(&mut session, "third"), Err(ValidationError::Busy));
        assert_eq!(session.messages.len(), 2);
    }

    #[test]
    fn test_too_long_rejected() {
        let mut session = test_session();
        session.settings.max_input_length = Some(3);
        assert_eq!(
            submit_text(&mut session, "four"),
            Err(ValidationError::TooLong { max: 3, actual: 4 })
        );
        assert!(session.messages.is_empty());
        start(&mut session, "abc");
    }

    #[test]
    fn test_first_delta_creates_single_assistant_message() {
        let mut session = test_session();
        let id = start(&mut session, "Hello");
        update(&mut session, delta(id, "Hi")).unwrap();
        assert_eq!(session.status, SessionStatus::Streaming);
        update(&mut session, delta(id, " there")).unwrap();
        let assistants: Vec<_> = session
            .messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .collect();
        assert_eq!(assistants.len(), 1);
        assert!(assistants[0].is_open());
    }

    #[test]
    fn test_delta_without_user_message_creates_assistant() {
        let mut session = test_session();
        let id = session.begin_request();
        update(&mut session, delta(id, "unprompted")).unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::Assistant);
    }

    #[test]
    fn test_streamed_response_scenario() {
        let (mut session, listener) = recording_session();
        let id = start(&mut session, "Hello");
        update(&mut session, delta(id, "Hi")).unwrap();
        update(&mut session, delta(id, " there")).unwrap();
        update(&mut session, Action::TransportComplete { request_id: id }).unwrap();

        let last = session.messages.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.text(), "Hi there");
        assert!(!last.is_open());
        assert_eq!(session.status, SessionStatus::Idle);
        assert_eq!(listener.received(), vec!["Hi there".to_string()]);

        // A duplicate completion for the same request is stale
        update(&mut session, Action::TransportComplete { request_id: id }).unwrap();
        assert_eq!(listener.received().len(), 1);
    }

    #[test]
    fn test_response_text_ignores_file_parts() {
        let (mut session, listener) = recording_session();
        let id = start(&mut session, "draw");
        update(&mut session, delta(id, "Here: ")).unwrap();
        let enc = encoded("pic.txt");
        session
            .open_assistant_mut()
            .attach(enc.descriptor, enc.part)
            .unwrap();
        update(&mut session, delta(id, "done")).unwrap();
        update(&mut session, Action::TransportComplete { request_id: id }).unwrap();
        assert_eq!(listener.received(), vec!["Here: done".to_string()]);
        assert_eq!(session.messages.last().unwrap().parts.len(), 3);
    }

    #[test]
    fn test_transport_error_keeps_partial_content() {
        let (mut session, listener) = recording_session();
        let id = start(&mut session, "Hello");
        update(&mut session, delta(id, "Partial")).unwrap();
        update(
            &mut session,
            Action::TransportFailed {
                request_id: id,
                error: TransportError::Network("reset".into()),
            },
        )
        .unwrap();

        assert_eq!(session.status, SessionStatus::Error);
        assert_eq!(session.error.as_deref(), Some("network error: reset"));
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].text(), "Partial");
        assert!(!session.messages[1].is_open());
        assert_eq!(listener.errors().len(), 1);

        update(&mut session, Action::DismissError).unwrap();
        assert_eq!(session.status, SessionStatus::Idle);
        assert!(session.error.is_none());
        assert_eq!(session.messages.len(), 2);
    }

    #[test]
    fn test_submit_from_error_clears_it() {
        let mut session = test_session();
        let id = start(&mut session, "a");
        update(
            &mut session,
            Action::TransportFailed {
                request_id: id,
                error: TransportError::Stream("oops".into()),
            },
        )
        .unwrap();
        start(&mut session, "b");
        assert_eq!(session.status, SessionStatus::Submitted);
        assert!(session.error.is_none());
    }

    #[test]
    fn test_cancel_only_while_streaming() {
        let mut session = test_session();
        assert_eq!(update(&mut session, Action::Cancel), Ok(Effect::None));

        let id = start(&mut session, "Hello");
        assert_eq!(update(&mut session, Action::Cancel), Ok(Effect::None));
        assert_eq!(session.status, SessionStatus::Submitted);

        update(&mut session, delta(id, "Hal")).unwrap();
        assert_eq!(update(&mut session, Action::Cancel), Ok(Effect::StopTransport));
        assert_eq!(session.status, SessionStatus::Idle);
        assert_eq!(session.messages.last().unwrap().text(), "Hal");
        assert!(!session.messages.last().unwrap().is_open());
    }

    #[test]
    fn test_deltas_after_cancel_are_dropped() {
        let (mut session, listener) = recording_session();
        let id = start(&mut session, "Hello");
        update(&mut session, delta(id, "Hi")).unwrap();
        update(&mut session, Action::Cancel).unwrap();

        update(&mut session, delta(id, " late")).unwrap();
        update(&mut session, Action::TransportComplete { request_id: id }).unwrap();

        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].text(), "Hi");
        assert_eq!(session.status, SessionStatus::Idle);
        assert!(listener.received().is_empty());
    }

    #[test]
    fn test_stale_request_does_not_touch_new_one() {
        let mut session = test_session();
        let old = start(&mut session, "one");
        update(&mut session, delta(old, "x")).unwrap();
        update(&mut session, Action::Cancel).unwrap();
        let new = start(&mut session, "two");
        update(&mut session, delta(old, "stale")).unwrap();
        update(&mut session, delta(new, "fresh")).unwrap();
        assert_eq!(session.messages.last().unwrap().text(), "fresh");
    }

    #[test]
    fn test_retry_resends_last_user_message() {
        let mut session = test_session();
        assert_eq!(
            update(&mut session, Action::Retry),
            Err(ValidationError::NothingToRetry)
        );
        let id = start(&mut session, "again");
        update(
            &mut session,
            Action::TransportFailed {
                request_id: id,
                error: TransportError::Network("down".into()),
            },
        )
        .unwrap();
        let effect = update(&mut session, Action::Retry).unwrap();
        assert!(matches!(effect, Effect::SpawnRequest(_)));
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].text(), "again");
        assert_ne!(session.messages[0].id, session.messages[1].id);
    }

    #[test]
    fn test_attachment_failure_is_isolated() {
        let (mut session, listener) = recording_session();
        let effect = update(
            &mut session,
            Action::Submit {
                text: String::new(),
                files: vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")],
            },
        )
        .unwrap();
        let Effect::EncodeAttachment(first) = effect else {
            panic!("expected first upload to encode");
        };
        assert_eq!(first.name, "a.txt");
        assert_eq!(submit_text(&mut session, "while encoding"), Err(ValidationError::Busy));

        let effect = update(
            &mut session,
            Action::AttachmentEncoded {
                upload_id: first.id.clone(),
                attachment: encoded("a.txt"),
            },
        )
        .unwrap();
        let Effect::SpawnRequest(id) = effect else {
            panic!("expected request for first upload");
        };
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].text(), "Uploaded file: a.txt (2.00 KB)");
        assert_eq!(session.messages[0].attachments.len(), 1);

        update(&mut session, delta(id, "Got it")).unwrap();
        let effect = update(&mut session, Action::TransportComplete { request_id: id }).unwrap();
        let Effect::EncodeAttachment(second) = effect else {
            panic!("expected second upload after completion");
        };
        assert_eq!(second.name, "b.txt");

        let effect = update(
            &mut session,
            Action::AttachmentFailed {
                upload_id: second.id.clone(),
                error: EncodeError {
                    file: "b.txt".into(),
                    source: io::Error::new(io::ErrorKind::NotFound, "missing"),
                },
            },
        )
        .unwrap();
        assert_eq!(effect, Effect::None);
        assert_eq!(session.status, SessionStatus::Idle);
        assert!(session.error.is_none());
        assert_eq!(session.upload_failures.len(), 1);
        assert_eq!(session.upload_failures[0].file, "b.txt");
        assert_eq!(session.messages.len(), 2);
        assert_eq!(
            listener.sent(),
            vec!["Uploaded file: a.txt (2.00 KB)".to_string()]
        );
        assert_eq!(listener.errors().len(), 1);
    }

    #[test]
    fn test_text_with_files_sends_text_first() {
        let mut session = test_session();
        let effect = update(
            &mut session,
            Action::Submit {
                text: "see attached".into(),
                files: vec![PathBuf::from("x.png")],
            },
        )
        .unwrap();
        let Effect::SpawnRequest(id) = effect else {
            panic!("expected text request first");
        };
        assert_eq!(session.pending_uploads.len(), 1);
        let effect = update(&mut session, Action::TransportComplete { request_id: id }).unwrap();
        assert!(matches!(effect, Effect::EncodeAttachment(ref u) if u.name == "x.png"));
    }

    #[test]
    fn test_uploads_pause_on_transport_error() {
        let mut session = test_session();
        let effect = update(
            &mut session,
            Action::Submit {
                text: "first".into(),
                files: vec![PathBuf::from("x.png")],
            },
        )
        .unwrap();
        let Effect::SpawnRequest(id) = effect else {
            panic!("expected request");
        };
        let effect = update(
            &mut session,
            Action::TransportFailed {
                request_id: id,
                error: TransportError::Network("down".into()),
            },
        )
        .unwrap();
        assert_eq!(effect, Effect::None);
        assert_eq!(session.pending_uploads.len(), 1);

        let effect = update(&mut session, Action::DismissError).unwrap();
        assert!(matches!(effect, Effect::EncodeAttachment(_)));
    }

    #[test]
    fn test_cancel_drops_queued_uploads() {
        let mut session = test_session();
        let effect = update(
            &mut session,
            Action::Submit {
                text: "first".into(),
                files: vec![PathBuf::from("x.png"), PathBuf::from("y.png")],
            },
        )
        .unwrap();
        let Effect::SpawnRequest(id) = effect else {
            panic!("expected request");
        };
        update(&mut session, delta(id, "...")).unwrap();
        update(&mut session, Action::Cancel).unwrap();
        assert!(session.pending_uploads.is_empty());
    }

    #[test]
    fn test_remove_queued_attachment() {
        let mut session = test_session();
        let effect = update(
            &mut session,
            Action::Submit {
                text: "first".into(),
                files: vec![PathBuf::from("x.png"), PathBuf::from("y.png")],
            },
        )
        .unwrap();
        let Effect::SpawnRequest(id) = effect else {
            panic!("expected request");
        };
        let x = session.pending_uploads[0].id.clone();
        update(&mut session, Action::RemoveAttachment(x)).unwrap();
        assert_eq!(session.pending_uploads.len(), 1);
        let effect = update(&mut session, Action::TransportComplete { request_id: id }).unwrap();
        assert!(matches!(effect, Effect::EncodeAttachment(ref u) if u.name == "y.png"));
    }

    #[test]
    fn test_unexpected_upload_result_ignored() {
        let mut session = test_session();
        let effect = update(
            &mut session,
            Action::AttachmentEncoded {
                upload_id: "nope".into(),
                attachment: encoded("z.txt"),
            },
        )
        .unwrap();
        assert_eq!(effect, Effect::None);
        assert!(session.messages.is_empty());
    }

    #[test]
    fn test_tool_call_approval_flow() {
        let mut session = test_session();
        session.settings.require_tool_approval = true;
        let id = start(&mut session, "add 3 and 7");
        let mut args = Map::new();
        args.insert("a".into(), json!(3));
        update(
            &mut session,
            Action::TransportEvent {
                request_id: id,
                event: StreamEvent::ToolCall {
                    id: "c1".into(),
                    name: "add".into(),
                    arguments: args.clone(),
                },
            },
        )
        .unwrap();
        // Same id again is ignored
        update(
            &mut session,
            Action::TransportEvent {
                request_id: id,
                event: StreamEvent::ToolCall {
                    id: "c1".into(),
                    name: "add".into(),
                    arguments: args,
                },
            },
        )
        .unwrap();
        let msg = session.messages.last().unwrap();
        assert_eq!(msg.tool_calls.len(), 1);
        assert_eq!(msg.tool_calls[0].status, ToolCallStatus::Pending);

        let effect = update(&mut session, Action::ApproveToolCall("c1".into())).unwrap();
        assert_eq!(
            effect,
            Effect::ToolDecision {
                id: "c1".into(),
                approved: true
            }
        );
        // Second decision is an illegal transition
        assert_eq!(
            update(&mut session, Action::RejectToolCall("c1".into())),
            Ok(Effect::None)
        );

        update(
            &mut session,
            Action::TransportEvent {
                request_id: id,
                event: StreamEvent::ToolOutput {
                    id: "c1".into(),
                    output: json!({"result": 10}),
                },
            },
        )
        .unwrap();
        let tc = &session.messages.last().unwrap().tool_calls[0];
        assert_eq!(tc.status, ToolCallStatus::Completed);
        assert_eq!(tc.result, Some(json!({"result": 10})));
    }

    #[test]
    fn test_tool_call_update_drives_status() {
        let mut session = test_session();
        let id = start(&mut session, "go");
        update(
            &mut session,
            Action::TransportEvent {
                request_id: id,
                event: StreamEvent::ToolCall {
                    id: "c2".into(),
                    name: "search".into(),
                    arguments: Map::new(),
                },
            },
        )
        .unwrap();
        update(
            &mut session,
            Action::ToolCallUpdate {
                id: "c2".into(),
                status: ToolCallStatus::Executing,
                result: None,
                error: None,
            },
        )
        .unwrap();
        update(
            &mut session,
            Action::ToolCallUpdate {
                id: "c2".into(),
                status: ToolCallStatus::Error,
                result: None,
                error: Some("timeout".into()),
            },
        )
        .unwrap();
        let tc = &session.messages.last().unwrap().tool_calls[0];
        assert_eq!(tc.status, ToolCallStatus::Error);
        assert_eq!(tc.error.as_deref(), Some("timeout"));

        // Terminal: nothing moves it now
        update(
            &mut session,
            Action::ToolCallUpdate {
                id: "c2".into(),
                status: ToolCallStatus::Completed,
                result: Some(json!(1)),
                error: None,
            },
        )
        .unwrap();
        let tc = &session.messages.last().unwrap().tool_calls[0];
        assert_eq!(tc.status, ToolCallStatus::Error);
        assert_eq!(tc.result, None);
    }

    #[test]
    fn test_reasoning_deltas_attach_to_assistant() {
        let mut session = test_session();
        let id = start(&mut session, "why?");
        update(
            &mut session,
            Action::TransportEvent {
                request_id: id,
                event: StreamEvent::ReasoningDelta("Considering".into()),
            },
        )
        .unwrap();
        update(&mut session, delta(id, "Because.")).unwrap();
        let msg = session.messages.last().unwrap();
        assert_eq!(msg.reasoning.len(), 1);
        assert_eq!(msg.reasoning[0].content, "Considering");
        assert_eq!(msg.text(), "Because.");
    }

    #[test]
    fn test_listener_type_is_shareable() {
        // Listeners are shared with the event loop behind an Arc
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RecordingListener>();
    }
}
