//! Plain-text rendering of the transcript.
//!
//! Every message becomes a block of lines; the viewport works in these lines.

use crate::core::attachment::format_size;
use crate::core::message::{Message, MessagePart, Role};
use crate::core::tool_call::{ToolCall, ToolCallStatus};

fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Assistant => "ai",
        Role::System => "system",
        Role::Tool => "tool",
    }
}

pub fn tool_call_line(tc: &ToolCall) -> String {
    let mut line = format!("  [tool] {}({}) {}", tc.name, tc.summary(), tc.status.label());
    if tc.status == ToolCallStatus::Pending && tc.requires_approval {
        line.push_str(&format!(" - /approve {0} or /reject {0}", tc.id));
    }
    line
}

fn tool_outcome(tc: &ToolCall) -> Option<String> {
    if let Some(error) = &tc.error {
        return Some(format!("    error: {error}"));
    }
    tc.result.as_ref().map(|r| format!("    -> {r}"))
}

/// Lines for a single message, without a trailing separator.
pub fn message_lines(msg: &Message, show_reasoning: bool) -> Vec<String> {
    let who = speaker(msg.role);
    let mut lines = Vec::new();

    if show_reasoning {
        for step in &msg.reasoning {
            for (i, text) in step.content.lines().enumerate() {
                if i == 0 {
                    lines.push(format!("{who}: ({}) {text}", step.title.to_lowercase()));
                } else {
                    lines.push(format!("    {text}"));
                }
            }
        }
    }

    for part in &msg.parts {
        match part {
            MessagePart::Text { text, .. } => {
                for line in text.lines() {
                    lines.push(format!("{who}: {line}"));
                }
            }
            MessagePart::File(file) => {
                let name = &file.filename;
                let size = msg
                    .attachments
                    .iter()
                    .find(|a| a.url == file.url)
                    .and_then(|a| a.size)
                    .map(format_size)
                    .unwrap_or_default();
                if size.is_empty() {
                    lines.push(format!("  [file] {name} ({})", file.media_type));
                } else {
                    lines.push(format!("  [file] {name} ({}, {size})", file.media_type));
                }
            }
            MessagePart::Other(_) => {}
        }
    }

    for tc in &msg.tool_calls {
        lines.push(tool_call_line(tc));
        lines.extend(tool_outcome(tc));
    }

    if lines.is_empty() && msg.is_open() {
        lines.push(format!("{who}: ..."));
    }
    lines
}

/// The whole conversation, messages separated by a blank line.
pub fn transcript_lines(messages: &[Message], show_reasoning: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for msg in messages {
        let block = message_lines(msg, show_reasoning);
        if block.is_empty() {
            continue;
        }
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.extend(block);
    }
    lines
}

pub const HELP: &str = "\
Type a message and press Enter to send it.
  /attach <path>    stage a file for the next message
  /detach <name>    unstage a file or drop it from the upload queue
  /send             send staged files without text
  /cancel           stop the current response
  /retry            send the last message again
  /dismiss          clear the error
  /approve <id>     approve a pending tool call
  /reject <id>      reject a pending tool call
  /up [n] /down [n] scroll the transcript
  /latest           jump to the newest content
  /save <path>      write the conversation to a JSON file
  /quit             exit
Start a line with // to send text beginning with a slash.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::attachment::{AttachmentDescriptor, AttachmentKind};
    use crate::core::message::FilePart;
    use serde_json::{Map, json};

    #[test]
    fn test_multiline_text() {
        let msg = Message::user_text("one\ntwo");
        assert_eq!(message_lines(&msg, true), vec!["you: one", "you: two"]);
    }

    #[test]
    fn test_open_empty_assistant_shows_placeholder() {
        let msg = Message::open_assistant();
        assert_eq!(message_lines(&msg, true), vec!["ai: ..."]);
    }

    #[test]
    fn test_reasoning_hidden_when_disabled() {
        let mut msg = Message::open_assistant();
        msg.append_reasoning("hmm");
        msg.append_text("answer");
        assert_eq!(
            message_lines(&msg, true),
            vec!["ai: (thinking) hmm", "ai: answer"]
        );
        assert_eq!(message_lines(&msg, false), vec!["ai: answer"]);
    }

    #[test]
    fn test_tool_call_lines() {
        let mut msg = Message::open_assistant();
        let mut args = Map::new();
        args.insert("a".into(), json!(3));
        msg.tool_calls
            .push(ToolCall::new("call_1", "add", args.clone(), true));
        let mut done = ToolCall::new("call_2", "add", args, false);
        done.start().unwrap();
        done.complete(json!(10)).unwrap();
        msg.tool_calls.push(done);

        let lines = message_lines(&msg, true);
        assert_eq!(
            lines,
            vec![
                "  [tool] add(a: 3) pending - /approve call_1 or /reject call_1",
                "  [tool] add(a: 3) completed",
                "    -> 10",
            ]
        );
    }

    #[test]
    fn test_file_part_shows_size() {
        let mut msg = Message::user_text("Uploaded file: a.txt (1.00 KB)");
        let part = FilePart {
            media_type: "text/plain".into(),
            filename: "a.txt".into(),
            url: "data:text/plain;base64,AA==".into(),
        };
        let descriptor = AttachmentDescriptor {
            id: "att".into(),
            kind: AttachmentKind::from_media_type("text/plain"),
            url: part.url.clone(),
            name: "a.txt".into(),
            size: Some(1024),
            mime_type: Some("text/plain".into()),
        };
        msg.attach(descriptor, part).unwrap();
        let lines = message_lines(&msg, true);
        assert_eq!(lines[1], "  [file] a.txt (text/plain, 1.0 KB)");
    }

    #[test]
    fn test_transcript_separates_messages() {
        let messages = vec![Message::user_text("hi"), Message::system_text("be nice")];
        assert_eq!(
            transcript_lines(&messages, true),
            vec!["you: hi", "", "system: be nice"]
        );
    }

    #[test]
    fn test_uninterpreted_parts_print_nothing() {
        let msg: Message = serde_json::from_value(json!({
            "id": "m1",
            "role": "assistant",
            "parts": [{"type": "step-start"}, {"type": "text", "text": "ok"}]
        }))
        .unwrap();
        assert_eq!(message_lines(&msg, true), vec!["ai: ok"]);
    }
}
