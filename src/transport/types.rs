use serde_json::{Map, Value};

/// One increment of an in-progress assistant response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text to append to the assistant message.
    TextDelta(String),
    /// Model reasoning to append to the current reasoning step.
    ReasoningDelta(String),
    /// The model requested a tool (arguments fully buffered).
    ToolCall {
        id: String,
        name: String,
        arguments: Map<String, Value>,
    },
    /// A tool finished and produced output.
    ToolOutput { id: String, output: Value },
    /// A tool failed.
    ToolError { id: String, error: String },
}

impl StreamEvent {
    pub fn label(&self) -> &'static str {
        match self {
            StreamEvent::TextDelta(_) => "text-delta",
            StreamEvent::ReasoningDelta(_) => "reasoning-delta",
            StreamEvent::ToolCall { .. } => "tool-call",
            StreamEvent::ToolOutput { .. } => "tool-output",
            StreamEvent::ToolError { .. } => "tool-error",
        }
    }
}
