//! # Tool Calls
//!
//! A tool call is requested by the model and then driven through its
//! lifecycle by the approval flow and the transport:
//!
//! ```text
//!  pending ──approve──▶ approved ──start──▶ executing ──▶ completed
//!     │                                        ▲     └──▶ error
//!     ├──reject──▶ rejected                    │
//!     └──start (no approval required)──────────┘
//! ```
//!
//! Transitions never move backwards. `rejected`, `completed` and `error`
//! are terminal.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Approved,
    Rejected,
    Executing,
    Completed,
    Error,
}

impl ToolCallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ToolCallStatus::Rejected | ToolCallStatus::Completed | ToolCallStatus::Error
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ToolCallStatus::Pending => "pending",
            ToolCallStatus::Approved => "approved",
            ToolCallStatus::Rejected => "rejected",
            ToolCallStatus::Executing => "executing",
            ToolCallStatus::Completed => "completed",
            ToolCallStatus::Error => "error",
        }
    }
}

/// An attempted move the lifecycle does not allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub id: String,
    pub from: ToolCallStatus,
    pub to: ToolCallStatus,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tool call {}: cannot move from {} to {}",
            self.id,
            self.from.label(),
            self.to.label()
        )
    }
}

impl std::error::Error for TransitionError {}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "requireApproval", default)]
    pub requires_approval: bool,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: Map<String, Value>,
        requires_approval: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            status: ToolCallStatus::Pending,
            result: None,
            error: None,
            requires_approval,
        }
    }

    fn allows(&self, to: ToolCallStatus) -> bool {
        use ToolCallStatus::*;
        match (self.status, to) {
            (Pending, Approved) | (Pending, Rejected) => self.requires_approval,
            (Pending, Executing) => !self.requires_approval,
            (Approved, Executing) => true,
            (Executing, Completed) | (Executing, Error) => true,
            _ => false,
        }
    }

    /// Moves to `to` if the lifecycle allows it.
    pub fn transition(&mut self, to: ToolCallStatus) -> Result<(), TransitionError> {
        if !self.allows(to) {
            return Err(TransitionError {
                id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn approve(&mut self) -> Result<(), TransitionError> {
        self.transition(ToolCallStatus::Approved)
    }

    pub fn reject(&mut self) -> Result<(), TransitionError> {
        self.transition(ToolCallStatus::Rejected)
    }

    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(ToolCallStatus::Executing)
    }

    pub fn complete(&mut self, result: Value) -> Result<(), TransitionError> {
        self.transition(ToolCallStatus::Completed)?;
        self.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(ToolCallStatus::Error)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Moves a not-yet-running call into `executing` so an output can land.
    /// Calls still awaiting approval stay where they are.
    pub fn ensure_started(&mut self) -> Result<(), TransitionError> {
        match self.status {
            ToolCallStatus::Executing => Ok(()),
            ToolCallStatus::Pending if self.requires_approval => Err(TransitionError {
                id: self.id.clone(),
                from: self.status,
                to: ToolCallStatus::Executing,
            }),
            _ => self.start(),
        }
    }

    /// Short `key: value` summary of the arguments.
    pub fn summary(&self) -> String {
        self.arguments
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{k}: {s}"),
                other => format!("{k}: {other}"),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
