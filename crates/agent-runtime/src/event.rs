//! Event types for agent execution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Kind of event emitted during an agent execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Incremental assistant text
    Token,
    /// Incremental reasoning text
    Thinking,
    /// A tool invocation started
    ToolStart,
    /// A tool invocation finished
    ToolEnd,
    /// Execution completed with a final answer
    Done,
    /// Execution failed or was cancelled
    Error,
}

impl EventKind {
    /// Check if this kind closes the event stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// A single event in a session's stream
///
/// Events are immutable once published; their position in the log defines
/// their order. The wire form is `{type, data, timestamp}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Event kind
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Structured payload
    pub data: Value,

    /// When the event was produced
    pub timestamp: DateTime<Utc>,
}

impl AgentEvent {
    /// Create a new event
    pub fn new(kind: EventKind, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now(),
        }
    }

    /// Create a token event carrying incremental assistant text
    pub fn token(text: impl Into<String>) -> Self {
        Self::new(EventKind::Token, json!({ "text": text.into() }))
    }

    /// Create a thinking event carrying incremental reasoning text
    pub fn thinking(text: impl Into<String>) -> Self {
        Self::new(EventKind::Thinking, json!({ "text": text.into() }))
    }

    /// Create a tool-start event
    pub fn tool_start(name: impl Into<String>, input: Value) -> Self {
        Self::new(
            EventKind::ToolStart,
            json!({ "name": name.into(), "input": input }),
        )
    }

    /// Create a tool-end event from an already-built payload
    pub fn tool_end(data: Value) -> Self {
        Self::new(EventKind::ToolEnd, data)
    }

    /// Create a done event carrying the final answer
    pub fn done(result: impl Into<String>) -> Self {
        Self::new(EventKind::Done, json!({ "result": result.into() }))
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error, json!({ "error": message.into() }))
    }

    /// Check if this event closes the stream
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}
