//! Session and message models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a session's agent execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No execution in flight
    Idle,
    /// An agent execution is in progress
    Running,
    /// The last execution failed
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Error => "error",
        }
    }
}

/// A durable session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique session ID
    pub id: Uuid,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Current execution status
    pub status: SessionStatus,
}

impl SessionRecord {
    /// Create a new idle session
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            status: SessionStatus::Idle,
        }
    }
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Message role in a session transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

/// A persisted chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Unique message ID
    pub id: Uuid,

    /// Role of the message sender
    pub role: MessageRole,

    /// Message content
    pub content: String,

    /// Structured metadata (tool name, input, preview, links)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,

    /// When the message was recorded
    pub timestamp: DateTime<Utc>,
}

impl StoredMessage {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content, None)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content, None)
    }

    /// Create a new tool-result message with metadata
    pub fn tool(content: impl Into<String>, meta: serde_json::Value) -> Self {
        Self::with_role(MessageRole::Tool, content, Some(meta))
    }

    fn with_role(
        role: MessageRole,
        content: impl Into<String>,
        meta: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            meta,
            timestamp: Utc::now(),
        }
    }
}
