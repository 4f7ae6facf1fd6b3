//! Agent backend interface
//!
//! A backend drives one external agent execution to completion, reporting
//! progress as a sequence of notifications. Cancellation is cooperative:
//! the executor aborts the driving task mid-flight.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

/// Progress notification from an agent backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentNotification {
    /// Incremental assistant text
    TextDelta { text: String },

    /// Incremental reasoning text
    ThinkingDelta { text: String },

    /// A tool invocation started
    ToolStart {
        run_id: String,
        name: String,
        input: Value,
    },

    /// A tool invocation finished
    ToolEnd { run_id: String, output: Value },

    /// The final answer
    Final { text: String },
}

/// Interface to an external agent execution
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Run one task to completion, sending progress notifications into `tx`
    ///
    /// Returns once the agent has finished; an `Err` marks the whole
    /// execution as failed.
    async fn run(&self, task: String, tx: mpsc::Sender<AgentNotification>) -> Result<()>;
}

/// Backend that echoes the task without driving a real agent
///
/// Selected with `AGENT_MODE=mock`; also used by tests.
#[derive(Debug, Clone)]
pub struct MockBackend {
    delay: Duration,
}

impl MockBackend {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}

#[async_trait]
impl AgentBackend for MockBackend {
    async fn run(&self, task: String, tx: mpsc::Sender<AgentNotification>) -> Result<()> {
        let text = format!("Mock response for: {}", task);

        tokio::time::sleep(self.delay).await;
        let _ = tx
            .send(AgentNotification::TextDelta { text: text.clone() })
            .await;

        tokio::time::sleep(self.delay).await;
        let _ = tx.send(AgentNotification::Final { text }).await;

        Ok(())
    }
}
