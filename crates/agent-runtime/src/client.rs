//! HTTP client for an external browser-agent worker
//!
//! The worker exposes `POST /run` and streams progress back as
//! server-sent-event frames, each carrying one JSON-encoded notification.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::backend::{AgentBackend, AgentNotification};
use crate::error::{Result, RuntimeError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunRequest<'a> {
    task: &'a str,
}

/// Backend that dispatches tasks to a browser-agent worker over HTTP
pub struct WorkerBackend {
    client: Client,
    url: String,
}

impl WorkerBackend {
    pub fn new(url: String) -> Self {
        Self {
            // Disable proxy for internal worker communication
            client: Client::builder()
                .no_proxy()
                .build()
                .unwrap_or_else(|_| Client::new()),
            url,
        }
    }
}

#[async_trait]
impl AgentBackend for WorkerBackend {
    async fn run(&self, task: String, tx: mpsc::Sender<AgentNotification>) -> Result<()> {
        let req = RunRequest { task: &task };

        info!("Sending task to agent worker: {}/run", self.url);

        let res = self
            .client
            .post(format!("{}/run", self.url))
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                RuntimeError::execution_failed(format!("Failed to connect to agent worker: {}", e))
            })?;

        if !res.status().is_success() {
            let error_text = res.text().await.unwrap_or_else(|_| String::new());
            return Err(RuntimeError::execution_failed(format!(
                "Agent worker returned error: {}",
                error_text
            )));
        }

        let mut stream = res.bytes_stream();
        let mut buffer = String::new();

        while let Some(item) = stream.next().await {
            let chunk = item
                .map_err(|e| RuntimeError::execution_failed(format!("Stream error: {}", e)))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(idx) = buffer.find("\n\n") {
                let frame = buffer.drain(..idx + 2).collect::<String>();
                if let Some(notification) = parse_sse_frame(&frame) {
                    if tx.send(notification).await.is_err() {
                        // Receiver dropped: the execution was cancelled.
                        return Ok(());
                    }
                }
            }
        }

        Ok(())
    }
}

/// Parse one SSE frame into a notification
///
/// Non-`data:` frames and unknown payloads are skipped.
fn parse_sse_frame(frame: &str) -> Option<AgentNotification> {
    let data = frame.trim().strip_prefix("data: ")?;
    match serde_json::from_str::<AgentNotification>(data) {
        Ok(notification) => Some(notification),
        Err(e) => {
            warn!("Skipping unparsable worker frame: {}", e);
            None
        }
    }
}
