//! Task executor - runs one agent execution per session
//!
//! Translates backend notifications into the session's event log, persists
//! durable artifacts (messages, events, status), and handles the three
//! terminal paths: completion, cancellation, and failure.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};
use uuid::Uuid;

use bp_core::session::{SessionStatus, SessionStore, StoredMessage};

use crate::backend::{AgentBackend, AgentNotification};
use crate::error::{Result, RuntimeError};
use crate::event::AgentEvent;
use crate::log::EventLog;
use crate::sanitize::{extract_tool_context, sanitize_tool_input};
use crate::screenshots::ScreenshotStore;
use crate::session::{SessionRegistry, SessionRuntime};

/// Correlates a tool's start notification with its end notification
struct ToolCallRecord {
    name: String,
    input: Value,
}

/// Executes agent tasks against session runtimes
pub struct TaskExecutor {
    backend: Arc<dyn AgentBackend>,
    store: Arc<SessionStore>,
    screenshots: Arc<ScreenshotStore>,
    registry: Arc<SessionRegistry>,
}

impl TaskExecutor {
    pub fn new(
        backend: Arc<dyn AgentBackend>,
        store: Arc<SessionStore>,
        screenshots: Arc<ScreenshotStore>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            backend,
            store,
            screenshots,
            registry,
        }
    }

    /// The session registry this executor admits against
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Admit and spawn a background execution for a session
    ///
    /// Fails with `AgentBusy` while a previous execution is still in
    /// flight, leaving no state behind. Returns the fresh event log.
    pub fn start(self: &Arc<Self>, session_id: Uuid, user_message: String) -> Result<Arc<EventLog>> {
        let runtime = self.registry.get_or_create(session_id);

        let executor = Arc::clone(self);
        let rt = Arc::clone(&runtime);
        runtime.begin(move |log, cancel_rx| async move {
            executor.run(rt, log, cancel_rx, user_message).await;
        })
    }

    /// Cancel a session's in-flight execution, waiting for it to unwind
    ///
    /// Returns `false` when nothing was running.
    pub async fn cancel(&self, session_id: Uuid) -> bool {
        match self.registry.get(session_id) {
            Some(runtime) => runtime.cancel().await,
            None => false,
        }
    }

    async fn run(
        &self,
        runtime: Arc<SessionRuntime>,
        log: Arc<EventLog>,
        cancel_rx: oneshot::Receiver<()>,
        user_message: String,
    ) {
        let session_id = runtime.session_id;

        match self.drive(session_id, &log, cancel_rx, &user_message).await {
            Ok(()) => {
                info!("Execution completed for session {}", session_id);
            }
            Err(RuntimeError::Cancelled) => {
                self.emit_terminal(session_id, &log, AgentEvent::error("Task cancelled"));
                self.set_status(session_id, SessionStatus::Idle);
                info!("Execution cancelled for session {}", session_id);
            }
            Err(err) => {
                self.emit_terminal(session_id, &log, AgentEvent::error(err.to_string()));
                self.set_status(session_id, SessionStatus::Error);
                error!("Execution failed for session {}: {}", session_id, err);
            }
        }

        runtime.finish();
    }

    /// The happy path: status, backend stream, terminal `done` event
    async fn drive(
        &self,
        session_id: Uuid,
        log: &EventLog,
        mut cancel_rx: oneshot::Receiver<()>,
        user_message: &str,
    ) -> Result<()> {
        self.store
            .update_status(session_id, SessionStatus::Running)?;

        let (tx, mut rx) = mpsc::channel(64);
        let backend = Arc::clone(&self.backend);
        let task_text = user_message.to_string();
        let backend_task = tokio::spawn(async move { backend.run(task_text, tx).await });

        let mut final_text = String::new();
        let mut tool_calls: HashMap<String, ToolCallRecord> = HashMap::new();

        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    backend_task.abort();
                    let _ = backend_task.await;
                    return Err(RuntimeError::Cancelled);
                }
                notification = rx.recv() => match notification {
                    Some(notification) => self.handle_notification(
                        session_id,
                        log,
                        notification,
                        &mut final_text,
                        &mut tool_calls,
                    )?,
                    None => break,
                }
            }
        }

        // The notification channel closed; collect the backend's verdict.
        match backend_task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(join_err) => {
                return Err(RuntimeError::execution_failed(format!(
                    "Agent task aborted: {}",
                    join_err
                )))
            }
        }

        let final_text = final_text.trim();
        let result = if final_text.is_empty() {
            "Task completed."
        } else {
            final_text
        };

        self.emit(session_id, log, AgentEvent::done(result))?;
        self.store
            .append_message(session_id, &StoredMessage::assistant(result))?;
        self.store.update_status(session_id, SessionStatus::Idle)?;

        Ok(())
    }

    fn handle_notification(
        &self,
        session_id: Uuid,
        log: &EventLog,
        notification: AgentNotification,
        final_text: &mut String,
        tool_calls: &mut HashMap<String, ToolCallRecord>,
    ) -> Result<()> {
        match notification {
            AgentNotification::TextDelta { text } => {
                if !text.is_empty() {
                    final_text.push_str(&text);
                    self.emit(session_id, log, AgentEvent::token(text))?;
                }
            }
            AgentNotification::ThinkingDelta { text } => {
                if !text.is_empty() {
                    self.emit(session_id, log, AgentEvent::thinking(text))?;
                }
            }
            AgentNotification::ToolStart {
                run_id,
                name,
                input,
            } => {
                let clean_input = sanitize_tool_input(&input);
                tool_calls.insert(
                    run_id,
                    ToolCallRecord {
                        name: name.clone(),
                        input: clean_input.clone(),
                    },
                );
                self.emit(session_id, log, AgentEvent::tool_start(name, clean_input))?;
            }
            AgentNotification::ToolEnd { run_id, output } => {
                let record = tool_calls.remove(&run_id);
                let ctx = extract_tool_context(&output);
                let screenshot_url = ctx
                    .screenshot
                    .as_deref()
                    .and_then(|raw| self.screenshots.store(raw));

                let (tool_name, input) = match record {
                    Some(record) => (record.name, Some(record.input)),
                    None => ("tool".to_string(), None),
                };

                let meta = json!({
                    "tool_name": tool_name.clone(),
                    "run_id": run_id,
                    "input": input,
                    "output_preview": ctx.output_preview.clone(),
                    "url": ctx.url.clone(),
                    "screenshot": screenshot_url.clone(),
                });
                self.store.append_message(
                    session_id,
                    &StoredMessage::tool(ctx.output_preview.clone(), meta),
                )?;

                let mut data = json!({
                    "name": tool_name,
                    "output_preview": ctx.output_preview,
                });
                if let Some(url) = ctx.url {
                    data["url"] = json!(url);
                }
                if let Some(screenshot) = screenshot_url {
                    data["screenshot"] = json!(screenshot);
                }
                self.emit(session_id, log, AgentEvent::tool_end(data))?;
            }
            AgentNotification::Final { text } => {
                let text = text.trim();
                if !text.is_empty() {
                    *final_text = text.to_string();
                }
            }
        }
        Ok(())
    }

    /// Publish to the live log and append to the durable event log
    fn emit(&self, session_id: Uuid, log: &EventLog, event: AgentEvent) -> Result<()> {
        log.publish(event.clone())?;
        let wire = serde_json::to_value(&event).map_err(bp_core::Error::from)?;
        self.store.append_event(session_id, &wire)?;
        Ok(())
    }

    /// Emit on a terminal path, where the log must close even if
    /// persistence is failing
    fn emit_terminal(&self, session_id: Uuid, log: &EventLog, event: AgentEvent) {
        if let Err(e) = self.emit(session_id, log, event) {
            warn!(
                "Failed to record terminal event for session {}: {}",
                session_id, e
            );
        }
    }

    fn set_status(&self, session_id: Uuid, status: SessionStatus) {
        if let Err(e) = self.store.update_status(session_id, status) {
            warn!("Failed to update status for session {}: {}", session_id, e);
        }
    }
}
