//! Agent Runtime - session execution and event broadcast
//!
//! This crate turns one background agent execution per session into a
//! replayable, multi-reader event stream: single-flight admission,
//! cursor-based consumption, and cooperative cancellation.

mod backend;
mod client;
mod error;
mod event;
mod executor;
mod log;
mod sanitize;
mod screenshots;
mod session;

pub use backend::{AgentBackend, AgentNotification, MockBackend};
pub use client::WorkerBackend;
pub use error::{Result, RuntimeError};
pub use event::{AgentEvent, EventKind};
pub use executor::TaskExecutor;
pub use log::EventLog;
pub use sanitize::{clip_text, extract_tool_context, find_nested, sanitize_tool_input, ToolContext};
pub use screenshots::ScreenshotStore;
pub use session::{SessionRegistry, SessionRuntime};
