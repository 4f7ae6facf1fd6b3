//! Server configuration
//!
//! All knobs come from environment variables with sensible defaults, so the
//! binary runs with no flags in development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Which agent backend drives executions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    /// Echo backend, no external agent
    Mock,
    /// HTTP browser-agent worker
    Worker,
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for durable session data
    pub data_dir: PathBuf,
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// Backend selection
    pub agent_mode: AgentMode,
    /// Base URL of the browser-agent worker
    pub worker_url: String,
    /// Directory screenshots are written to
    pub screenshot_dir: PathBuf,
    /// URL prefix under which screenshots are served
    pub screenshot_url_prefix: String,
    /// Idle time after which a session runtime is evicted
    pub session_idle_timeout: Duration,
}

impl Config {
    /// Build the configuration from the environment
    pub fn from_env() -> Self {
        let data_dir = std::env::var("BP_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".bp-data"));

        let bind_addr = std::env::var("BP_BIND_ADDR")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8081)));

        let agent_mode = match std::env::var("AGENT_MODE")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "worker" => AgentMode::Worker,
            _ => AgentMode::Mock,
        };

        let worker_url = std::env::var("AGENT_WORKER_URL")
            .unwrap_or_else(|_| "http://localhost:4000".to_string());

        let screenshot_dir = std::env::var("SCREENSHOT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("screenshots"));

        let screenshot_url_prefix = std::env::var("SCREENSHOT_URL_PREFIX")
            .unwrap_or_else(|_| "/api/files/screenshots".to_string());

        let session_idle_timeout = std::env::var("SESSION_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(3600));

        Self {
            data_dir,
            bind_addr,
            agent_mode,
            worker_url,
            screenshot_dir,
            screenshot_url_prefix,
            session_idle_timeout,
        }
    }
}
