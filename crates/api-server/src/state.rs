//! Application state

use std::sync::Arc;

use agent_runtime::{
    AgentBackend, MockBackend, ScreenshotStore, SessionRegistry, TaskExecutor, WorkerBackend,
};
use bp_core::session::SessionStore;

use crate::config::{AgentMode, Config};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: Arc<SessionStore>,
    registry: Arc<SessionRegistry>,
    screenshots: Arc<ScreenshotStore>,
    executor: Arc<TaskExecutor>,
}

impl AppState {
    /// Create state with the backend selected by the configuration
    pub fn new(config: Config) -> Self {
        let backend: Arc<dyn AgentBackend> = match config.agent_mode {
            AgentMode::Worker => Arc::new(WorkerBackend::new(config.worker_url.clone())),
            AgentMode::Mock => Arc::new(MockBackend::default()),
        };
        Self::with_backend(config, backend)
    }

    /// Create state with an explicit backend
    pub fn with_backend(config: Config, backend: Arc<dyn AgentBackend>) -> Self {
        let store = Arc::new(SessionStore::new(&config.data_dir));
        let registry = Arc::new(SessionRegistry::new());
        let screenshots = Arc::new(ScreenshotStore::new(
            config.screenshot_dir.clone(),
            config.screenshot_url_prefix.clone(),
        ));
        let executor = Arc::new(TaskExecutor::new(
            backend,
            Arc::clone(&store),
            Arc::clone(&screenshots),
            Arc::clone(&registry),
        ));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                registry,
                screenshots,
                executor,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.inner.store
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.inner.registry
    }

    pub fn screenshots(&self) -> &Arc<ScreenshotStore> {
        &self.inner.screenshots
    }

    pub fn executor(&self) -> &Arc<TaskExecutor> {
        &self.inner.executor
    }
}
