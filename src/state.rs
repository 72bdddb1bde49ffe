//! Shared application state handed to every handler.

use std::sync::Arc;

use chrono::Duration;

use crate::backend::Backend;
use crate::config::Config;
use crate::services::activity_logger::ActivityLogger;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub activity: ActivityLogger,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build state around a backend and start its activity logger.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(backend: Arc<dyn Backend>, config: Config) -> Self {
        let activity = ActivityLogger::for_backend(backend.clone());
        Self {
            backend,
            activity,
            config: Arc::new(config),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.config.session_ttl_hours.max(1))
    }
}
