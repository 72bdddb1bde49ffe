//! Fire-and-forget activity logging.
//!
//! [`ActivityLogger::log`] enqueues an entry on an unbounded channel and
//! returns immediately. A background task drains the channel into an
//! [`ActivitySink`] one entry at a time.
//!
//! Delivery is at-most-once: a failed write is reported through `tracing`
//! and the entry is dropped. Callers must not assume an entry is visible by
//! the time the action that triggered it is.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::backend::Backend;
use crate::models::activity_log::NewActivityLog;

pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Destination for activity entries.
#[async_trait]
pub trait ActivitySink: Send + Sync + 'static {
    async fn write(&self, entry: NewActivityLog) -> Result<(), SinkError>;
}

/// Writes entries straight into the backend's activity table.
pub struct BackendSink(pub Arc<dyn Backend>);

#[async_trait]
impl ActivitySink for BackendSink {
    async fn write(&self, entry: NewActivityLog) -> Result<(), SinkError> {
        self.0.insert_activity(entry).await?;
        Ok(())
    }
}

enum Command {
    Record(NewActivityLog),
    Flush(oneshot::Sender<()>),
}

/// Handle to the logging task. Cheap to clone.
///
/// The task stops once every handle is dropped.
#[derive(Clone)]
pub struct ActivityLogger {
    tx: mpsc::UnboundedSender<Command>,
}

impl ActivityLogger {
    /// Start the background writer on the current tokio runtime.
    pub fn spawn(sink: Arc<dyn ActivitySink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(sink, rx));
        Self { tx }
    }

    pub fn for_backend(backend: Arc<dyn Backend>) -> Self {
        Self::spawn(Arc::new(BackendSink(backend)))
    }

    /// Enqueue an entry. Never blocks and never fails.
    pub fn log(&self, entry: NewActivityLog) {
        if self.tx.send(Command::Record(entry)).is_err() {
            tracing::warn!("activity logger has stopped, entry dropped");
        }
    }

    /// Wait until every entry enqueued before this call has been attempted.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

async fn run(sink: Arc<dyn ActivitySink>, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Record(entry) => {
                let category = entry.category;
                let action = entry.action.clone();
                match sink.write(entry).await {
                    Ok(()) => tracing::debug!(%category, %action, "activity recorded"),
                    Err(e) => {
                        tracing::error!(%category, %action, error = %e, "failed to write activity log entry")
                    }
                }
            }
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    tracing::debug!("activity logger stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::models::activity_log::ActivityCategory;

    #[tokio::test]
    async fn entries_are_written_in_order() {
        let backend = Arc::new(MemoryBackend::new());
        let logger = ActivityLogger::for_backend(backend.clone());

        logger.log(NewActivityLog::new(None, ActivityCategory::System, "first"));
        logger.log(NewActivityLog::new(None, ActivityCategory::System, "second"));
        logger.flush().await;

        let actions: Vec<String> = backend
            .activity_logs()
            .into_iter()
            .map(|row| row.action)
            .collect();
        assert_eq!(actions, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn write_failures_are_swallowed() {
        let backend = Arc::new(MemoryBackend::new());
        let logger = ActivityLogger::for_backend(backend.clone());

        backend.set_fail_activity_writes(true);
        logger.log(NewActivityLog::new(None, ActivityCategory::Auth, "lost"));
        logger.flush().await;
        backend.set_fail_activity_writes(false);

        logger.log(NewActivityLog::new(None, ActivityCategory::Auth, "kept"));
        logger.flush().await;

        let rows = backend.activity_logs();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "kept");
    }
}
