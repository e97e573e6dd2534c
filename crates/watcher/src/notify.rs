use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

/// A detected change, already persisted, waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderChange {
    pub subscription_id: i64,
    pub tg_id: i64,
    /// Subscribed folder, relative to the files root.
    pub folder_path: String,
    /// Entry that carried the newest time, relative to the files root.
    pub latest_entry: Option<String>,
    pub modified: DateTime<Utc>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one change to the subscriber. Errors are logged by the caller and never retried.
    async fn notify(&self, change: &FolderChange) -> anyhow::Result<()>;
}

/// Writes changes to the log instead of a chat. Used by `folderbell scan --log-only`.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, change: &FolderChange) -> anyhow::Result<()> {
        info!(
            "📣 Change for {} in {} at {} ({})",
            change.tg_id,
            change.folder_path,
            change.modified.format("%Y-%m-%d %H:%M:%S"),
            change.latest_entry.as_deref().unwrap_or("-")
        );
        Ok(())
    }
}
