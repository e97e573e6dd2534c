use crate::detector::latest_modification;
use crate::notify::{FolderChange, Notifier};
use chrono::{DateTime, Utc};
use folderbell_core::config::AppConfig;
use folderbell_core::path_utils::resolve_under;
use folderbell_store::{Store, StoreError, Subscription};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("path escapes the files root: {0}")]
    UnsafePath(String),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store Error: {0}")]
    Store(#[from] StoreError),
    #[error("detector task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Scanning,
}

/// What happened to one subscription during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Folder does not exist; nothing stored, nothing sent.
    Missing,
    /// First observation; timestamp stored, nothing sent.
    Initialized,
    /// Same second or older than what is stored.
    Unchanged,
    /// Newer timestamp stored, then the notifier was invoked.
    Changed { delivered: bool },
    /// Subscription was deleted while the pass was running.
    Vanished,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub scanned: usize,
    pub missing: usize,
    pub initialized: usize,
    pub unchanged: usize,
    pub changed: usize,
    pub undelivered: usize,
    pub vanished: usize,
    pub failed: usize,
    /// Shutdown was requested before every subscription was visited.
    pub abandoned: bool,
}

impl PassReport {
    fn record(&mut self, outcome: ScanOutcome) {
        match outcome {
            ScanOutcome::Missing => self.missing += 1,
            ScanOutcome::Initialized => self.initialized += 1,
            ScanOutcome::Unchanged => self.unchanged += 1,
            ScanOutcome::Changed { delivered } => {
                self.changed += 1;
                if !delivered {
                    self.undelivered += 1;
                }
            }
            ScanOutcome::Vanished => self.vanished += 1,
        }
    }
}

/// Periodically compares every subscription's folder against its stored timestamp.
pub struct Poller {
    store: Store,
    notifier: Arc<dyn Notifier>,
    files_root: PathBuf,
    interval: Duration,
    state: PollState,
}

impl Poller {
    pub fn new(store: Store, notifier: Arc<dyn Notifier>, files_root: PathBuf, interval: Duration) -> Self {
        Self {
            store,
            notifier,
            files_root,
            interval,
            state: PollState::Idle,
        }
    }

    pub fn from_config(config: &AppConfig, store: Store, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(store, notifier, config.files_root.clone(), config.check_interval)
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Runs passes until `shutdown` turns true or its sender is dropped.
    /// Shutdown is observed between subscriptions and while idle, never in the middle of a write.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("🚀 Poller: monitoring subscriptions every {}s", self.interval.as_secs());

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.scan_pass(&shutdown).await {
                Ok(report) => {
                    if report.changed > 0 || report.failed > 0 {
                        info!("🔁 Poller: pass finished {:?}", report);
                    } else {
                        debug!("Poller: pass finished {:?}", report);
                    }
                    if report.abandoned {
                        break;
                    }
                }
                Err(e) => error!("Poller: pass failed: {}", e),
            }

            let stop = tokio::select! {
                _ = tokio::time::sleep(self.interval) => false,
                changed = shutdown.changed() => changed.is_err(),
            };
            if stop {
                break;
            }
        }

        info!("🛑 Poller stopped.");
    }

    /// One full iteration over the subscriptions. Per-subscription failures are counted, not returned.
    pub async fn scan_pass(&mut self, shutdown: &watch::Receiver<bool>) -> Result<PassReport, ScanError> {
        self.state = PollState::Scanning;
        let result = self.scan_all(shutdown).await;
        self.state = PollState::Idle;
        result
    }

    async fn scan_all(&self, shutdown: &watch::Receiver<bool>) -> Result<PassReport, ScanError> {
        let subscriptions = self.store.all_subscriptions()?;
        let mut report = PassReport::default();

        for sub in &subscriptions {
            if *shutdown.borrow() {
                info!("🛑 Poller: shutdown requested, abandoning pass after {} subscriptions", report.scanned);
                report.abandoned = true;
                break;
            }

            report.scanned += 1;
            match self.scan_subscription(sub).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    report.failed += 1;
                    error!("Poller: failed to scan {} (user {}): {}", sub.folder_path, sub.tg_id, e);
                }
            }
        }

        Ok(report)
    }

    async fn scan_subscription(&self, sub: &Subscription) -> Result<ScanOutcome, ScanError> {
        let folder = resolve_under(&self.files_root, &sub.folder_path)
            .ok_or_else(|| ScanError::UnsafePath(sub.folder_path.clone()))?;

        let target = folder.clone();
        let snapshot = tokio::task::spawn_blocking(move || latest_modification(&target)).await??;
        let Some(snapshot) = snapshot else {
            warn!("📭 Poller: folder not found: {}", folder.display());
            return Ok(ScanOutcome::Missing);
        };

        let observed = DateTime::<Utc>::from(snapshot.modified);

        let Some(stored) = sub.last_modified else {
            if !self.store.record_modified(sub.id, observed)? {
                return Ok(ScanOutcome::Vanished);
            }
            info!("📌 Poller: initialized {} for user {}", sub.folder_path, sub.tg_id);
            return Ok(ScanOutcome::Initialized);
        };

        if observed.timestamp() <= stored.timestamp() {
            return Ok(ScanOutcome::Unchanged);
        }

        if !self.store.record_modified(sub.id, observed)? {
            return Ok(ScanOutcome::Vanished);
        }
        info!("🔥 Poller: change in {} ({})", sub.folder_path, snapshot.latest_entry.display());

        let change = FolderChange {
            subscription_id: sub.id,
            tg_id: sub.tg_id,
            folder_path: sub.folder_path.clone(),
            latest_entry: snapshot
                .latest_entry
                .strip_prefix(&self.files_root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/")),
            modified: DateTime::from_timestamp(observed.timestamp(), 0).unwrap_or(observed),
        };

        let delivered = match self.notifier.notify(&change).await {
            Ok(()) => true,
            Err(e) => {
                warn!("⚠️ Poller: notification to {} failed: {}", sub.tg_id, e);
                false
            }
        };
        Ok(ScanOutcome::Changed { delivered })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use folderbell_store::UserProfile;
    use std::fs::{self, File};
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::{SystemTime, UNIX_EPOCH};
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<FolderChange>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<FolderChange> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, change: &FolderChange) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(change.clone());
            if self.fail {
                anyhow::bail!("chat unreachable");
            }
            Ok(())
        }
    }

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        store: Store,
        notifier: Arc<RecordingNotifier>,
        poller: Poller,
        _shutdown_tx: watch::Sender<bool>,
        shutdown: watch::Receiver<bool>,
    }

    fn fixture_with(notifier: RecordingNotifier) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let store = Store::open_in_memory().unwrap();
        let notifier = Arc::new(notifier);
        let poller = Poller::new(store.clone(), notifier.clone(), root.clone(), Duration::from_secs(60));
        let (tx, rx) = watch::channel(false);
        Fixture {
            _dir: dir,
            root,
            store,
            notifier,
            poller,
            _shutdown_tx: tx,
            shutdown: rx,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingNotifier::default())
    }

    /// Whole-second instant comfortably ahead of every directory mtime created by the test.
    fn future(offset_secs: u64) -> SystemTime {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        UNIX_EPOCH + Duration::from_secs(now + 3_600 + offset_secs)
    }

    fn touch(path: &Path, at: SystemTime) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let file = File::options().create(true).append(true).open(path).unwrap();
        file.set_modified(at).unwrap();
    }

    fn stored(store: &Store) -> Option<DateTime<Utc>> {
        store.all_subscriptions().unwrap()[0].last_modified
    }

    #[tokio::test]
    async fn first_pass_initializes_without_notifying() {
        let mut fx = fixture();
        touch(&fx.root.join("proj/task/model.rvt"), future(0));
        fx.store.subscribe(&UserProfile::new(7), "proj/task").unwrap();

        let report = fx.poller.scan_pass(&fx.shutdown).await.unwrap();
        assert_eq!(report.initialized, 1);
        assert!(fx.notifier.sent().is_empty());
        assert_eq!(stored(&fx.store), Some(DateTime::<Utc>::from(future(0))));
        assert_eq!(fx.poller.state(), PollState::Idle);
    }

    #[tokio::test]
    async fn identical_content_updates_state_only_once() {
        let mut fx = fixture();
        touch(&fx.root.join("proj/a.txt"), future(0));
        fx.store.subscribe(&UserProfile::new(7), "proj").unwrap();

        fx.poller.scan_pass(&fx.shutdown).await.unwrap();
        let after_first = stored(&fx.store);
        let report = fx.poller.scan_pass(&fx.shutdown).await.unwrap();

        assert_eq!(report.unchanged, 1);
        assert_eq!(stored(&fx.store), after_first);
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn newer_change_notifies_exactly_once() {
        let mut fx = fixture();
        let file = fx.root.join("proj/task/1.rvt/Data/part.bin");
        touch(&file, future(0));
        fx.store.subscribe(&UserProfile::new(7), "proj/task").unwrap();
        fx.poller.scan_pass(&fx.shutdown).await.unwrap();

        touch(&file, future(120));
        let report = fx.poller.scan_pass(&fx.shutdown).await.unwrap();
        assert_eq!(report.changed, 1);
        assert_eq!(stored(&fx.store), Some(DateTime::<Utc>::from(future(120))));

        let sent = fx.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].tg_id, 7);
        assert_eq!(sent[0].folder_path, "proj/task");
        assert_eq!(sent[0].latest_entry.as_deref(), Some("proj/task/1.rvt/Data/part.bin"));
        assert_eq!(sent[0].modified, DateTime::<Utc>::from(future(120)));

        fx.poller.scan_pass(&fx.shutdown).await.unwrap();
        assert_eq!(fx.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn older_or_same_second_changes_are_ignored() {
        let mut fx = fixture();
        let file = fx.root.join("proj/a.txt");
        touch(&file, future(100));
        fx.store.subscribe(&UserProfile::new(7), "proj").unwrap();
        fx.poller.scan_pass(&fx.shutdown).await.unwrap();

        touch(&file, future(100) + Duration::from_millis(500));
        let report = fx.poller.scan_pass(&fx.shutdown).await.unwrap();
        assert_eq!(report.unchanged, 1);

        touch(&file, future(50));
        let report = fx.poller.scan_pass(&fx.shutdown).await.unwrap();
        assert_eq!(report.unchanged, 1);

        assert!(fx.notifier.sent().is_empty());
        assert_eq!(stored(&fx.store), Some(DateTime::<Utc>::from(future(100))));
    }

    #[tokio::test]
    async fn missing_folder_keeps_state_and_stays_quiet() {
        let mut fx = fixture();
        fx.store.subscribe(&UserProfile::new(7), "not/there").unwrap();

        let report = fx.poller.scan_pass(&fx.shutdown).await.unwrap();
        assert_eq!(report.missing, 1);
        assert_eq!(stored(&fx.store), None);
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn deleted_subscription_leaves_the_next_pass() {
        let mut fx = fixture();
        touch(&fx.root.join("proj/a.txt"), future(0));
        fx.store.subscribe(&UserProfile::new(7), "proj").unwrap();
        fx.poller.scan_pass(&fx.shutdown).await.unwrap();

        fx.store.unsubscribe(7, "proj").unwrap();
        touch(&fx.root.join("proj/a.txt"), future(60));
        let report = fx.poller.scan_pass(&fx.shutdown).await.unwrap();

        assert_eq!(report.scanned, 0);
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn failed_delivery_still_persists_the_change() {
        let mut fx = fixture_with(RecordingNotifier { fail: true, ..Default::default() });
        let file = fx.root.join("proj/a.txt");
        touch(&file, future(0));
        fx.store.subscribe(&UserProfile::new(7), "proj").unwrap();
        fx.poller.scan_pass(&fx.shutdown).await.unwrap();

        touch(&file, future(10));
        let report = fx.poller.scan_pass(&fx.shutdown).await.unwrap();
        assert_eq!(report.changed, 1);
        assert_eq!(report.undelivered, 1);
        assert_eq!(stored(&fx.store), Some(DateTime::<Utc>::from(future(10))));

        // not retried on the next pass
        fx.poller.scan_pass(&fx.shutdown).await.unwrap();
        assert_eq!(fx.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn subscription_deleted_mid_pass_is_not_notified() {
        let fx = fixture();
        let file = fx.root.join("proj/a.txt");
        touch(&file, future(0));
        fx.store.subscribe(&UserProfile::new(7), "proj").unwrap();

        // snapshot as the pass read it, then the user unsubscribes
        let fresh = fx.store.all_subscriptions().unwrap().remove(0);
        fx.store.unsubscribe(7, "proj").unwrap();
        let outcome = fx.poller.scan_subscription(&fresh).await.unwrap();
        assert_eq!(outcome, ScanOutcome::Vanished);

        fx.store.subscribe(&UserProfile::new(7), "proj").unwrap();
        fx.poller.scan_subscription(&fx.store.all_subscriptions().unwrap()[0]).await.unwrap();
        let initialized = fx.store.all_subscriptions().unwrap().remove(0);
        fx.store.unsubscribe(7, "proj").unwrap();
        touch(&file, future(30));
        let outcome = fx.poller.scan_subscription(&initialized).await.unwrap();

        assert_eq!(outcome, ScanOutcome::Vanished);
        assert!(fx.notifier.sent().is_empty());
        assert!(fx.store.all_subscriptions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_bad_subscription_does_not_stop_the_pass() {
        let mut fx = fixture();
        touch(&fx.root.join("good/a.txt"), future(0));
        fx.store.subscribe(&UserProfile::new(7), "../outside").unwrap();
        fx.store.subscribe(&UserProfile::new(7), "good").unwrap();

        let report = fx.poller.scan_pass(&fx.shutdown).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.initialized, 1);
    }

    #[tokio::test]
    async fn shutdown_abandons_pass_and_stops_run() {
        let mut fx = fixture();
        fx.store.subscribe(&UserProfile::new(7), "a").unwrap();
        fx.store.subscribe(&UserProfile::new(7), "b").unwrap();

        let (tx, rx) = watch::channel(true);
        let report = fx.poller.scan_pass(&rx).await.unwrap();
        assert!(report.abandoned);
        assert_eq!(report.scanned, 0);

        let run = tokio::spawn(fx.poller.run(rx));
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("poller should stop")
            .unwrap();
        drop(tx);
    }

    #[tokio::test]
    async fn run_stops_when_signalled_while_idle() {
        let fx = fixture();
        let (tx, rx) = watch::channel(false);
        let run = tokio::spawn(fx.poller.run(rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("poller should stop")
            .unwrap();
    }
}
