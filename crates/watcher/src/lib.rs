//! Folderbell Watcher - polling change detection for subscribed folders
//!
//! This crate is organized into:
//! - detector: recursive latest-mtime scan of one folder
//! - notify: the `Notifier` seam and the change record handed to it
//! - poller: the Idle/Scanning loop that ties store, detector and notifier together

pub mod detector;
pub mod notify;
pub mod poller;

pub use detector::{latest_modification, FolderSnapshot};
pub use notify::{FolderChange, LogNotifier, Notifier};
pub use poller::{PassReport, PollState, Poller, ScanError, ScanOutcome};
