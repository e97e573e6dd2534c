use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::trace;
use walkdir::WalkDir;

/// Newest modification time found under a folder, and where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSnapshot {
    pub modified: SystemTime,
    pub latest_entry: PathBuf,
}

/// Walks `folder` recursively and returns the latest modification time of the
/// folder itself and everything below it.
///
/// `Ok(None)` means the folder does not exist, including when a parent is a regular file. Entries that disappear or cannot
/// be read while walking are skipped. Symlinks are not followed.
pub fn latest_modification(folder: &Path) -> io::Result<Option<FolderSnapshot>> {
    let root = match std::fs::metadata(folder) {
        Ok(meta) => meta,
        // a path running through a regular file is just as absent
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut latest = FolderSnapshot {
        modified: root.modified()?,
        latest_entry: folder.to_path_buf(),
    };
    if !root.is_dir() {
        return Ok(Some(latest));
    }

    for entry in WalkDir::new(folder).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                trace!("Detector: skipping unreadable entry under {:?}: {}", folder, e);
                continue;
            }
        };
        let modified = match entry.metadata().map_err(io::Error::from).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                trace!("Detector: skipping {:?}: {}", entry.path(), e);
                continue;
            }
        };
        if modified > latest.modified {
            latest.modified = modified;
            latest.latest_entry = entry.into_path();
        }
    }

    Ok(Some(latest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;

    fn touch(path: &Path, at: SystemTime) {
        let file = File::options().create(true).append(true).open(path).unwrap();
        file.set_modified(at).unwrap();
    }

    #[test]
    fn absent_folder_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(latest_modification(&dir.path().join("missing")).unwrap(), None);
    }

    #[test]
    fn path_through_a_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("f"), "x").unwrap();
        assert_eq!(latest_modification(&dir.path().join("f").join("sub")).unwrap(), None);
    }

    #[test]
    fn empty_folder_reports_itself() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = latest_modification(dir.path()).unwrap().unwrap();
        assert_eq!(snapshot.latest_entry, dir.path());
        assert_eq!(snapshot.modified, fs::metadata(dir.path()).unwrap().modified().unwrap());
    }

    #[test]
    fn finds_newest_nested_entry() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let future = SystemTime::now() + Duration::from_secs(3_600);
        touch(&dir.path().join("top.txt"), future);
        touch(&nested.join("deep.txt"), future + Duration::from_secs(60));

        let snapshot = latest_modification(dir.path()).unwrap().unwrap();
        assert_eq!(snapshot.latest_entry, nested.join("deep.txt"));
        assert_eq!(snapshot.modified, future + Duration::from_secs(60));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_does_not_fail_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("link")).unwrap();
        assert!(latest_modification(dir.path()).unwrap().is_some());
    }
}
