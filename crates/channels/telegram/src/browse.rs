use crate::menu::{nav_row, paginate, Button, CallbackAction, Menu};
use folderbell_core::config::AppConfig;
use folderbell_core::path_utils::join_segments;
use std::io;
use std::path::PathBuf;

/// Where a user currently is in the folder browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseSession {
    /// Folder names from the files root down to the folder being listed.
    pub trail: Vec<String>,
    /// Visible sub-folders of the current folder, sorted.
    pub entries: Vec<String>,
    pub page: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseStep {
    Descended,
    /// A leaf was picked; carries its path relative to the files root.
    Selected(String),
    /// The index does not exist in the current listing.
    Stale,
}

/// Read-only navigation over the directory tree under the files root.
#[derive(Debug, Clone)]
pub struct Browser {
    root: PathBuf,
    max_depth: usize,
    exclude: Vec<String>,
}

impl Browser {
    pub fn new(root: PathBuf, max_depth: usize, exclude: Vec<String>) -> Self {
        Self { root, max_depth, exclude }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.files_root.clone(), config.browse_max_depth, config.browse_exclude.clone())
    }

    pub fn start(&self) -> io::Result<BrowseSession> {
        Ok(BrowseSession {
            trail: Vec::new(),
            entries: self.list(&[])?,
            page: 0,
        })
    }

    /// Sorted sub-folders of `trail`, without hidden and excluded names.
    pub fn list(&self, trail: &[String]) -> io::Result<Vec<String>> {
        let mut dir = self.root.clone();
        dir.extend(trail);

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') || self.exclude.contains(&name.to_lowercase()) {
                continue;
            }
            if entry.path().is_dir() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// A folder is a leaf when it sits at the depth limit or has no visible sub-folders.
    pub fn is_leaf(&self, trail: &[String]) -> io::Result<bool> {
        if self.max_depth > 0 && trail.len() >= self.max_depth {
            return Ok(true);
        }
        Ok(self.list(trail)?.is_empty())
    }

    pub fn open(&self, session: &mut BrowseSession, index: usize) -> io::Result<BrowseStep> {
        let Some(name) = session.entries.get(index) else {
            return Ok(BrowseStep::Stale);
        };

        let mut trail = session.trail.clone();
        trail.push(name.clone());
        if self.is_leaf(&trail)? {
            return Ok(BrowseStep::Selected(join_segments(&trail)));
        }

        session.entries = self.list(&trail)?;
        session.trail = trail;
        session.page = 0;
        Ok(BrowseStep::Descended)
    }

    /// Moves one level up. Returns `false` when already at the root.
    pub fn up(&self, session: &mut BrowseSession) -> io::Result<bool> {
        if session.trail.is_empty() {
            return Ok(false);
        }
        let mut trail = session.trail.clone();
        trail.pop();
        session.entries = self.list(&trail)?;
        session.trail = trail;
        session.page = 0;
        Ok(true)
    }

    pub fn menu(&self, session: &BrowseSession) -> Menu {
        let page = paginate(&session.entries, session.page);

        let mut text = String::new();
        if !session.trail.is_empty() {
            text.push_str(&format!("📂 {}\n\n", join_segments(&session.trail)));
        }
        if session.entries.is_empty() {
            text.push_str("No folders here.");
        } else {
            text.push_str("Choose a folder:");
        }

        let buttons: Vec<Button> = page
            .items
            .iter()
            .enumerate()
            .map(|(i, name)| Button::new(name.as_str(), CallbackAction::Open(page.offset + i)))
            .collect();
        let mut rows: Vec<Vec<Button>> = buttons.chunks(2).map(<[Button]>::to_vec).collect();

        let nav = nav_row(&page, CallbackAction::Page);
        if !nav.is_empty() {
            rows.push(nav);
        }
        if !session.trail.is_empty() {
            rows.push(vec![Button::new("⬆️ Up", CallbackAction::Up)]);
        }

        Menu { text, rows }
    }
}
