use crate::browse::BrowseSession;
use crate::menu::{nav_row, paginate, Button, CallbackAction, Menu};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A user's subscription list as last shown to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsSession {
    pub paths: Vec<String>,
    pub page: usize,
}

impl SubsSession {
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths, page: 0 }
    }

    pub fn remove(&mut self, path: &str) {
        self.paths.retain(|p| p != path);
    }

    pub fn menu(&self) -> Menu {
        if self.paths.is_empty() {
            return Menu {
                text: "❌ You have no subscriptions.".to_string(),
                rows: Vec::new(),
            };
        }

        let page = paginate(&self.paths, self.page);
        let mut rows: Vec<Vec<Button>> = page
            .items
            .iter()
            .enumerate()
            .map(|(i, path)| vec![Button::new(format!("❌ {path}"), CallbackAction::Delete(page.offset + i))])
            .collect();
        let nav = nav_row(&page, CallbackAction::SubsPage);
        if !nav.is_empty() {
            rows.push(nav);
        }

        Menu {
            text: "Your subscriptions (tap to remove):".to_string(),
            rows,
        }
    }
}

/// Menu state attached to the chat message that displays it.
#[derive(Debug)]
struct Bound<T> {
    message_id: i32,
    state: T,
}

/// Ephemeral menu state of one user. Each menu answers only to the message it was
/// last rendered into; buttons on older messages find nothing.
#[derive(Debug, Default)]
pub struct ChatSession {
    browse: Option<Bound<BrowseSession>>,
    subs: Option<Bound<SubsSession>>,
}

impl ChatSession {
    pub fn set_browse(&mut self, message_id: i32, state: BrowseSession) {
        self.browse = Some(Bound { message_id, state });
    }

    pub fn set_subs(&mut self, message_id: i32, state: SubsSession) {
        self.subs = Some(Bound { message_id, state });
    }

    pub fn browse_for(&mut self, message_id: i32) -> Option<&mut BrowseSession> {
        self.browse
            .as_mut()
            .filter(|b| b.message_id == message_id)
            .map(|b| &mut b.state)
    }

    pub fn subs_for(&mut self, message_id: i32) -> Option<&mut SubsSession> {
        self.subs
            .as_mut()
            .filter(|b| b.message_id == message_id)
            .map(|b| &mut b.state)
    }

    pub fn clear_browse(&mut self) {
        self.browse = None;
    }

    pub fn clear_subs(&mut self) {
        self.subs = None;
    }
}

/// Menu state for every user, keyed by Telegram user id.
#[derive(Clone, Default)]
pub struct Sessions {
    inner: Arc<Mutex<HashMap<i64, ChatSession>>>,
}

impl Sessions {
    /// Runs `f` on the user's session, creating an empty one if needed.
    pub async fn with<R>(&self, tg_id: i64, f: impl FnOnce(&mut ChatSession) -> R) -> R {
        let mut sessions = self.inner.lock().await;
        f(sessions.entry(tg_id).or_default())
    }
}
