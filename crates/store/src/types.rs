use chrono::{DateTime, Utc};

/// Telegram identity plus the display fields we refresh on every interaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserProfile {
    pub tg_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserProfile {
    pub fn new(tg_id: i64) -> Self {
        Self { tg_id, ..Self::default() }
    }

    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if parts.is_empty() { None } else { Some(parts.join(" ")) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub tg_id: i64,
    /// Relative to the files root, `/`-separated.
    pub folder_path: String,
    /// Last change observed by the poller, second precision. `None` until the first pass.
    pub last_modified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserOverview {
    pub id: i64,
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
    pub folders: Vec<String>,
}
