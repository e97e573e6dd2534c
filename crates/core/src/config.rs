use config::{Config, ConfigBuilder, ConfigError, Environment, File, Map};
use config::builder::DefaultState;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Values exactly as they arrive from the environment / `folderbell.toml`.
/// Everything is optional or defaulted here; `AppConfig::validate` decides what is fatal.
#[derive(Debug, Deserialize, Clone)]
struct RawConfig {
    bot_token: Option<String>,
    telegram_bot_token: Option<String>,
    database_url: String,
    files_root: PathBuf,
    check_interval: u64,
    admin_ids: Option<String>,
    admin_id: Option<String>,
    browse_max_depth: usize,
    browse_exclude: Option<String>,
    display_offset_minutes: i64,
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    pub database_url: String,
    pub files_root: PathBuf,
    pub check_interval: Duration,
    pub admin_ids: Vec<i64>,
    /// Depth (counted from the files root) at which browser entries become leaves. 0 = unlimited.
    pub browse_max_depth: usize,
    pub browse_exclude: Vec<String>,
    pub display_offset_minutes: i64,
    pub log_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // .env in the working directory is optional
        let _ = dotenvy::dotenv();

        let builder = Self::defaults()?
            .add_source(File::with_name("folderbell").required(false))
            .add_source(Environment::default());

        Self::validate(builder.build()?.try_deserialize()?)
    }

    /// Builds a config from an explicit variable map instead of the process environment.
    pub fn from_vars(vars: Map<String, String>) -> Result<Self, ConfigError> {
        let builder = Self::defaults()?.add_source(Environment::default().source(Some(vars)));
        Self::validate(builder.build()?.try_deserialize()?)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("database_url", "bot.db")?
            .set_default("files_root", "./files")?
            .set_default("check_interval", 60)?
            .set_default("browse_max_depth", 3)?
            .set_default("display_offset_minutes", 0)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let bot_token = raw
            .bot_token
            .or(raw.telegram_bot_token)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::Message("BOT_TOKEN not set".to_string()))?;

        if raw.check_interval == 0 {
            return Err(ConfigError::Message("CHECK_INTERVAL must be at least 1 second".to_string()));
        }

        let mut admin_ids = Vec::new();
        for source in [raw.admin_ids.as_deref(), raw.admin_id.as_deref()].into_iter().flatten() {
            for id in split_list(source) {
                let parsed = id
                    .parse::<i64>()
                    .map_err(|_| ConfigError::Message(format!("invalid admin id: {id}")))?;
                if !admin_ids.contains(&parsed) {
                    admin_ids.push(parsed);
                }
            }
        }

        let browse_exclude = raw
            .browse_exclude
            .as_deref()
            .map(|s| split_list(s).map(str::to_lowercase).collect())
            .unwrap_or_default();

        Ok(Self {
            bot_token,
            database_url: raw.database_url,
            files_root: raw.files_root,
            check_interval: Duration::from_secs(raw.check_interval),
            admin_ids,
            browse_max_depth: raw.browse_max_depth,
            browse_exclude,
            display_offset_minutes: raw.display_offset_minutes,
            log_file: raw.log_file,
        })
    }

    /// Filesystem location of the SQLite database named by `DATABASE_URL`.
    pub fn database_path(&self) -> PathBuf {
        let url = self.database_url.trim();
        let path = ["sqlite+aiosqlite:///", "sqlite:///", "sqlite://", "sqlite:"]
            .iter()
            .find_map(|prefix| url.strip_prefix(prefix))
            .unwrap_or(url);
        crate::path_utils::get_path(path)
    }

    pub fn is_admin(&self, tg_id: i64) -> bool {
        self.admin_ids.contains(&tg_id)
    }
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|s| !s.is_empty())
}
