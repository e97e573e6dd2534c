use async_trait::async_trait;
use chrono::TimeDelta;
use folderbell_core::path_utils::folder_name;
use folderbell_watcher::{FolderChange, Notifier};
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::html;
use tracing::info;

/// Delivers change alerts as HTML messages to the subscriber's private chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    display_offset_minutes: i64,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, display_offset_minutes: i64) -> Self {
        Self { bot, display_offset_minutes }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, change: &FolderChange) -> anyhow::Result<()> {
        let text = compose_message(change, self.display_offset_minutes);
        self.bot
            .send_message(ChatId(change.tg_id), text)
            .parse_mode(ParseMode::Html)
            .await?;
        info!("✅ Telegram: notified {} about {}", change.tg_id, change.folder_path);
        Ok(())
    }
}

pub fn compose_message(change: &FolderChange, display_offset_minutes: i64) -> String {
    let offset = TimeDelta::try_minutes(display_offset_minutes).unwrap_or_default();
    let shown = change.modified + offset;
    let location = change.latest_entry.as_deref().unwrap_or(&change.folder_path);

    format!(
        "🔄 <b>Change detected in a subscribed folder!</b>\n\n\
         📂 Subscription: <b>{}</b>\n\
         📌 Path: <code>{}</code>\n\
         🕒 Modified: {}\n",
        html::escape(folder_name(&change.folder_path)),
        html::escape(location),
        shown.format("%d.%m.%Y %H:%M"),
    )
}
