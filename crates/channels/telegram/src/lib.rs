//! Telegram channel for Folderbell: command and menu handling plus change delivery.

pub mod admin;
pub mod browse;
pub mod commands;
pub mod handlers;
pub mod menu;
pub mod notifier;
pub mod session;

pub use notifier::TelegramNotifier;

use commands::Command;
use folderbell_core::config::AppConfig;
use folderbell_store::Store;
use handlers::BotContext;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct TelegramChannel {
    bot: Bot,
    ctx: Arc<BotContext>,
}

impl TelegramChannel {
    pub fn new(config: AppConfig, store: Store) -> Self {
        let bot = Bot::new(&config.bot_token);
        Self {
            bot,
            ctx: Arc::new(BotContext::new(config, store)),
        }
    }

    /// A notifier sharing this channel's bot client.
    pub fn notifier(&self) -> TelegramNotifier {
        TelegramNotifier::new(self.bot.clone(), self.ctx.config.display_offset_minutes)
    }

    /// Long-polls for updates until `shutdown` turns true.
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        info!("📡 Telegram Gateway Starting...");

        if let Err(e) = self.bot.set_my_commands(Command::bot_commands()).await {
            warn!("⚠️ Telegram: could not register command list: {}", e);
        }

        let handler = dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(handlers::on_command),
            )
            .branch(Update::filter_callback_query().endpoint(handlers::on_callback));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.ctx.clone()])
            .default_handler(|upd| async move {
                debug!("Telegram: unhandled update {:?}", upd.kind);
            })
            .error_handler(LoggingErrorHandler::with_custom_text("❌ Telegram: handler failed"))
            .build();

        let token = dispatcher.shutdown_token();
        tokio::spawn(async move {
            if shutdown.wait_for(|stop| *stop).await.is_ok() {
                info!("🛑 Telegram: stopping dispatcher");
                // the token refuses while the dispatcher is still starting up
                loop {
                    match token.shutdown() {
                        Ok(done) => break done.await,
                        Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
                    }
                }
            }
        });

        info!("✅ Telegram Gateway Active. Admins: {:?}", self.ctx.config.admin_ids);
        dispatcher.dispatch().await;
        Ok(())
    }
}
