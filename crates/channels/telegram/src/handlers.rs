use crate::admin::{format_users, shorten_path, split_message, MAX_MESSAGE_LEN};
use crate::browse::{BrowseStep, Browser};
use crate::commands::{admin_keyboard, user_keyboard, Command};
use crate::menu::{CallbackAction, Menu};
use crate::session::{Sessions, SubsSession};
use folderbell_core::config::AppConfig;
use folderbell_store::{Store, UserProfile};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode, User};
use teloxide::utils::command::BotCommands;
use teloxide::utils::html;
use teloxide::{ApiError, RequestError};
use tracing::{debug, error, info, warn};

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const GENERIC_FAILURE: &str = "⚠️ Something went wrong. Please try again later.";
const STALE_MENU: &str = "⌛ This menu has expired. Please open it again.";

/// Everything the handlers share, injected into the dispatcher as one dependency.
pub struct BotContext {
    pub config: AppConfig,
    pub store: Store,
    pub browser: Browser,
    pub sessions: Sessions,
}

impl BotContext {
    pub fn new(config: AppConfig, store: Store) -> Self {
        let browser = Browser::from_config(&config);
        Self {
            config,
            store,
            browser,
            sessions: Sessions::default(),
        }
    }

    /// Keeps the stored display name current. Failure only costs a stale name.
    fn refresh_user(&self, profile: &UserProfile) {
        if let Err(e) = self.store.upsert_user(profile) {
            warn!("Telegram: could not refresh user {}: {}", profile.tg_id, e);
        }
    }
}

/// Confirmation shown as a callback toast; Telegram caps those at 200 characters.
fn removed_toast(path: &str) -> String {
    format!("❌ Subscription removed: {}", shorten_path(path))
}

pub fn profile_of(user: &User) -> UserProfile {
    UserProfile {
        tg_id: user.id.0 as i64,
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
    }
}

pub fn keyboard(menu: &Menu) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(menu.rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.action.encode()))
            .collect::<Vec<_>>()
    }))
}

async fn edit_menu(bot: &Bot, chat_id: ChatId, message_id: MessageId, menu: &Menu) -> Result<(), RequestError> {
    match bot
        .edit_message_text(chat_id, message_id, menu.text.clone())
        .reply_markup(keyboard(menu))
        .await
    {
        Ok(_) => Ok(()),
        // pressing the same page twice
        Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => Err(e),
    }
}

pub async fn on_command(bot: Bot, msg: Message, cmd: Command, ctx: Arc<BotContext>) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let profile = profile_of(user);
    ctx.refresh_user(&profile);

    if cmd.is_admin_only() && !ctx.config.is_admin(profile.tg_id) {
        debug!("Telegram: ignoring {:?} from non-admin {}", cmd, profile.tg_id);
        return Ok(());
    }

    info!("📩 [Telegram] {:?} from {}", cmd, profile.tg_id);
    match cmd {
        Command::Start => {
            let name = html::escape(&user.first_name);
            bot.send_message(
                msg.chat.id,
                format!(
                    "👋 Hello, {name}!\n\n\
                     I watch folders on the file server and tell you when something inside changes.\n\
                     Commands:\n\
                     📁 /subscribe - subscribe to a folder\n\
                     📋 /my_subs - view and manage your subscriptions"
                ),
            )
            .parse_mode(ParseMode::Html)
            .reply_markup(user_keyboard())
            .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
        }
        Command::Subscribe => open_browser(&bot, msg.chat.id, &ctx, profile.tg_id).await?,
        Command::MySubs => open_subscriptions(&bot, msg.chat.id, &ctx, profile.tg_id).await?,
        Command::Admin => {
            bot.send_message(msg.chat.id, "🛠 Admin mode")
                .reply_markup(admin_keyboard())
                .await?;
        }
        Command::Exit => {
            bot.send_message(msg.chat.id, "👤 <b>Normal user mode</b>")
                .parse_mode(ParseMode::Html)
                .reply_markup(user_keyboard())
                .await?;
        }
        Command::UsersList => match ctx.store.users_overview() {
            Ok(users) => {
                for chunk in split_message(&format_users(&users), MAX_MESSAGE_LEN) {
                    bot.send_message(msg.chat.id, chunk).parse_mode(ParseMode::Html).await?;
                }
            }
            Err(e) => {
                error!("Telegram: users overview failed: {}", e);
                bot.send_message(msg.chat.id, GENERIC_FAILURE).await?;
            }
        },
    }
    Ok(())
}

async fn open_browser(bot: &Bot, chat_id: ChatId, ctx: &BotContext, tg_id: i64) -> HandlerResult {
    let session = match ctx.browser.start() {
        Ok(session) => session,
        Err(e) => {
            error!("Telegram: cannot list files root: {}", e);
            bot.send_message(chat_id, GENERIC_FAILURE).await?;
            return Ok(());
        }
    };
    if session.entries.is_empty() {
        bot.send_message(chat_id, "❌ No folders available.").await?;
        return Ok(());
    }

    let menu = ctx.browser.menu(&session);
    let sent = bot
        .send_message(chat_id, menu.text.clone())
        .reply_markup(keyboard(&menu))
        .await?;
    ctx.sessions.with(tg_id, |s| s.set_browse(sent.id.0, session)).await;
    Ok(())
}

async fn open_subscriptions(bot: &Bot, chat_id: ChatId, ctx: &BotContext, tg_id: i64) -> HandlerResult {
    let paths: Vec<String> = match ctx.store.user_subscriptions(tg_id) {
        Ok(subs) => subs.into_iter().map(|s| s.folder_path).collect(),
        Err(e) => {
            error!("Telegram: listing subscriptions for {} failed: {}", tg_id, e);
            bot.send_message(chat_id, GENERIC_FAILURE).await?;
            return Ok(());
        }
    };
    if paths.is_empty() {
        bot.send_message(chat_id, "❌ You have no subscriptions.").await?;
        return Ok(());
    }

    let session = SubsSession::new(paths);
    let menu = session.menu();
    let sent = bot
        .send_message(chat_id, menu.text.clone())
        .reply_markup(keyboard(&menu))
        .await?;
    ctx.sessions.with(tg_id, |s| s.set_subs(sent.id.0, session)).await;
    Ok(())
}

enum BrowseReply {
    Edit(Menu),
    Selected(String),
    Stale,
    Failed,
}

pub async fn on_callback(bot: Bot, q: CallbackQuery, ctx: Arc<BotContext>) -> HandlerResult {
    let profile = profile_of(&q.from);
    ctx.refresh_user(&profile);
    let tg_id = profile.tg_id;

    let action = q.data.as_deref().and_then(CallbackAction::parse);
    let (Some(action), Some(message)) = (action, q.regular_message()) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let (chat_id, message_id) = (message.chat.id, message.id);
    debug!("Telegram: callback {:?} from {}", action, tg_id);

    match action {
        CallbackAction::Open(_) | CallbackAction::Page(_) | CallbackAction::Up => {
            let reply = ctx
                .sessions
                .with(tg_id, |session| {
                    let Some(browse) = session.browse_for(message_id.0) else {
                        return BrowseReply::Stale;
                    };
                    let step = match action {
                        CallbackAction::Open(index) => ctx.browser.open(browse, index),
                        CallbackAction::Up => ctx.browser.up(browse).map(|_| BrowseStep::Descended),
                        CallbackAction::Page(page) => {
                            browse.page = page;
                            Ok(BrowseStep::Descended)
                        }
                        _ => Ok(BrowseStep::Stale),
                    };
                    match step {
                        Ok(BrowseStep::Descended) => BrowseReply::Edit(ctx.browser.menu(browse)),
                        Ok(BrowseStep::Selected(path)) => {
                            session.clear_browse();
                            BrowseReply::Selected(path)
                        }
                        Ok(BrowseStep::Stale) => BrowseReply::Stale,
                        Err(e) => {
                            error!("Telegram: browsing failed for {}: {}", tg_id, e);
                            BrowseReply::Failed
                        }
                    }
                })
                .await;

            match reply {
                BrowseReply::Edit(menu) => {
                    edit_menu(&bot, chat_id, message_id, &menu).await?;
                    bot.answer_callback_query(q.id.clone()).await?;
                }
                BrowseReply::Selected(path) => match ctx.store.subscribe(&profile, &path) {
                    Ok(created) => {
                        info!("✅ Telegram: {} subscribed to {} (new: {})", tg_id, path, created);
                        bot.edit_message_text(
                            chat_id,
                            message_id,
                            format!(
                                "✅ You will now be notified about any change in:\n<code>{}</code>",
                                html::escape(&path)
                            ),
                        )
                        .parse_mode(ParseMode::Html)
                        .await?;
                        bot.answer_callback_query(q.id.clone()).await?;
                    }
                    Err(e) => {
                        error!("Telegram: subscribe {} to {} failed: {}", tg_id, path, e);
                        bot.answer_callback_query(q.id.clone())
                            .text(GENERIC_FAILURE)
                            .show_alert(true)
                            .await?;
                    }
                },
                BrowseReply::Stale => {
                    bot.answer_callback_query(q.id.clone()).text(STALE_MENU).show_alert(true).await?;
                }
                BrowseReply::Failed => {
                    bot.answer_callback_query(q.id.clone())
                        .text(GENERIC_FAILURE)
                        .show_alert(true)
                        .await?;
                }
            }
        }
        CallbackAction::SubsPage(page) => {
            let menu = ctx
                .sessions
                .with(tg_id, |session| {
                    session.subs_for(message_id.0).map(|subs| {
                        subs.page = page;
                        subs.menu()
                    })
                })
                .await;
            match menu {
                Some(menu) => {
                    edit_menu(&bot, chat_id, message_id, &menu).await?;
                    bot.answer_callback_query(q.id.clone()).await?;
                }
                None => {
                    bot.answer_callback_query(q.id.clone()).text(STALE_MENU).show_alert(true).await?;
                }
            }
        }
        CallbackAction::Delete(index) => {
            let path = ctx
                .sessions
                .with(tg_id, |session| session.subs_for(message_id.0).and_then(|s| s.paths.get(index).cloned()))
                .await;
            let Some(path) = path else {
                bot.answer_callback_query(q.id.clone()).text(STALE_MENU).show_alert(true).await?;
                return Ok(());
            };

            if let Err(e) = ctx.store.unsubscribe(tg_id, &path) {
                error!("Telegram: unsubscribe {} from {} failed: {}", tg_id, path, e);
                bot.answer_callback_query(q.id.clone())
                    .text(GENERIC_FAILURE)
                    .show_alert(true)
                    .await?;
                return Ok(());
            }
            info!("🗑️ Telegram: {} unsubscribed from {}", tg_id, path);

            let menu = ctx
                .sessions
                .with(tg_id, |session| {
                    session.subs_for(message_id.0).map(|subs| {
                        subs.remove(&path);
                        subs.menu()
                    })
                })
                .await;
            if let Some(menu) = menu {
                if let Err(e) = edit_menu(&bot, chat_id, message_id, &menu).await {
                    // the message on screen no longer matches the list
                    warn!("Telegram: could not refresh subscriptions of {}: {}", tg_id, e);
                    ctx.sessions.with(tg_id, |session| session.clear_subs()).await;
                }
            }
            if let Err(e) = bot.answer_callback_query(q.id.clone()).text(removed_toast(&path)).await {
                warn!("Telegram: could not confirm removal to {}: {}", tg_id, e);
            }
        }
    }
    Ok(())
}
