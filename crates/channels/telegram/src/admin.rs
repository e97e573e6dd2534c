use folderbell_store::UserOverview;
use teloxide::utils::html;

/// Telegram rejects messages above 4096 characters; stay below with some slack.
pub const MAX_MESSAGE_LEN: usize = 4000;

const MAX_FOLDER_LEN: usize = 50;
const RULE: &str = "┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄";

/// HTML listing of every user and their subscriptions.
pub fn format_users(users: &[UserOverview]) -> String {
    if users.is_empty() {
        return "No users found.".to_string();
    }

    let mut out = String::from("<b>Registered users</b>\n\n");
    for user in users {
        let username = user
            .profile
            .username
            .as_deref()
            .map(|u| format!("@{}", html::escape(u)))
            .unwrap_or_else(|| "no username".to_string());
        out.push_str(&format!("👤 <b>User:</b> {}\n", username));
        out.push_str(&format!("🆔 ID: {} | TG ID: {}\n", user.id, user.profile.tg_id));
        if let Some(name) = user.profile.full_name() {
            out.push_str(&format!("📝 Name: {}\n", html::escape(&name)));
        }

        if user.folders.is_empty() {
            out.push_str("📂 <i>No active subscriptions</i>\n");
        } else {
            out.push_str(&format!("📂 <b>Subscriptions ({}):</b>\n", user.folders.len()));
            for (i, folder) in user.folders.iter().enumerate() {
                out.push_str(&format!("   {}. 📁 {}\n", i + 1, html::escape(&shorten_path(folder))));
            }
        }
        out.push_str(RULE);
        out.push('\n');
    }
    out
}

/// Cuts paths longer than 50 characters down to 47 plus `...`.
pub fn shorten_path(folder: &str) -> String {
    if folder.chars().count() <= MAX_FOLDER_LEN {
        return folder.to_string();
    }
    let head: String = folder.chars().take(MAX_FOLDER_LEN - 3).collect();
    format!("{head}...")
}

/// Splits text into chunks of at most `max_len` characters, preferring line boundaries.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > max_len && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max_len {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_len) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}
