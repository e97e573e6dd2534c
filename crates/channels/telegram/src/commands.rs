use teloxide::types::{KeyboardButton, KeyboardMarkup};
use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Folderbell commands:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start,
    #[command(description = "subscribe to a folder")]
    Subscribe,
    #[command(description = "view and manage your subscriptions")]
    MySubs,
    #[command(description = "show this help")]
    Help,
    #[command(hide)]
    Admin,
    #[command(hide)]
    UsersList,
    #[command(hide)]
    Exit,
}

impl Command {
    pub fn is_admin_only(&self) -> bool {
        matches!(self, Self::Admin | Self::UsersList | Self::Exit)
    }
}

pub fn user_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("/subscribe")],
        vec![KeyboardButton::new("/my_subs")],
    ])
    .resize_keyboard()
}

pub fn admin_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("/users_list")],
        vec![KeyboardButton::new("/exit")],
    ])
    .resize_keyboard()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_snake_case_commands() {
        assert_eq!(Command::parse("/my_subs", "folderbell_bot").unwrap(), Command::MySubs);
        assert_eq!(Command::parse("/users_list", "folderbell_bot").unwrap(), Command::UsersList);
        assert!(Command::parse("/unknown", "folderbell_bot").is_err());
    }

    #[test]
    fn admin_commands_are_flagged() {
        assert!(Command::UsersList.is_admin_only());
        assert!(!Command::Subscribe.is_admin_only());
    }
}
