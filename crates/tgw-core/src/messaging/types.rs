use crate::domain::ChatId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Html,
}

/// Inbound bot command, already stripped of transport details.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Subscribe {
        chat_id: ChatId,
        first_name: Option<String>,
        last_name: Option<String>,
    },
    Unsubscribe {
        chat_id: ChatId,
    },
}

impl BotCommand {
    /// Parse `/start` and `/stop` (with optional `@botname` suffix).
    /// Anything else yields `None`.
    pub fn parse(
        text: &str,
        chat_id: ChatId,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Option<Self> {
        match command_name(text)?.as_str() {
            "start" => Some(Self::Subscribe {
                chat_id,
                first_name,
                last_name,
            }),
            "stop" => Some(Self::Unsubscribe { chat_id }),
            _ => None,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Subscribe { chat_id, .. } | Self::Unsubscribe { chat_id } => *chat_id,
        }
    }
}

fn command_name(text: &str) -> Option<String> {
    // Telegram may send `/cmd@botname arg1 ...`
    let first = text.trim().split_whitespace().next()?;
    let cmd = first.strip_prefix('/')?;
    let name = cmd.split('@').next().unwrap_or("").to_lowercase();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
