//! Telegram adapter (teloxide).
//!
//! Implements the `tgw-core` MessagingPort over the Telegram Bot API and runs the
//! `/start` / `/stop` command loop.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::ParseMode,
    ApiError, RequestError,
};

use tokio::time::sleep;
use tracing::debug;

pub mod router;

use tgw_core::{
    domain::ChatId,
    errors::Error,
    messaging::{port::MessagingPort, types::TextFormat},
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: RequestError) -> Error {
        if is_unreachable(&e) {
            Error::permanent_delivery(format!("telegram: {e}"))
        } else {
            Error::transient_delivery(format!("telegram: {e}"))
        }
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    RequestError::RetryAfter(secs) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        debug!(wait = ?secs, "telegram asked to retry later");
                        sleep(secs).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

/// The recipient can no longer be reached through this bot.
pub fn is_unreachable(e: &RequestError) -> bool {
    match e {
        RequestError::Api(api) => is_unreachable_api(api),
        // The old id is dead once a group becomes a supergroup.
        RequestError::MigrateToChatId(_) => true,
        _ => false,
    }
}

fn is_unreachable_api(api: &ApiError) -> bool {
    match api {
        ApiError::BotBlocked
        | ApiError::BotKicked
        | ApiError::BotKickedFromSupergroup
        | ApiError::UserDeactivated
        | ApiError::ChatNotFound
        | ApiError::CantInitiateConversation => true,
        ApiError::Unknown(text) => text.starts_with("Forbidden"),
        _ => false,
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_message(&self, chat_id: ChatId, text: &str, format: TextFormat) -> Result<()> {
        self.with_retry(|| {
            let req = self.bot.send_message(Self::tg_chat(chat_id), text.to_string());
            match format {
                TextFormat::Html => req.parse_mode(ParseMode::Html),
                TextFormat::Plain => req,
            }
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_recipients_are_permanent() {
        for api in [
            ApiError::BotBlocked,
            ApiError::BotKicked,
            ApiError::BotKickedFromSupergroup,
            ApiError::UserDeactivated,
            ApiError::ChatNotFound,
            ApiError::CantInitiateConversation,
            ApiError::Unknown("Forbidden: bot was kicked from the channel chat".into()),
        ] {
            let err = TelegramMessenger::map_err(RequestError::Api(api));
            assert!(err.is_permanent_delivery(), "{err}");
        }
    }

    #[test]
    fn other_api_errors_are_transient() {
        for api in [
            ApiError::MessageTextIsEmpty,
            ApiError::Unknown("Bad Request: something odd".into()),
        ] {
            let err = TelegramMessenger::map_err(RequestError::Api(api));
            assert!(matches!(err, Error::Delivery { .. }));
            assert!(!err.is_permanent_delivery(), "{err}");
        }
    }
}
