use async_trait::async_trait;

use crate::{
    domain::ChatId,
    messaging::types::TextFormat,
    Result,
};

/// Outbound chat transport.
///
/// Implementations report an unreachable recipient as
/// [`Error::permanent_delivery`](crate::Error::permanent_delivery) and everything
/// else (rate limits, network) as a transient delivery error.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_message(&self, chat_id: ChatId, text: &str, format: TextFormat) -> Result<()>;
}
