use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use tgw_core::{domain::ChatId, messaging::types::BotCommand, notifier::Notifier};

/// Long-poll Telegram updates and route `/start` and `/stop` to the notifier.
/// Returns when the dispatcher stops.
pub async fn run_polling(bot: Bot, notifier: Arc<Notifier>) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => info!(bot = %me.username(), "telegram bot started"),
        Err(e) => warn!(error = %e, "telegram getMe failed, polling anyway"),
    }

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![notifier])
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(msg: Message, notifier: Arc<Notifier>) -> ResponseResult<()> {
    let Some(command) = command_from_message(&msg) else {
        return Ok(());
    };

    if let Err(e) = notifier.handle_command(command.clone()).await {
        warn!(chat_id = %command.chat_id(), error = %e, "bot command failed");
    }
    Ok(())
}

fn command_from_message(msg: &Message) -> Option<BotCommand> {
    let text = msg.text()?;
    let from = msg.from();
    BotCommand::parse(
        text,
        ChatId(msg.chat.id.0),
        from.map(|u| u.first_name.clone()),
        from.and_then(|u| u.last_name.clone()),
    )
}
