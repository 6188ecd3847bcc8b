//! Notify cycle: detect changes against the cached snapshot, render, fan out.
//!
//! `Notifier` owns the only two pieces of process-wide mutable state: the previous
//! snapshot and (through [`SubscriberRegistry`]) the chat subscribers. Cycles are
//! serialized on the snapshot lock; the three channels of one cycle run
//! concurrently and never short-circuit each other.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    detector::detect_changes,
    domain::ChatId,
    messaging::{port::MessagingPort, types::BotCommand, types::TextFormat},
    options::{MessageFilter, NotificationOptions},
    ports::{ConsoleSink, DesktopNotifier},
    registry::SubscriberRegistry,
    render::{render, Channel, DESKTOP_TITLE},
    snapshot::{Snapshot, StoreAvailability},
    store::ConfigStore,
    Result,
};

const WELCOME_TEXT: &str = "*bleep, bleep, bleep* I am the TooGoodToGo bot.\n\
I will tell you whenever the stock of your favorites changes. *bloop*.\n\
If you get tired of my spamming you can (temporarily) disable me with:\n/stop";

const GOODBYE_TEXT: &str = "*bleep* Ok.. I get it. Too much is too much. \
I'll stop bothering you now. *bloop*.\nYou can enable me again with:\n/start";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelOutcome {
    /// Disabled, or nothing to say on this channel.
    #[default]
    Skipped,
    Delivered,
    Failed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub changed: usize,
    pub console: ChannelOutcome,
    pub desktop: ChannelOutcome,
    pub chat: ChannelOutcome,
    pub chat_messages_sent: usize,
    pub unsubscribed: Vec<ChatId>,
}

#[derive(Clone, Debug, Default)]
struct ChatDelivery {
    outcome: ChannelOutcome,
    sent: usize,
    unsubscribed: Vec<ChatId>,
}

pub struct Notifier {
    store: Arc<ConfigStore>,
    registry: Arc<SubscriberRegistry>,
    console: Arc<dyn ConsoleSink>,
    desktop: Option<Arc<dyn DesktopNotifier>>,
    messenger: Option<Arc<dyn MessagingPort>>,
    previous: Mutex<Snapshot>,
    last_chat_messages: Mutex<Vec<String>>,
}

impl Notifier {
    pub fn new(
        store: Arc<ConfigStore>,
        registry: Arc<SubscriberRegistry>,
        console: Arc<dyn ConsoleSink>,
    ) -> Self {
        Self {
            store,
            registry,
            console,
            desktop: None,
            messenger: None,
            previous: Mutex::new(Snapshot::new()),
            last_chat_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn with_desktop(mut self, desktop: Arc<dyn DesktopNotifier>) -> Self {
        self.desktop = Some(desktop);
        self
    }

    pub fn with_messenger(mut self, messenger: Arc<dyn MessagingPort>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Telegram is enabled and somebody is listening.
    pub fn has_active_chats(&self, options: &NotificationOptions) -> bool {
        options.telegram.enabled && self.registry.has_active_subscribers()
    }

    /// Is any channel interested in a fetch right now?
    pub fn has_listeners(&self) -> Result<bool> {
        let options = NotificationOptions::load(&self.store)?;
        Ok(options.has_local_listeners() || self.has_active_chats(&options))
    }

    /// Wakes whenever the subscriber signal flips.
    pub fn watch_subscribers(&self) -> watch::Receiver<bool> {
        self.registry.watch_active()
    }

    /// Run one full cycle for a freshly fetched snapshot.
    ///
    /// Fails only when the options cannot be read; in that case the cached
    /// snapshot is left untouched.
    pub async fn notify_if_changed(&self, fetched: Snapshot) -> Result<DispatchReport> {
        let mut previous = self.previous.lock().await;

        let options = NotificationOptions::load(&self.store)?;
        let filter = MessageFilter::load(&self.store)?;

        let changed = detect_changes(&fetched, &previous, &filter);
        debug!(
            fetched = fetched.len(),
            changed = changed.len(),
            "change detection done"
        );

        let gate_open = self.has_active_chats(&options);
        let report = self.dispatch(&changed, &options, gate_open).await;

        *previous = fetched;
        Ok(report)
    }

    /// Deliver `changed` to every enabled channel. Channel failures are logged
    /// and reported, never propagated.
    pub async fn dispatch(
        &self,
        changed: &[StoreAvailability],
        options: &NotificationOptions,
        subscriber_gate_open: bool,
    ) -> DispatchReport {
        let (console, desktop, chat) = tokio::join!(
            self.notify_console(changed, options),
            self.notify_desktop(changed, options),
            self.notify_chat(changed, options, subscriber_gate_open),
        );

        DispatchReport {
            changed: changed.len(),
            console,
            desktop,
            chat: chat.outcome,
            chat_messages_sent: chat.sent,
            unsubscribed: chat.unsubscribed,
        }
    }

    async fn notify_console(
        &self,
        changed: &[StoreAvailability],
        options: &NotificationOptions,
    ) -> ChannelOutcome {
        if !options.console.enabled {
            return ChannelOutcome::Skipped;
        }
        if options.console.should_clear() {
            self.console.clear();
        }
        for block in render(changed, Channel::Console) {
            self.console.print(&block);
        }
        ChannelOutcome::Delivered
    }

    async fn notify_desktop(
        &self,
        changed: &[StoreAvailability],
        options: &NotificationOptions,
    ) -> ChannelOutcome {
        if changed.is_empty() || !options.desktop.enabled {
            return ChannelOutcome::Skipped;
        }
        let Some(desktop) = &self.desktop else {
            warn!("desktop notifications enabled but no notifier is available");
            return ChannelOutcome::Skipped;
        };

        let body = render(changed, Channel::Desktop).join("\n");
        match desktop.notify(DESKTOP_TITLE, &body).await {
            Ok(()) => ChannelOutcome::Delivered,
            Err(e) => {
                warn!(error = %e, "desktop notification failed");
                ChannelOutcome::Failed
            }
        }
    }

    async fn notify_chat(
        &self,
        changed: &[StoreAvailability],
        options: &NotificationOptions,
        subscriber_gate_open: bool,
    ) -> ChatDelivery {
        if changed.is_empty() || !options.telegram.enabled || !subscriber_gate_open {
            return ChatDelivery::default();
        }
        let Some(messenger) = &self.messenger else {
            warn!("telegram notifications enabled but the bot is not running");
            return ChatDelivery::default();
        };

        let messages = render(changed, Channel::Chat);
        *self.last_chat_messages.lock().await = messages.clone();

        let mut delivery = ChatDelivery::default();
        let mut failures = 0usize;
        for chat in self.registry.subscribers().await {
            for message in &messages {
                match messenger
                    .send_message(chat.id, message, TextFormat::Html)
                    .await
                {
                    Ok(_) => delivery.sent += 1,
                    Err(e) if e.is_permanent_delivery() => {
                        info!(chat_id = %chat.id, error = %e, "chat unreachable, unsubscribing");
                        match self.registry.unsubscribe(chat.id).await {
                            Ok(_) => delivery.unsubscribed.push(chat.id),
                            Err(e) => error!(chat_id = %chat.id, error = %e, "unsubscribe failed"),
                        }
                        failures += 1;
                        break;
                    }
                    Err(e) => {
                        warn!(chat_id = %chat.id, error = %e, "chat delivery failed");
                        failures += 1;
                    }
                }
            }
        }

        delivery.outcome = if delivery.sent > 0 {
            ChannelOutcome::Delivered
        } else if failures > 0 {
            ChannelOutcome::Failed
        } else {
            ChannelOutcome::Skipped
        };
        delivery
    }

    /// React to `/start` and `/stop`.
    pub async fn handle_command(&self, command: BotCommand) -> Result<()> {
        match command {
            BotCommand::Subscribe {
                chat_id,
                first_name,
                last_name,
            } => {
                info!(chat_id = %chat_id, "received start command");
                self.registry
                    .subscribe(chat_id, first_name, last_name)
                    .await?;
                self.reply(chat_id, WELCOME_TEXT, TextFormat::Plain).await;

                let latest = self.last_chat_messages.lock().await.clone();
                for message in latest {
                    self.reply(chat_id, &message, TextFormat::Html).await;
                }
            }
            BotCommand::Unsubscribe { chat_id } => {
                info!(chat_id = %chat_id, "received stop command");
                self.reply(chat_id, GOODBYE_TEXT, TextFormat::Plain).await;
                self.registry.unsubscribe(chat_id).await?;
            }
        }
        Ok(())
    }

    async fn reply(&self, chat_id: ChatId, text: &str, format: TextFormat) {
        let Some(messenger) = &self.messenger else {
            return;
        };
        if let Err(e) = messenger.send_message(chat_id, text, format).await {
            if e.is_permanent_delivery() {
                if let Err(e) = self.registry.unsubscribe(chat_id).await {
                    error!(chat_id = %chat_id, error = %e, "unsubscribe failed");
                }
            }
            warn!(chat_id = %chat_id, error = %e, "reply failed");
        }
    }
}
