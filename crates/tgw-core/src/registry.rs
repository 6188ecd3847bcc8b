//! Chat subscribers, persisted in the config store.
//!
//! Mutations build the new list, persist it, and only then swap it in, all under
//! one lock. Readers get a cloned list, so a `/start` arriving mid-dispatch never
//! shows up half-applied.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::info;

use crate::{domain::ChatId, store::ConfigStore, Result};

pub const CHATS_KEY: &str = "notifications.telegram.chats";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSubscriber {
    pub id: ChatId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl ChatSubscriber {
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            "unknown".to_string()
        } else {
            parts.join(" ")
        }
    }
}

pub struct SubscriberRegistry {
    store: Arc<ConfigStore>,
    chats: Mutex<Vec<ChatSubscriber>>,
    active: watch::Sender<bool>,
}

impl SubscriberRegistry {
    /// Load the persisted subscriber list. A missing key means nobody is subscribed.
    pub fn load(store: Arc<ConfigStore>) -> Result<Self> {
        let chats: Vec<ChatSubscriber> = match store.get(CHATS_KEY) {
            Some(v) if !v.is_null() => serde_json::from_value(v)?,
            _ => Vec::new(),
        };
        let (active, _) = watch::channel(!chats.is_empty());
        Ok(Self {
            store,
            chats: Mutex::new(chats),
            active,
        })
    }

    /// Add `chat_id`, or refresh its names if it is already subscribed.
    /// Returns `true` when the chat was not subscribed before.
    pub async fn subscribe(
        &self,
        chat_id: ChatId,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<bool> {
        let mut chats = self.chats.lock().await;
        let subscriber = ChatSubscriber {
            id: chat_id,
            first_name,
            last_name,
        };

        let mut next = chats.clone();
        let added = match next.iter_mut().find(|c| c.id == chat_id) {
            Some(existing) => {
                *existing = subscriber.clone();
                false
            }
            None => {
                next.push(subscriber.clone());
                true
            }
        };

        self.store.set(CHATS_KEY, &next)?;
        *chats = next;
        self.publish(chats.len());

        info!(
            chat_id = %chat_id,
            name = %subscriber.display_name(),
            added,
            "chat subscribed"
        );
        Ok(added)
    }

    /// Remove `chat_id`. Unknown ids are a no-op that returns `false`.
    pub async fn unsubscribe(&self, chat_id: ChatId) -> Result<bool> {
        let mut chats = self.chats.lock().await;
        let Some(pos) = chats.iter().position(|c| c.id == chat_id) else {
            return Ok(false);
        };

        let mut next = chats.clone();
        let removed = next.remove(pos);
        self.store.set(CHATS_KEY, &next)?;
        *chats = next;
        self.publish(chats.len());

        info!(chat_id = %chat_id, name = %removed.display_name(), "chat unsubscribed");
        Ok(true)
    }

    pub async fn active_count(&self) -> usize {
        self.chats.lock().await.len()
    }

    /// Point-in-time copy of the subscriber list.
    pub async fn subscribers(&self) -> Vec<ChatSubscriber> {
        self.chats.lock().await.clone()
    }

    pub fn has_active_subscribers(&self) -> bool {
        *self.active.borrow()
    }

    /// Live "at least one subscriber" signal; only changes are published.
    pub fn watch_active(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }

    fn publish(&self, count: usize) {
        let now_active = count > 0;
        self.active.send_if_modified(|v| {
            if *v == now_active {
                false
            } else {
                *v = now_active;
                true
            }
        });
    }
}
