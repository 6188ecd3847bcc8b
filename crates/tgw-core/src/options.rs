//! Notification options as read from the config store.

use serde::{Deserialize, Serialize};

use crate::{errors::Error, store::ConfigStore, Result};

pub const NOTIFICATIONS_KEY: &str = "notifications";
pub const MESSAGE_FILTER_KEY: &str = "messageFilter";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub clear_before_print: bool,
    /// Older config files used `clear`; defaults always carry `clearBeforePrint`.
    #[serde(default, rename = "clear", skip_serializing_if = "Option::is_none")]
    pub legacy_clear: Option<bool>,
}

impl ConsoleOptions {
    pub fn should_clear(&self) -> bool {
        self.clear_before_print || self.legacy_clear.unwrap_or(false)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelToggle {
    #[serde(default)]
    pub enabled: bool,
}

/// Per-channel switches. Unknown keys (e.g. the persisted chat list) are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOptions {
    #[serde(default)]
    pub console: ConsoleOptions,
    #[serde(default)]
    pub desktop: ChannelToggle,
    #[serde(default)]
    pub telegram: ChannelToggle,
}

/// Which change verdicts are worth a notification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFilter {
    #[serde(default)]
    pub show_unchanged: bool,
    #[serde(default)]
    pub show_increase: bool,
    #[serde(default)]
    pub show_increase_from_zero: bool,
    #[serde(default)]
    pub show_decrease: bool,
    #[serde(default)]
    pub show_decrease_to_zero: bool,
}

impl MessageFilter {
    pub fn all() -> Self {
        Self {
            show_unchanged: true,
            show_increase: true,
            show_increase_from_zero: true,
            show_decrease: true,
            show_decrease_to_zero: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl NotificationOptions {
    pub fn load(store: &ConfigStore) -> Result<Self> {
        store
            .get_as(NOTIFICATIONS_KEY)
            .map_err(|e| Error::ConfigUnavailable(e.to_string()))
    }

    /// Anything besides the chat bot that wants a fetch.
    pub fn has_local_listeners(&self) -> bool {
        self.console.enabled || self.desktop.enabled
    }
}

impl MessageFilter {
    pub fn load(store: &ConfigStore) -> Result<Self> {
        store
            .get_as(MESSAGE_FILTER_KEY)
            .map_err(|e| Error::ConfigUnavailable(e.to_string()))
    }
}
