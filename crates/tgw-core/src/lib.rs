//! Core of the TooGoodToGo watcher.
//!
//! Framework-agnostic: the marketplace API, Telegram and the desktop notifier
//! live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod detector;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod notifier;
pub mod options;
pub mod ports;
pub mod registry;
pub mod render;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod watcher;

pub use errors::{Error, Result};
