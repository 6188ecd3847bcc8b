//! Seams to the outside world that are not the chat transport.

use std::io::Write;

use async_trait::async_trait;

use crate::{snapshot::StoreAvailability, Result};

/// Where the console channel writes.
pub trait ConsoleSink: Send + Sync {
    fn clear(&self);
    fn print(&self, text: &str);
}

/// Process stdout.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutConsole;

impl ConsoleSink for StdoutConsole {
    fn clear(&self) {
        // ANSI: erase screen, cursor home.
        print!("\x1B[2J\x1B[1;1H");
        let _ = std::io::stdout().flush();
    }

    fn print(&self, text: &str) {
        println!("{text}\n");
    }
}

/// OS desktop notification, fire-and-forget.
#[async_trait]
pub trait DesktopNotifier: Send + Sync {
    async fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Marketplace favorites, already mapped into typed records.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_favorites(&self) -> Result<Vec<StoreAvailability>>;
}
