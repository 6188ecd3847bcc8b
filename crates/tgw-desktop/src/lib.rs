//! Desktop notification adapter.
//!
//! Shells out to the platform notifier: `notify-send` on Linux and friends,
//! `osascript` on macOS. Every failure here is transient for the caller.

use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use tgw_core::{errors::Error, ports::DesktopNotifier, Result};

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    FreeDesktop,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::FreeDesktop
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn build(platform: Platform, title: &str, body: &str) -> Self {
        match platform {
            Platform::MacOs => Self {
                program: "osascript".to_string(),
                args: vec![
                    "-e".to_string(),
                    format!(
                        "display notification {} with title {}",
                        applescript_string(body),
                        applescript_string(title)
                    ),
                ],
            },
            Platform::FreeDesktop => Self {
                program: "notify-send".to_string(),
                args: vec![
                    "--app-name".to_string(),
                    title.to_string(),
                    title.to_string(),
                    body.to_string(),
                ],
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct CommandDesktopNotifier {
    platform: Platform,
}

impl CommandDesktopNotifier {
    pub fn new() -> Self {
        Self::for_platform(Platform::current())
    }

    pub fn for_platform(platform: Platform) -> Self {
        Self { platform }
    }
}

impl Default for CommandDesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DesktopNotifier for CommandDesktopNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        let inv = Invocation::build(self.platform, title, body);
        debug!(program = %inv.program, "sending desktop notification");

        let mut cmd = Command::new(&inv.program);
        cmd.args(&inv.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(NOTIFY_TIMEOUT, cmd.output())
            .await
            .map_err(|_| Error::transient_delivery(format!("{} timed out", inv.program)))?
            .map_err(|e| Error::transient_delivery(format!("{} failed to start: {e}", inv.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::transient_delivery(format!(
                "{} exited with {}: {}",
                inv.program,
                output.status,
                stderr.trim().chars().take(200).collect::<String>()
            )));
        }
        Ok(())
    }
}

/// Quote a value as an AppleScript string literal.
fn applescript_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applescript_quotes_are_escaped() {
        assert_eq!(applescript_string("plain"), "\"plain\"");
        assert_eq!(
            applescript_string("say \"hi\"\\\nbye"),
            "\"say \\\"hi\\\"\\\\\\nbye\""
        );
    }

    #[test]
    fn macos_invocation_uses_osascript() {
        let inv = Invocation::build(Platform::MacOs, "TooGoodToGo", "Bakery: 2 left");
        assert_eq!(inv.program, "osascript");
        assert_eq!(
            inv.args,
            vec![
                "-e".to_string(),
                "display notification \"Bakery: 2 left\" with title \"TooGoodToGo\"".to_string()
            ]
        );
    }

    #[test]
    fn freedesktop_invocation_passes_body_verbatim() {
        let inv = Invocation::build(Platform::FreeDesktop, "TooGoodToGo", "a \"b\"");
        assert_eq!(inv.program, "notify-send");
        assert_eq!(inv.args.last().map(String::as_str), Some("a \"b\""));
    }
}
