use std::{path::Path, sync::Arc};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use teloxide::Bot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tgw_api::TgtgClient;
use tgw_core::{
    config::Config,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    notifier::Notifier,
    options::NotificationOptions,
    ports::StdoutConsole,
    registry::SubscriberRegistry,
    store::ConfigStore,
    watcher::Watcher,
};
use tgw_desktop::CommandDesktopNotifier;
use tgw_telegram::TelegramMessenger;

#[derive(Debug, Parser)]
#[command(name = "tgw", version)]
#[command(about = "Watch TooGoodToGo favorites and report stock changes")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll favorites and notify (the default)
    Watch,
    /// Inspect or change the settings file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the settings file location
    Path,
    /// Restore the built-in defaults
    Reset,
    /// Open the settings file in $EDITOR
    Edit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tgw_core::logging::init("tgw")?;

    let cli = Cli::parse();
    let cfg = Config::load()?;
    let store = Arc::new(
        ConfigStore::open(cfg.store_path.clone(), cfg.store_defaults.clone())
            .with_context(|| format!("opening {}", cfg.store_path.display()))?,
    );

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => watch(cfg, store).await,
        Commands::Config(ConfigCommand::Path) => {
            println!("{}", cfg.store_path.display());
            Ok(())
        }
        Commands::Config(ConfigCommand::Reset) => {
            store.reset()?;
            println!("Settings reset: {}", cfg.store_path.display());
            Ok(())
        }
        Commands::Config(ConfigCommand::Edit) => edit(&cfg).await,
    }
}

async fn watch(cfg: Config, store: Arc<ConfigStore>) -> anyhow::Result<()> {
    let registry = Arc::new(SubscriberRegistry::load(store.clone())?);
    if let Some(seed) = &cfg.seed_chat {
        if registry
            .subscribe(seed.chat_id, seed.first_name.clone(), seed.last_name.clone())
            .await?
        {
            info!(chat_id = %seed.chat_id, "registered chat from environment");
        }
    }

    let options = NotificationOptions::load(&store)?;
    let mut notifier = Notifier::new(store.clone(), registry, Arc::new(StdoutConsole))
        .with_desktop(Arc::new(CommandDesktopNotifier::new()));

    let bot = match (&cfg.telegram_bot_token, options.telegram.enabled) {
        (Some(token), true) => Some(Bot::new(token.clone())),
        (None, true) => {
            warn!("telegram notifications enabled but TELEGRAM_BOT_TOKEN is not set");
            None
        }
        _ => None,
    };
    if let Some(bot) = &bot {
        let raw: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
        notifier = notifier.with_messenger(Arc::new(ThrottledMessenger::new(
            raw,
            ThrottleConfig::default(),
        )));
    }
    let notifier = Arc::new(notifier);

    let bot_task = bot.map(|bot| {
        let notifier = notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = tgw_telegram::router::run_polling(bot, notifier).await {
                warn!(error = %e, "telegram bot stopped");
            }
        })
    });

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
            }
            cancel.cancel();
        });
    }

    let source = Arc::new(TgtgClient::from_config(&cfg, store.clone()));
    Watcher::new(source, notifier, store)
        .with_interval_override(cfg.polling_interval_override)
        .run(cancel)
        .await;

    if let Some(task) = bot_task {
        task.abort();
    }
    Ok(())
}

async fn edit(cfg: &Config) -> anyhow::Result<()> {
    let editor = std::env::var("EDITOR")
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string());

    let status = tokio::process::Command::new(&editor)
        .arg(&cfg.store_path)
        .status()
        .await
        .with_context(|| format!("starting editor `{editor}`"))?;
    if !status.success() {
        bail!("editor `{editor}` exited with {status}");
    }

    check_settings(&cfg.store_path, cfg)
}

/// Re-open the edited file so a typo surfaces now rather than on the next start.
fn check_settings(path: &Path, cfg: &Config) -> anyhow::Result<()> {
    ConfigStore::open(path.to_path_buf(), cfg.store_defaults.clone())
        .with_context(|| format!("{} is no longer valid", path.display()))?;
    println!("Settings saved: {}", path.display());
    Ok(())
}
