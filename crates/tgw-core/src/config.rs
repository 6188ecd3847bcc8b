use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde_json::Value;

use crate::{
    domain::ChatId,
    errors::Error,
    store::{builtin_defaults, default_store_path},
    Result,
};

pub const DEFAULT_API_BASE_URL: &str = "https://apptoogoodtogo.com/api/";

/// Process-level configuration, read from the environment (and `.env`).
///
/// Persisted, user-editable settings live in [`ConfigStore`](crate::store::ConfigStore);
/// this only carries what the process needs to find and authenticate things.
#[derive(Clone, Debug)]
pub struct Config {
    // Marketplace
    pub api_base_url: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: u32,

    // Telegram
    pub telegram_bot_token: Option<String>,
    pub seed_chat: Option<SeedChat>,

    // Store
    pub store_path: PathBuf,
    pub store_defaults: Value,

    // Polling
    pub polling_interval_override: Option<Duration>,
}

/// A chat to register at startup, for deployments without anyone sending `/start`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedChat {
    pub chat_id: ChatId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let api_base_url = env_str("TGW_API_BASE_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = if api_base_url.ends_with('/') {
            api_base_url
        } else {
            format!("{api_base_url}/")
        };

        let email = env_str("EMAIL").and_then(non_empty);
        let password = env_str("PASSWORD").and_then(non_empty);

        let latitude = env_f64("LOCATION_LATITUDE").unwrap_or(0.0);
        let longitude = env_f64("LOCATION_LONGITUDE").unwrap_or(0.0);
        let radius_km = env_u32("LOCATION_RADIUS").unwrap_or(15);

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").and_then(non_empty);
        let seed_chat = env_str("TELEGRAM_CHAT_ID")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(|id| SeedChat {
                chat_id: ChatId(id),
                first_name: env_str("TELEGRAM_CHAT_FIRSTNAME").and_then(non_empty),
                last_name: env_str("TELEGRAM_CHAT_LASTNAME").and_then(non_empty),
            });

        let store_path = match env_path("TGW_CONFIG_FILE") {
            Some(p) => p,
            None => default_store_path().ok_or_else(|| {
                Error::Config("cannot locate config dir: set HOME or TGW_CONFIG_FILE".to_string())
            })?,
        };

        let store_defaults = match env_str("TGW_CONF").and_then(non_empty) {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| Error::Config(format!("TGW_CONF is not valid JSON: {e}")))?,
            None => builtin_defaults(),
        };

        let polling_interval_override = env_u64("POLLING_INTERVAL_MS")
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        Ok(Self {
            api_base_url,
            email,
            password,
            latitude,
            longitude,
            radius_km,
            telegram_bot_token,
            seed_chat,
            store_path,
            store_defaults,
            polling_interval_override,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    env_str(key).and_then(|s| s.trim().parse::<f64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
