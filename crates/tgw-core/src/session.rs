//! Marketplace login session, persisted under `api.session`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{store::ConfigStore, Result};

pub const SESSION_KEY: &str = "api.session";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl Session {
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Typed view over the session part of the config store.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<ConfigStore>,
}

impl SessionStore {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    /// Current session; an absent or unreadable entry is an empty session.
    pub fn load(&self) -> Session {
        self.store
            .get(SESSION_KEY)
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        self.store.set(SESSION_KEY, session)
    }

    /// Token refresh: keep the user, swap the tokens.
    pub fn update_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        let mut session = self.load();
        session.access_token = Some(access_token.to_string());
        if let Some(rt) = refresh_token {
            session.refresh_token = Some(rt.to_string());
        }
        self.save(&session)
    }
}
