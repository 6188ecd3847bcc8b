//! TooGoodToGo marketplace adapter.
//!
//! Logs in by email (or refreshes a stored token), lists the user's favorites and
//! maps them into [`StoreAvailability`] records for the watcher.

pub mod records;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE},
    StatusCode,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use tgw_core::{
    config::Config,
    errors::Error,
    ports::SnapshotSource,
    session::{Session, SessionStore},
    snapshot::StoreAvailability,
    store::ConfigStore,
    Result,
};

pub use records::map_records;

pub const HEADERS_KEY: &str = "api.headers";

const REFRESH_PATH: &str = "auth/v1/token/refresh";
const LOGIN_PATH: &str = "auth/v1/loginByEmail";
const ITEMS_PATH: &str = "item/v5/";

#[derive(Clone, Debug)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Where to search for favorites.
#[derive(Clone, Copy, Debug)]
pub struct Origin {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: u32,
}

#[derive(Clone)]
pub struct TgtgClient {
    base_url: String,
    credentials: Credentials,
    origin: Origin,
    store: Arc<ConfigStore>,
    sessions: SessionStore,
    http: reqwest::Client,
}

impl TgtgClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        origin: Origin,
        store: Arc<ConfigStore>,
    ) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client build");
        Self {
            base_url,
            credentials,
            origin,
            sessions: SessionStore::new(store.clone()),
            store,
            http,
        }
    }

    pub fn from_config(cfg: &Config, store: Arc<ConfigStore>) -> Self {
        Self::new(
            cfg.api_base_url.clone(),
            Credentials {
                email: cfg.email.clone(),
                password: cfg.password.clone(),
            },
            Origin {
                latitude: cfg.latitude,
                longitude: cfg.longitude,
                radius_km: cfg.radius_km,
            },
            store,
        )
    }

    /// Refresh the stored session if possible, otherwise log in by email.
    pub async fn login(&self) -> Result<Session> {
        let session = self.sessions.load();
        if session.can_refresh() {
            match self.refresh_token(&session).await {
                Ok(refreshed) => return Ok(refreshed),
                Err(Error::Auth(reason)) => {
                    warn!(%reason, "token refresh rejected, logging in again");
                }
                Err(e) => return Err(e),
            }
        }
        self.login_by_email().await
    }

    pub async fn login_by_email(&self) -> Result<Session> {
        let (Some(email), Some(password)) = (
            self.credentials.email.as_deref(),
            self.credentials.password.as_deref(),
        ) else {
            return Err(Error::Auth(
                "EMAIL and PASSWORD are required to log in".to_string(),
            ));
        };

        let body = json!({
            "device_type": "UNKNOWN",
            "email": email,
            "password": password,
        });
        let v = self.post_json(LOGIN_PATH, &body, None).await?;

        let session = Session {
            user_id: v
                .pointer("/startup_data/user/user_id")
                .and_then(records::id_string),
            access_token: str_field(&v, "access_token"),
            refresh_token: str_field(&v, "refresh_token"),
        };
        if !session.is_authenticated() {
            return Err(Error::Auth("login response carried no access token".to_string()));
        }

        self.sessions.save(&session)?;
        info!(user_id = ?session.user_id, "logged in");
        Ok(session)
    }

    pub async fn refresh_token(&self, session: &Session) -> Result<Session> {
        let refresh = session
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::Auth("no refresh token stored".to_string()))?;

        let v = self
            .post_json(REFRESH_PATH, &json!({ "refresh_token": refresh }), None)
            .await?;
        let access = str_field(&v, "access_token")
            .ok_or_else(|| Error::Auth("refresh response carried no access token".to_string()))?;
        let new_refresh = str_field(&v, "refresh_token");

        self.sessions.update_tokens(&access, new_refresh.as_deref())?;
        debug!("access token refreshed");
        Ok(self.sessions.load())
    }

    /// Raw favorites listing for the current session.
    pub async fn list_favorite_businesses(&self) -> Result<Vec<Value>> {
        let session = self.sessions.load();
        let token = session
            .access_token
            .as_deref()
            .ok_or_else(|| Error::Auth("not logged in".to_string()))?;

        let body = json!({
            "favorites_only": true,
            "origin": {
                "latitude": self.origin.latitude,
                "longitude": self.origin.longitude,
            },
            "radius": self.origin.radius_km,
            "user_id": session.user_id,
        });
        let v = self.post_json(ITEMS_PATH, &body, Some(token)).await?;

        match v.get("items") {
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(Error::External(format!(
                "favorites listing: `items` is not a list: {other}"
            ))),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"));

        if let Some(Value::Object(extra)) = self.store.get(HEADERS_KEY) {
            for (name, value) in extra {
                let Some(value) = value.as_str() else {
                    warn!(header = %name, "ignoring non-string header value");
                    continue;
                };
                match (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    (Ok(n), Ok(v)) => {
                        headers.insert(n, v);
                    }
                    _ => warn!(header = %name, "ignoring invalid header"),
                }
            }
        }
        headers
    }

    async fn post_json(&self, path: &str, body: &Value, bearer: Option<&str>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.post(&url).headers(self.headers()).json(body);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::External(format!("tgtg request error ({path}): {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let detail = format!(
                "{path}: {status} {}",
                body.chars().take(200).collect::<String>()
            );
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(detail),
                _ => Error::External(detail),
            });
        }

        resp.json()
            .await
            .map_err(|e| Error::External(format!("tgtg json error ({path}): {e}")))
    }
}

#[async_trait]
impl SnapshotSource for TgtgClient {
    async fn fetch_favorites(&self) -> Result<Vec<StoreAvailability>> {
        if !self.sessions.load().is_authenticated() {
            self.login().await?;
        }

        let raw = match self.list_favorite_businesses().await {
            Err(Error::Auth(reason)) => {
                debug!(%reason, "listing rejected, re-authenticating once");
                self.login().await?;
                self.list_favorite_businesses().await?
            }
            other => other?,
        };

        Ok(map_records(raw))
    }
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
