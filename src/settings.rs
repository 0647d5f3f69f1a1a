use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::SETTINGS_KEY;
use crate::types::Direction;

const DEFAULT_VOLUME: f64 = 0.5;

/// User preferences, persisted across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub notifications: bool,
    pub sound: bool,
    /// Bell volume in `0.0..=1.0`.
    pub volume: f64,
    pub direction: Direction,
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notifications: false,
            sound: false,
            volume: DEFAULT_VOLUME,
            direction: Direction::All,
            api_key: String::new(),
        }
    }
}

impl Settings {
    /// Parse a persisted document and overlay it on the defaults.
    ///
    /// Fields that are missing or have the wrong type keep their default. A
    /// document that is not a JSON object yields the defaults.
    pub fn merge_json(raw: &str) -> Self {
        let mut settings = Self::default();
        let obj = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(obj)) => obj,
            Ok(_) => {
                warn!("Persisted settings are not a JSON object, using defaults");
                return settings;
            }
            Err(e) => {
                warn!("Failed to parse persisted settings: {e}, using defaults");
                return settings;
            }
        };

        merge_field(&obj, "notifications", &mut settings.notifications);
        merge_field(&obj, "sound", &mut settings.sound);
        merge_field(&obj, "volume", &mut settings.volume);
        merge_field(&obj, "direction", &mut settings.direction);
        merge_field(&obj, "apiKey", &mut settings.api_key);

        settings.set_volume(settings.volume);
        let key = std::mem::take(&mut settings.api_key);
        settings.set_api_key(&key);
        settings
    }

    /// Store a trimmed key. Returns whether the stored key changed.
    pub fn set_api_key(&mut self, raw: &str) -> bool {
        let key = raw.trim();
        if key == self.api_key {
            return false;
        }
        self.api_key = key.to_string();
        true
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Clamp into `0.0..=1.0`; non-finite values fall back to the default.
    pub fn set_volume(&mut self, volume: f64) {
        self.volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            DEFAULT_VOLUME
        };
    }

    /// Volume as the whole percentage shown next to the slider.
    pub fn volume_percent(&self) -> u32 {
        (self.volume * 100.0).round() as u32
    }
}

fn merge_field<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str, slot: &mut T) {
    let Some(value) = obj.get(key) else {
        return;
    };
    match serde_json::from_value(value.clone()) {
        Ok(v) => *slot = v,
        Err(e) => warn!("Ignoring persisted setting {key:?}: {e}"),
    }
}

/// Minimal string key-value storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
}

/// Volatile store, used by tests and `--ephemeral` runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a single JSON object file mapping keys to strings.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/kynetic/storage.json`, or `./storage.json` when the
    /// platform has no config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("kynetic"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("storage.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        let mut entries = self.read_all().unwrap_or_else(|e| {
            warn!("Discarding unreadable storage file: {e:#}");
            BTreeMap::new()
        });
        entries.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let contents =
            serde_json::to_string_pretty(&entries).context("failed to serialize storage")?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// Loads and saves [`Settings`] under [`SETTINGS_KEY`].
pub struct SettingsStore<S> {
    store: S,
}

impl<S: KeyValueStore> SettingsStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Persisted settings merged over the defaults.
    pub fn load(&self) -> Result<Settings> {
        match self.store.get(SETTINGS_KEY)? {
            Some(raw) => Ok(Settings::merge_json(&raw)),
            None => {
                debug!("No persisted settings, using defaults");
                Ok(Settings::default())
            }
        }
    }

    /// Persist the full settings object.
    pub fn save(&mut self, settings: &Settings) -> Result<()> {
        let raw = serde_json::to_string(settings).context("failed to serialize settings")?;
        self.store.set(SETTINGS_KEY, raw)
    }
}
