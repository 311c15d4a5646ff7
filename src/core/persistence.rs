//! Hardware configuration persistence
//!
//! The coordinator keeps the authoritative copy in memory and writes it back
//! through a [`ConfigStore`] after every change. The JSON layout uses the
//! field names `SerialPortName` and `CheckedPlaces` so files written by the
//! previous desktop tool keep loading.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::Arc};

use crate::protocol::modbus::{Place, PLACE_COUNT};

pub const DEFAULT_PORT_NAME: &str = "COM1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareConfig {
    #[serde(rename = "SerialPortName")]
    pub port_name: String,
    #[serde(rename = "CheckedPlaces")]
    pub enabled_places: [bool; PLACE_COUNT],
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            port_name: DEFAULT_PORT_NAME.to_string(),
            enabled_places: [false; PLACE_COUNT],
        }
    }
}

impl HardwareConfig {
    pub fn is_enabled(&self, place: Place) -> bool {
        self.enabled_places[place.index()]
    }

    /// Returns `true` when the flag actually changed.
    pub fn set_enabled(&mut self, place: Place, enabled: bool) -> bool {
        let slot = &mut self.enabled_places[place.index()];
        if *slot == enabled {
            return false;
        }
        *slot = enabled;
        true
    }

    pub fn any_enabled(&self) -> bool {
        self.enabled_places.iter().any(|enabled| *enabled)
    }
}

pub trait ConfigStore: Send {
    fn load(&self) -> Result<HardwareConfig>;
    fn save(&self, config: &HardwareConfig) -> Result<()>;
}

/// Stores the configuration as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<HardwareConfig> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read hardware config {:?}", self.path))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse hardware config {:?}", self.path))?;
        log::debug!("Loaded hardware config from {:?}", self.path);
        Ok(config)
    }

    fn save(&self, config: &HardwareConfig) -> Result<()> {
        let json =
            serde_json::to_string_pretty(config).context("Failed to serialize hardware config")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write hardware config to {:?}", self.path))?;
        log::debug!("Saved hardware config to {:?}", self.path);
        Ok(())
    }
}

/// In-memory store. Clones share the same slot, which lets a test "restart"
/// a coordinator against what the previous one saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<HardwareConfig>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HardwareConfig) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(config))),
        }
    }

    pub fn snapshot(&self) -> Option<HardwareConfig> {
        self.slot.lock().clone()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<HardwareConfig> {
        self.slot
            .lock()
            .clone()
            .context("No hardware config has been saved yet")
    }

    fn save(&self, config: &HardwareConfig) -> Result<()> {
        *self.slot.lock() = Some(config.clone());
        Ok(())
    }
}

/// Load the configuration, falling back to (and persisting) the default when
/// the store has nothing usable.
pub fn load_or_default(store: &dyn ConfigStore) -> HardwareConfig {
    match store.load() {
        Ok(config) => config,
        Err(err) => {
            log::warn!("Hardware config unavailable, using defaults: {err:#}");
            let config = HardwareConfig::default();
            if let Err(err) = store.save(&config) {
                log::warn!("Failed to persist default hardware config: {err:#}");
            }
            config
        }
    }
}
