/// Config persistence service.
/// Saves and loads the device config (playlists + refresh info) to/from disk.
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::error::PersistenceError;

/// Durable storage for the device config
pub trait ConfigStore: Send + Sync {
    fn read_config(&self) -> Result<DeviceConfig, PersistenceError>;

    fn write_config(&self, config: &DeviceConfig) -> Result<(), PersistenceError>;
}

/// JSON file on disk, replaced atomically on every write
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config, or write and return defaults when the file is missing
    pub fn load_or_bootstrap(&self) -> Result<DeviceConfig, PersistenceError> {
        if self.path.exists() {
            let config = self.read_config()?;
            info!("Loaded device config from {}", self.path.display());
            return Ok(config);
        }

        warn!("No config at {}, bootstrapping defaults", self.path.display());
        let config = DeviceConfig::default();
        self.write_config(&config)?;
        Ok(config)
    }
}

impl ConfigStore for JsonConfigStore {
    fn read_config(&self) -> Result<DeviceConfig, PersistenceError> {
        debug!("Reading device config from {}", self.path.display());
        let json = std::fs::read_to_string(&self.path).map_err(|source| PersistenceError::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| PersistenceError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write_config(&self, config: &DeviceConfig) -> Result<(), PersistenceError> {
        debug!("Writing device config to {}", self.path.display());
        let json = serde_json::to_string_pretty(config).map_err(PersistenceError::Serialize)?;

        let write_err = |source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        // Write next to the target then rename, so a crash never leaves half a file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}
