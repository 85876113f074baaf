//! Configuration management for the descriptor layer

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use crate::dnn::ffi::AlgorithmPreference;
use crate::error::{DnnError, DnnResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    /// Policy handed to the library when a workspace picks its algorithm.
    pub preference: AlgorithmPreference,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Workspaces larger than this fail with `ResourceExhausted` instead of allocating.
    pub max_workspace_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub device_id: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevelopmentConfig {
    /// Log handle create/destroy at `DEBUG` once [`crate::init`] runs.
    pub verbose_logging: bool,
}

impl DevelopmentConfig {
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose_logging {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnnConfig {
    pub algorithm: AlgorithmConfig,
    pub memory: MemoryConfig,
    pub device: DeviceConfig,
    pub development: DevelopmentConfig,
}

/// Configuration manager backed by an optional JSON file
pub struct ConfigManager {
    config: Arc<RwLock<DnnConfig>>,
    config_file: Option<PathBuf>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(DnnConfig::default())),
            config_file: None,
        }
    }

    pub fn with_config_file(mut self, path: PathBuf) -> Self {
        self.config_file = Some(path);
        self
    }

    pub fn load_from_file(&mut self, path: &Path) -> DnnResult<()> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DnnError::Io(format!("Failed to read config file {:?}: {}", path, e)))?;

        let config: DnnConfig = serde_json::from_str(&content)
            .map_err(|e| DnnError::Serialization(format!("Failed to parse config file {:?}: {}", path, e)))?;

        *self.config.write() = config;
        self.config_file = Some(path.to_path_buf());

        tracing::info!("Configuration loaded from {:?}", path);
        Ok(())
    }

    pub fn save_to_file(&self, path: &Path) -> DnnResult<()> {
        let content = serde_json::to_string_pretty(&*self.config.read())?;
        std::fs::write(path, content)?;

        tracing::info!("Configuration saved to {:?}", path);
        Ok(())
    }

    pub fn get_config(&self) -> DnnConfig {
        self.config.read().clone()
    }

    pub fn update_config<F>(&mut self, f: F) -> DnnResult<()>
    where
        F: FnOnce(&mut DnnConfig),
    {
        f(&mut *self.config.write());

        // Save to file if configured
        if let Some(ref path) = self.config_file {
            self.save_to_file(path)?;
        }

        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    static ref CONFIG_MANAGER: RwLock<ConfigManager> = RwLock::new(ConfigManager::new());
}

/// Snapshot of the global configuration
pub fn get_config() -> DnnConfig {
    CONFIG_MANAGER.read().get_config()
}

/// Update the global configuration
pub fn update_config<F>(f: F) -> DnnResult<()>
where
    F: FnOnce(&mut DnnConfig),
{
    CONFIG_MANAGER.write().update_config(f)
}

/// Load the global configuration from a JSON file
pub fn load_config_from_file(path: &Path) -> DnnResult<()> {
    CONFIG_MANAGER.write().load_from_file(path)
}

pub struct ConfigBuilder {
    config: DnnConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: DnnConfig::default(),
        }
    }

    pub fn algorithm(mut self, f: impl FnOnce(&mut AlgorithmConfig)) -> Self {
        f(&mut self.config.algorithm);
        self
    }

    pub fn memory(mut self, f: impl FnOnce(&mut MemoryConfig)) -> Self {
        f(&mut self.config.memory);
        self
    }

    pub fn device(mut self, f: impl FnOnce(&mut DeviceConfig)) -> Self {
        f(&mut self.config.device);
        self
    }

    pub fn development(mut self, f: impl FnOnce(&mut DevelopmentConfig)) -> Self {
        f(&mut self.config.development);
        self
    }

    pub fn build(self) -> DnnConfig {
        self.config
    }

    pub fn apply(self) -> DnnResult<()> {
        update_config(|config| *config = self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .algorithm(|a| a.preference = AlgorithmPreference::WorkspaceLimit(1 << 20))
            .memory(|m| m.max_workspace_bytes = Some(64 << 20))
            .device(|d| d.device_id = 1)
            .build();

        assert_eq!(config.algorithm.preference, AlgorithmPreference::WorkspaceLimit(1 << 20));
        assert_eq!(config.memory.max_workspace_bytes, Some(64 << 20));
        assert_eq!(config.device.device_id, 1);
        assert!(!config.development.verbose_logging);
        assert_eq!(config.development.log_level(), tracing::Level::INFO);

        let verbose = ConfigBuilder::new().development(|d| d.verbose_logging = true).build();
        assert_eq!(verbose.development.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_config_manager() {
        let mut manager = ConfigManager::new();
        assert_eq!(manager.get_config().algorithm.preference, AlgorithmPreference::Fastest);

        manager.update_config(|c| {
            c.algorithm.preference = AlgorithmPreference::NoWorkspace;
        }).unwrap();

        assert_eq!(manager.get_config().algorithm.preference, AlgorithmPreference::NoWorkspace);
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("dnn_config.json");

        let mut writer = ConfigManager::new().with_config_file(config_path.clone());
        writer.update_config(|c| {
            c.algorithm.preference = AlgorithmPreference::Exhaustive;
            c.memory.max_workspace_bytes = Some(4096);
        }).unwrap();

        let mut manager = ConfigManager::new();
        manager.load_from_file(&config_path).unwrap();

        let loaded = manager.get_config();
        assert_eq!(loaded.algorithm.preference, AlgorithmPreference::Exhaustive);
        assert_eq!(loaded.memory.max_workspace_bytes, Some(4096));
    }

    #[test]
    fn test_config_file_errors() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("missing.json");
        let mut manager = ConfigManager::new();
        assert!(matches!(manager.load_from_file(&missing), Err(DnnError::Io(_))));

        let garbage = temp_dir.path().join("garbage.json");
        std::fs::write(&garbage, "{ not json").unwrap();
        assert!(matches!(manager.load_from_file(&garbage), Err(DnnError::Serialization(_))));
    }
}
