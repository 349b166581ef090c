//! # Configuration System
//!
//! Configuration for the scene core, the resource caches, and the engine
//! facade that bundles them.
//!
//! ## Design Goals
//!
//! - **Serializable**: Load and save as TOML or RON, picked by file extension
//! - **Defaulted**: Every field has a sensible default, so partial files work

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// # Scene Configuration
///
/// Behaviour of the per-frame scene update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Number of node slots reserved up front
    pub initial_node_capacity: usize,
    /// Refresh every dirty world matrix top-down before components update
    pub proactive_transform_refresh: bool,
    /// Remove terminated nodes from the arena at the end of every update
    pub purge_terminated_each_update: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            initial_node_capacity: 256,
            proactive_transform_refresh: true,
            purge_terminated_each_update: true,
        }
    }
}

impl Config for SceneConfig {}

/// # Resource Configuration
///
/// Diagnostics for the per-kind resource caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Log every eviction at `debug` level
    pub log_evictions: bool,
    /// Warn about every entry still held when outstanding handles are reported
    pub warn_on_leaked_entries: bool,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            log_evictions: true,
            warn_on_leaked_entries: true,
        }
    }
}

impl Config for ResourceConfig {}

/// # Engine Configuration
///
/// Top-level configuration consumed by [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default `env_logger` filter when `RUST_LOG` is unset
    pub log_filter: String,
    /// Scene update settings
    pub scene: SceneConfig,
    /// Resource cache settings
    pub resources: ResourceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            scene: SceneConfig::default(),
            resources: ResourceConfig::default(),
        }
    }
}

impl Config for EngineConfig {}
