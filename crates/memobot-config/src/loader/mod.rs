//! Loading `memobot.json5` files, alone or as a stack of layers.

mod layers;
mod overlay;
mod schema;


use crate::{ConfigError, MemobotConfig};
use log::{debug, info};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// File name looked up in the cwd and in [`DEFAULT_CONFIG_DIR`].
pub const DEFAULT_CONFIG_FILE: &str = "memobot.json5";
/// Per-user directory under the home directory.
pub const DEFAULT_CONFIG_DIR: &str = ".memobot";

/// Result of a layered load.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub config: MemobotConfig,
    /// Layers that were read, lowest precedence first.
    pub layers: Vec<ConfigLayer>,
}

/// Where a layer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// `~/.memobot/memobot.json5`
    User,
    /// `./memobot.json5`
    Cwd,
    /// Paths passed explicitly, e.g. `--config`.
    Runtime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: PathBuf,
}

/// Inputs to [`MemobotConfig::load_layered_with_options`].
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    pub cwd: PathBuf,
    /// `None` skips the user layer.
    pub user_config_path: Option<PathBuf>,
    /// Applied last, in order.
    pub runtime_paths: Vec<PathBuf>,
}

impl LayeredConfigOptions {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            user_config_path: layers::default_user_config_path(),
            runtime_paths: Vec::new(),
        }
    }

    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl MemobotConfig {
    /// Parse one file with no layering.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading config (path={})", path.display());
        Self::load_from_str(&std::fs::read_to_string(path)?)
    }

    /// Parse JSON5 text with no layering.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        let value: Value = json5::from_str(contents)?;
        schema::validate_layer_schema(&value, "config")?;
        decode(value)
    }

    /// Layered load with the default user file location.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Merge user, cwd and runtime layers, later layers winning. Absent
    /// user and cwd files are skipped; an absent runtime file is an error.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let files = layers::discover(
            &options.cwd,
            options.user_config_path.as_deref(),
            &options.runtime_paths,
        )?;
        let mut merged = Value::Object(serde_json::Map::new());
        for file in &files {
            overlay::overlay(&mut merged, &file.value);
        }
        let config = decode(merged)?;
        let layers: Vec<ConfigLayer> = files.into_iter().map(|file| file.meta).collect();
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Cross-field checks serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let streaming = &self.streaming;
        let problem = if streaming.tick_interval_ms == 0 {
            Some("streaming.tick_interval_ms must be greater than zero")
        } else if streaming.deadline_ms < streaming.tick_interval_ms {
            Some("streaming.deadline_ms must be at least streaming.tick_interval_ms")
        } else if self.memory.recall_k == 0 {
            Some("memory.recall_k must be at least 1")
        } else if self.conversation.placeholder.trim().is_empty() {
            Some("conversation.placeholder must not be empty")
        } else {
            None
        };
        match problem {
            Some(message) => Err(ConfigError::Invalid(message.to_string())),
            None => Ok(()),
        }
    }
}

fn decode(value: Value) -> Result<MemobotConfig, ConfigError> {
    let config: MemobotConfig = serde_json::from_value(value)?;
    config.validate()?;
    debug!("config decoded (model={})", config.provider.model);
    Ok(config)
}
