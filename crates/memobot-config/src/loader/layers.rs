//! Discovering and reading config layer files.

use super::{ConfigLayer, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, schema};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Parsed, schema-checked layer waiting to be merged.
#[derive(Debug, Clone)]
pub(super) struct LayerFile {
    pub(super) meta: ConfigLayer,
    pub(super) value: Value,
}

impl ConfigLayerSource {
    /// Label used as the prefix of schema error paths, e.g. `cwd(/work/memobot.json5)`.
    fn label(self, path: &Path) -> String {
        let name = match self {
            ConfigLayerSource::User => "user",
            ConfigLayerSource::Cwd => "cwd",
            ConfigLayerSource::Runtime => "runtime",
        };
        format!("{name}({})", path.display())
    }
}

/// `~/.memobot/memobot.json5`, when a home directory is known.
pub(super) fn default_user_config_path() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    Some(
        dirs.home_dir()
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
    )
}

/// Collect layers lowest precedence first. The user and cwd files are
/// optional and read once even when both resolve to the same file; every
/// runtime path must exist.
pub(super) fn discover(
    cwd: &Path,
    user_config: Option<&Path>,
    runtime: &[PathBuf],
) -> Result<Vec<LayerFile>, ConfigError> {
    let cwd = match cwd.canonicalize() {
        Ok(path) => path,
        Err(err) if err.kind() == ErrorKind::NotFound => cwd.to_path_buf(),
        Err(err) => return Err(err.into()),
    };
    let cwd_config = cwd.join(DEFAULT_CONFIG_FILE);
    let candidates = [
        (ConfigLayerSource::User, user_config),
        (ConfigLayerSource::Cwd, Some(cwd_config.as_path())),
    ];

    let mut seen = HashSet::new();
    let mut layers = Vec::new();
    for (source, path) in candidates {
        let Some(path) = path else {
            continue;
        };
        if !path.exists() {
            debug!("config layer absent (source={:?}, path={})", source, path.display());
            continue;
        }
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !seen.insert(key) {
            debug!("config layer already read (source={:?}, path={})", source, path.display());
            continue;
        }
        layers.push(read_layer(source, path)?);
    }
    for path in runtime {
        layers.push(read_layer(ConfigLayerSource::Runtime, path)?);
    }
    Ok(layers)
}

fn read_layer(source: ConfigLayerSource, path: &Path) -> Result<LayerFile, ConfigError> {
    debug!("reading config layer (source={:?}, path={})", source, path.display());
    let value: Value = json5::from_str(&std::fs::read_to_string(path)?)?;
    schema::validate_layer_schema(&value, &source.label(path))?;
    Ok(LayerFile {
        meta: ConfigLayer {
            source,
            path: path.to_path_buf(),
        },
        value,
    })
}
