//! `memobot.json5` model, layered loading and environment overrides.

mod error;
mod loader;
mod model;

pub use error::ConfigError;
pub use loader::{
    ConfigLayer, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, LayeredConfig,
    LayeredConfigOptions,
};
pub use model::*;
