//! Public surface for memobot.
//!
//! Re-exports the building blocks and the small helpers the binary uses to
//! wire them together.

pub use memobot_config as config;
pub use memobot_core as core;
pub use memobot_memory as memory;
pub use memobot_protocol as protocol;
pub use memobot_telegram as telegram;

use directories::UserDirs;
use memobot_config::{DEFAULT_CONFIG_DIR, MemobotConfig};
use std::path::{Path, PathBuf};

/// Subdirectory of the config directory holding per-identity stores.
pub const MEMORY_DIR: &str = "memory";

/// Initialize `env_logger` with millisecond timestamps and `RUST_LOG`.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();
}

/// Memory root: explicit directory, then `memory.path`, then
/// `~/.memobot/memory`, then `.memobot/memory` relative to the cwd.
pub fn memory_root(data_dir: Option<&Path>, config: &MemobotConfig) -> PathBuf {
    if let Some(dir) = data_dir {
        return dir.to_path_buf();
    }
    if let Some(path) = config.memory.path.as_deref().filter(|path| !path.trim().is_empty()) {
        return PathBuf::from(path);
    }
    UserDirs::new()
        .map(|dirs| dirs.home_dir().join(DEFAULT_CONFIG_DIR).join(MEMORY_DIR))
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_DIR).join(MEMORY_DIR))
}
