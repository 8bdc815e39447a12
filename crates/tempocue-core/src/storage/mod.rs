mod config;
pub mod snapshots;

pub use config::{BreathingConfig, Config, DefaultsConfig, ExecutorConfig, StorageConfig};
pub use snapshots::{MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore};

use std::path::PathBuf;

/// Returns `~/.config/tempocue[-dev]/` based on TEMPOCUE_ENV.
///
/// Set TEMPOCUE_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TEMPOCUE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("tempocue-dev")
    } else {
        base_dir.join("tempocue")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
