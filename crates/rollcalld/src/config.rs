use std::path::PathBuf;

use rollcall_core::AccuracyMode;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Maximum Euclidean distance for a positive match. Smaller is stricter.
    pub tolerance: f32,
    /// Minimum usable embeddings required per enrollment.
    pub min_samples: usize,
    /// Extractor effort for recognition captures.
    pub accuracy_mode: AccuracyMode,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let db_path = std::env::var("ROLLCALL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("rollcall.db"));

        Self {
            db_path,
            tolerance: env_f32("ROLLCALL_TOLERANCE", rollcall_core::DEFAULT_TOLERANCE),
            min_samples: env_usize("ROLLCALL_MIN_SAMPLES", rollcall_core::DEFAULT_MIN_SAMPLES),
            accuracy_mode: std::env::var("ROLLCALL_ACCURACY_MODE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
