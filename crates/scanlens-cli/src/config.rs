use std::path::PathBuf;

/// CLI configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite database of saved results.
    pub db_path: PathBuf,
    /// Path to the preferences TOML file.
    pub prefs_path: PathBuf,
    /// Inference requests that may queue before live frames are dropped.
    pub engine_queue: usize,
}

impl Config {
    /// Load configuration from `SCANLENS_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("scanlens");

        Self {
            db_path: var("SCANLENS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("results.db")),
            prefs_path: var("SCANLENS_PREFS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("preferences.toml")),
            engine_queue: var("SCANLENS_ENGINE_QUEUE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(scanlens_screen::engine::DEFAULT_QUEUE_DEPTH),
        }
    }
}
