use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Overrides the platform data directory, e.g. for a throwaway database.
pub const DATA_DIR_ENV: &str = "NEXTDISH_DATA_DIR";

const DB_FILE: &str = "nextdish.db";

pub struct Config {
    pub db_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => ProjectDirs::from("", "", "nextdish")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        Self::in_dir(data_dir)
    }

    pub fn in_dir(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Config {
            db_path: data_dir.join(DB_FILE),
        })
    }
}
