// SPDX-License-Identifier: MIT
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// gzip level used when writing containers (0-9)
    pub compression_level: u32,
    /// Length of generated storage names
    pub name_length: usize,
    /// Where the CLI stores packed uploads when no output path is given
    pub storage_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            compression_level: std::env::var("UPLOAD_CONTAINER_COMPRESSION_LEVEL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(6),
            name_length: std::env::var("UPLOAD_CONTAINER_NAME_LENGTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(9),
            storage_dir: std::env::var("UPLOAD_CONTAINER_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.compression_level > 9 {
            return Err("UPLOAD_CONTAINER_COMPRESSION_LEVEL must be between 0 and 9".to_string());
        }

        if self.name_length == 0 || self.name_length > 64 {
            return Err("UPLOAD_CONTAINER_NAME_LENGTH must be between 1 and 64".to_string());
        }

        if self.storage_dir.as_os_str().is_empty() {
            return Err("UPLOAD_CONTAINER_STORAGE_DIR cannot be empty".to_string());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compression_level: 6,
            name_length: 9,
            storage_dir: PathBuf::from("./data"),
        }
    }
}
