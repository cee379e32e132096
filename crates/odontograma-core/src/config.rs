//! Clinic runtime configuration.
//!
//! Resolved once at process startup and passed into [`crate::ClinicCore`]. The core never
//! reads environment variables itself; the shell (CLI or mobile app) decides where values
//! come from.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("database path cannot be empty")]
    EmptyDatabasePath,

    #[error("database directory does not exist: {0}")]
    MissingDirectory(PathBuf),
}

/// Where the document store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// SQLite file on disk, created if missing
    File(PathBuf),
    /// Private in-memory database, discarded on drop
    InMemory,
}

/// Core configuration resolved at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicConfig {
    storage: StorageLocation,
    validate_on_save: bool,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ClinicConfig {
    /// Configuration backed by a database file.
    ///
    /// The parent directory must already exist; the file itself is created on open.
    pub fn with_database_path(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(ConfigError::MissingDirectory(parent.to_path_buf()));
            }
        }

        Ok(Self {
            storage: StorageLocation::File(path),
            validate_on_save: true,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            storage: StorageLocation::InMemory,
            validate_on_save: true,
        }
    }

    /// Check tooth numbers against the chart's dentition before every save.
    pub fn validate_on_save(mut self, enabled: bool) -> Self {
        self.validate_on_save = enabled;
        self
    }

    pub fn storage(&self) -> &StorageLocation {
        &self.storage
    }

    pub fn database_path(&self) -> Option<&Path> {
        match &self.storage {
            StorageLocation::File(path) => Some(path),
            StorageLocation::InMemory => None,
        }
    }

    pub fn validates_on_save(&self) -> bool {
        self.validate_on_save
    }
}
