//! Settings file migration

use std::path::{Path, PathBuf};

use thiserror::Error;
use toml::Table;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("Settings file '{0}' does not exist")]
    NotFound(PathBuf),

    #[error("'{0}' is not a file")]
    NotAFile(PathBuf),

    #[error("Failed to parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write migrated settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Rules(#[from] roller_rules::RuleError),
}

/// Migrate `message.cond_messages` in the file at `path` in place
///
/// Returns `false` (and leaves the file untouched) when there is nothing to
/// migrate.
pub fn migrate_settings_file(path: &Path) -> Result<bool, MigrateError> {
    if !path.exists() {
        return Err(MigrateError::NotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(MigrateError::NotAFile(path.to_path_buf()));
    }

    let source = std::fs::read_to_string(path)?;
    let document: Table = toml::from_str(&source).map_err(|e| MigrateError::Parse {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;

    let (document, changed) = roller_rules::migrate_settings(document)?;
    if !changed {
        debug!("No legacy rules in {}", path.display());
        return Ok(false);
    }

    std::fs::write(path, toml::to_string(&document)?)?;
    Ok(true)
}
