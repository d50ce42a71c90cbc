use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::MAX_AUTO_BACKUPS;

use super::BackupError;

const BACKUP_EXTENSION: &str = ".enc";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Whether a backup was taken on app start or on user request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupOrigin {
    Auto,
    Manual,
}

impl BackupOrigin {
    pub fn prefix(&self) -> &'static str {
        match self {
            BackupOrigin::Auto => "auto_backup_",
            BackupOrigin::Manual => "manual_backup_",
        }
    }

    fn from_file_name(name: &str) -> Option<Self> {
        [BackupOrigin::Auto, BackupOrigin::Manual]
            .into_iter()
            .find(|origin| name.starts_with(origin.prefix()))
    }
}

/// A backup file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFile {
    pub name: String,
    pub path: PathBuf,
    pub origin: Option<BackupOrigin>,
    /// Local time encoded in the file name.
    pub created_at: Option<NaiveDateTime>,
    pub size_bytes: u64,
}

/// `auto_backup_20240501_083000.enc` style name for a backup taken at `at`.
pub fn backup_file_name(origin: BackupOrigin, at: NaiveDateTime) -> String {
    format!("{}{}{}", origin.prefix(), at.format(TIMESTAMP_FORMAT), BACKUP_EXTENSION)
}

fn parse_file_timestamp(name: &str, origin: BackupOrigin) -> Option<NaiveDateTime> {
    let stamp = name
        .strip_prefix(origin.prefix())?
        .strip_suffix(BACKUP_EXTENSION)?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

fn validate_name(name: &str) -> Result<(), BackupError> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains("..");
    if bad {
        return Err(BackupError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

/// Directory holding encrypted backup files.
#[derive(Debug, Clone)]
pub struct BackupDirectory {
    root: PathBuf,
}

impl BackupDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Backup files, sorted by name descending (newest first within each
    /// origin). A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<BackupFile>, BackupError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.ends_with(BACKUP_EXTENSION) {
                continue;
            }
            let origin = BackupOrigin::from_file_name(&name);
            let created_at = origin.and_then(|o| parse_file_timestamp(&name, o));
            files.push(BackupFile {
                path: entry.path(),
                name,
                origin,
                created_at,
                size_bytes: meta.len(),
            });
        }
        files.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(files)
    }

    /// Write a new backup file. After an automatic backup, older automatic
    /// backups beyond the retention limit are removed.
    pub fn create(
        &self,
        blob: &[u8],
        origin: BackupOrigin,
        at: NaiveDateTime,
    ) -> Result<BackupFile, BackupError> {
        std::fs::create_dir_all(&self.root)?;
        let name = backup_file_name(origin, at);
        let path = self.root.join(&name);
        std::fs::write(&path, blob)?;

        tracing::info!(
            file = %name,
            size_bytes = blob.len(),
            origin = ?origin,
            "Backup written"
        );

        if origin == BackupOrigin::Auto {
            if let Err(e) = self.cleanup_auto_backups() {
                tracing::warn!(error = %e, "Auto backup cleanup failed");
            }
        }

        Ok(BackupFile {
            name,
            path,
            origin: Some(origin),
            created_at: Some(at),
            size_bytes: blob.len() as u64,
        })
    }

    /// Keep the newest `MAX_AUTO_BACKUPS` automatic backups, delete the rest.
    /// Returns the number of files removed.
    pub fn cleanup_auto_backups(&self) -> Result<usize, BackupError> {
        let stale: Vec<BackupFile> = self
            .list()?
            .into_iter()
            .filter(|f| f.origin == Some(BackupOrigin::Auto))
            .skip(MAX_AUTO_BACKUPS)
            .collect();

        for file in &stale {
            std::fs::remove_file(&file.path)?;
        }
        if !stale.is_empty() {
            tracing::info!(removed = stale.len(), "Old auto backups removed");
        }
        Ok(stale.len())
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>, BackupError> {
        validate_name(name)?;
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(BackupError::NotFound(name.to_string()));
        }
        Ok(std::fs::read(path)?)
    }

    pub fn delete(&self, name: &str) -> Result<(), BackupError> {
        validate_name(name)?;
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(BackupError::NotFound(name.to_string()));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }
}
