use std::fmt;
use std::path::PathBuf;

use crate::crypto::PBKDF2_ITERATIONS;

/// Application-level constants
pub const APP_NAME: &str = "Medvault";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Automatic backups kept after each new automatic backup.
pub const MAX_AUTO_BACKUPS: usize = 30;

/// Get the application data directory.
///
/// Platform data dir (e.g. `~/.local/share/Medvault`), falling back to the
/// current directory when the platform reports none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the database file path
pub fn database_path() -> PathBuf {
    app_data_dir().join("database").join("medvault.db")
}

/// Get the backup directory
pub fn backup_dir() -> PathBuf {
    app_data_dir().join("MedicalBackups")
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medvault=info"
}

/// Backup configuration handed to the backup codec at call time.
///
/// Loaded from the settings table by `db::load_backup_settings`; the codec
/// itself never reads stored state.
#[derive(Clone, PartialEq, Eq)]
pub struct BackupSettings {
    pub passphrase: Option<String>,
    pub auto_backup: bool,
    /// PBKDF2 rounds used for new backups. Restores read the count stored
    /// in the file.
    pub kdf_iterations: u32,
}

impl BackupSettings {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: Some(passphrase.into()),
            ..Self::default()
        }
    }

    /// The passphrase, treating an empty string as unset.
    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref().filter(|p| !p.is_empty())
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            passphrase: None,
            auto_backup: false,
            kdf_iterations: PBKDF2_ITERATIONS,
        }
    }
}

impl fmt::Debug for BackupSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupSettings")
            .field("passphrase", &self.passphrase().map(|_| "<redacted>"))
            .field("auto_backup", &self.auto_backup)
            .field("kdf_iterations", &self.kdf_iterations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_under_app_data() {
        let app = app_data_dir();
        assert!(app.ends_with(APP_NAME));
        assert!(database_path().starts_with(&app));
        assert!(backup_dir().starts_with(&app));
        assert!(backup_dir().ends_with("MedicalBackups"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn empty_passphrase_counts_as_unset() {
        let settings = BackupSettings::new("");
        assert!(settings.passphrase().is_none());
        assert_eq!(BackupSettings::new("x").passphrase(), Some("x"));
    }

    #[test]
    fn debug_redacts_passphrase() {
        let settings = BackupSettings::new("hunter2");
        let printed = format!("{settings:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("redacted"));
    }
}
