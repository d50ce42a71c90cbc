//! Encrypted backups of the record store.
//!
//! A backup is a passphrase-encrypted snapshot of all records and
//! attachments, written to a directory as one file per backup. Automatic
//! backups taken on app start are capped in number; manual ones are kept
//! until the user deletes them.

pub mod codec;
pub mod files;
pub mod restore;

pub use codec::*;
pub use files::*;
pub use restore::*;

use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use rusqlite::Connection;
use thiserror::Error;

use crate::config::BackupSettings;
use crate::crypto::CryptoError;
use crate::db::{self, DatabaseError};

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("No backup passphrase configured")]
    MissingPassphrase,

    #[error("Wrong password or corrupted backup file")]
    WrongPasswordOrCorrupted,

    #[error("Unsupported backup version: {0}")]
    UnsupportedVersion(u32),

    #[error("Invalid backup file name: {0}")]
    InvalidFileName(String),

    #[error("Backup file not found: {0}")]
    NotFound(String),
}

/// Export, encrypt and write a backup on user request.
pub fn create_manual_backup(
    conn: &Connection,
    dir: &BackupDirectory,
    settings: &BackupSettings,
    at: NaiveDateTime,
) -> Result<BackupFile, BackupError> {
    if settings.passphrase().is_none() {
        return Err(BackupError::MissingPassphrase);
    }
    let payload = export_payload(conn)?;
    let blob = encrypt_payload(&payload, settings)?;
    dir.create(&blob, BackupOrigin::Manual, at)
}

/// Take an automatic backup if auto-backup is enabled with a passphrase and
/// the store has at least one record. Returns `None` when skipped.
pub fn run_auto_backup(
    conn: &Connection,
    dir: &BackupDirectory,
    settings: &BackupSettings,
    at: NaiveDateTime,
) -> Result<Option<BackupFile>, BackupError> {
    if !settings.auto_backup || settings.passphrase().is_none() {
        tracing::debug!("Auto backup disabled, skipping");
        return Ok(None);
    }
    if db::count_records(conn)? == 0 {
        tracing::debug!("No records yet, skipping auto backup");
        return Ok(None);
    }

    let payload = export_payload(conn)?;
    let blob = encrypt_payload(&payload, settings)?;
    dir.create(&blob, BackupOrigin::Auto, at).map(Some)
}

/// Run [`run_auto_backup`] on the blocking pool against its own connection,
/// so app start does not wait on key derivation. Failures are logged and
/// returned through the handle.
pub fn spawn_auto_backup(
    db_path: PathBuf,
    dir: BackupDirectory,
) -> tokio::task::JoinHandle<Result<Option<BackupFile>, BackupError>> {
    tokio::task::spawn_blocking(move || {
        let result = db::open_database(&db_path)
            .map_err(BackupError::from)
            .and_then(|conn| {
                let settings = db::load_backup_settings(&conn)?;
                run_auto_backup(&conn, &dir, &settings, Local::now().naive_local())
            });
        if let Err(e) = &result {
            tracing::error!(error = %e, "Auto backup failed");
        }
        result
    })
}

/// [`spawn_auto_backup`] when a tokio runtime is available. Without one the
/// backup is skipped with a warning and `None` is returned.
pub fn schedule_auto_backup(
    db_path: PathBuf,
    dir: BackupDirectory,
) -> Option<tokio::task::JoinHandle<Result<Option<BackupFile>, BackupError>>> {
    if tokio::runtime::Handle::try_current().is_err() {
        tracing::warn!("No async runtime running; auto backup skipped");
        return None;
    }
    Some(spawn_auto_backup(db_path, dir))
}

/// Decrypt a backup blob and replace the store with its contents.
///
/// Decryption and parsing finish before anything is written, so a wrong
/// passphrase never touches existing data.
pub fn restore_from_blob(
    conn: &Connection,
    blob: &[u8],
    passphrase: &str,
) -> Result<RestoreSummary, BackupError> {
    let payload = decrypt_payload(blob, passphrase)?;
    replace_store(conn, payload)
}

/// Restore from a named file in the backup directory.
pub fn restore_from_file(
    conn: &Connection,
    dir: &BackupDirectory,
    name: &str,
    passphrase: &str,
) -> Result<RestoreSummary, BackupError> {
    let blob = dir.read(name)?;
    let summary = restore_from_blob(conn, &blob, passphrase)?;
    tracing::info!(file = %name, "Restored from backup file");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CostItem, RecordDraft};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn settings(auto: bool) -> BackupSettings {
        BackupSettings {
            passphrase: Some("pw".into()),
            auto_backup: auto,
            kdf_iterations: 1_000,
        }
    }

    fn seed(conn: &Connection, title: &str, self_pay: f64) -> i64 {
        let mut draft = RecordDraft {
            date: "2024-06-20".into(),
            hospital: "华山医院".into(),
            title: title.into(),
            ..Default::default()
        };
        draft.add_cost_item(CostItem {
            self_pay,
            ..Default::default()
        });
        db::add_record(conn, &draft, &[]).unwrap()
    }

    #[test]
    fn manual_backup_then_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backups = BackupDirectory::new(dir.path());
        let conn = db::open_memory_database().unwrap();
        let id = seed(&conn, "头痛", 35.0);

        let file = create_manual_backup(&conn, &backups, &settings(false), now()).unwrap();
        assert_eq!(file.name, "manual_backup_20240701_080000.enc");

        db::delete_record(&conn, id).unwrap();
        seed(&conn, "新增", 1.0);

        let summary = restore_from_file(&conn, &backups, &file.name, "pw").unwrap();
        assert_eq!(summary.records_restored, 1);
        let all = db::get_all_records(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].title, "头痛");
        assert_eq!(all[0].totals.total, 35.0);
    }

    #[test]
    fn wrong_password_restore_keeps_store() {
        let dir = tempfile::tempdir().unwrap();
        let backups = BackupDirectory::new(dir.path());
        let conn = db::open_memory_database().unwrap();
        seed(&conn, "旧", 1.0);
        let file = create_manual_backup(&conn, &backups, &settings(false), now()).unwrap();
        seed(&conn, "新", 2.0);

        let result = restore_from_file(&conn, &backups, &file.name, "nope");
        assert!(matches!(result, Err(BackupError::WrongPasswordOrCorrupted)));
        assert_eq!(db::count_records(&conn).unwrap(), 2);
    }

    #[test]
    fn manual_backup_requires_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_memory_database().unwrap();
        let result = create_manual_backup(
            &conn,
            &BackupDirectory::new(dir.path()),
            &BackupSettings::default(),
            now(),
        );
        assert!(matches!(result, Err(BackupError::MissingPassphrase)));
    }

    #[test]
    fn auto_backup_skips_when_disabled_or_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backups = BackupDirectory::new(dir.path());
        let conn = db::open_memory_database().unwrap();

        assert!(run_auto_backup(&conn, &backups, &settings(true), now())
            .unwrap()
            .is_none());

        seed(&conn, "x", 1.0);
        assert!(run_auto_backup(&conn, &backups, &settings(false), now())
            .unwrap()
            .is_none());
        assert!(backups.list().unwrap().is_empty());

        let file = run_auto_backup(&conn, &backups, &settings(true), now())
            .unwrap()
            .unwrap();
        assert_eq!(file.origin, Some(BackupOrigin::Auto));
        assert_eq!(backups.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn spawned_auto_backup_uses_stored_settings() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("store.db");
        {
            let conn = db::open_database(&db_path).unwrap();
            seed(&conn, "x", 1.0);
            db::save_backup_settings(&conn, &settings(true)).unwrap();
        }
        let backups = BackupDirectory::new(dir.path().join("backups"));

        // Stored settings use the full iteration count.
        let file = spawn_auto_backup(db_path, backups.clone())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(file.name.starts_with("auto_backup_"));
        assert_eq!(backups.list().unwrap().len(), 1);
    }

    #[test]
    fn scheduling_without_runtime_skips_backup() {
        let dir = tempfile::tempdir().unwrap();
        let backups = BackupDirectory::new(dir.path().join("backups"));
        let handle = schedule_auto_backup(dir.path().join("medvault.db"), backups.clone());
        assert!(handle.is_none());
        assert!(backups.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn scheduling_inside_runtime_runs_backup() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("medvault.db");
        drop(db::open_database(&db_path).unwrap());
        let backups = BackupDirectory::new(dir.path().join("backups"));

        let outcome = schedule_auto_backup(db_path, backups)
            .expect("runtime is running")
            .await
            .unwrap()
            .unwrap();
        // Empty store with auto backup off: nothing written.
        assert!(outcome.is_none());
    }
}
