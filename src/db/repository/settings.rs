use rusqlite::{params, Connection};

use crate::config::BackupSettings;
use crate::db::DatabaseError;

const BACKUP_PASSPHRASE_KEY: &str = "backup_pwd";
const BACKUP_AUTO_KEY: &str = "backup_auto";

/// Get a setting by key. Returns None if not set.
pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT value FROM user_settings WHERE key = ?1")?;
    match stmt.query_row([key], |row| row.get::<_, String>(0)) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e)),
    }
}

/// Set a setting (upsert).
pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO user_settings (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

pub fn delete_setting(conn: &Connection, key: &str) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM user_settings WHERE key = ?1", [key])?;
    Ok(())
}

/// Read the stored backup passphrase and auto-backup flag into an explicit
/// settings object for the backup codec.
pub fn load_backup_settings(conn: &Connection) -> Result<BackupSettings, DatabaseError> {
    let passphrase = get_setting(conn, BACKUP_PASSPHRASE_KEY)?.filter(|p| !p.is_empty());
    let auto_backup = get_setting(conn, BACKUP_AUTO_KEY)?.as_deref() == Some("true");
    Ok(BackupSettings {
        passphrase,
        auto_backup,
        ..BackupSettings::default()
    })
}

/// Persist backup settings. Auto-backup cannot be enabled without a
/// passphrase.
pub fn save_backup_settings(
    conn: &Connection,
    settings: &BackupSettings,
) -> Result<(), DatabaseError> {
    if settings.auto_backup && settings.passphrase().is_none() {
        return Err(DatabaseError::ConstraintViolation(
            "auto backup requires a backup passphrase".into(),
        ));
    }
    let tx = conn.unchecked_transaction()?;
    match settings.passphrase() {
        Some(pass) => set_setting(&tx, BACKUP_PASSPHRASE_KEY, pass)?,
        None => delete_setting(&tx, BACKUP_PASSPHRASE_KEY)?,
    }
    set_setting(
        &tx,
        BACKUP_AUTO_KEY,
        if settings.auto_backup { "true" } else { "false" },
    )?;
    tx.commit()?;
    tracing::info!(auto_backup = settings.auto_backup, "Backup settings saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn missing_setting_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_setting(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn set_setting_upserts() {
        let conn = open_memory_database().unwrap();
        set_setting(&conn, "k", "1").unwrap();
        set_setting(&conn, "k", "2").unwrap();
        assert_eq!(get_setting(&conn, "k").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn backup_settings_round_trip() {
        let conn = open_memory_database().unwrap();
        let settings = BackupSettings {
            passphrase: Some("s3cret".into()),
            auto_backup: true,
            ..BackupSettings::default()
        };
        save_backup_settings(&conn, &settings).unwrap();
        let loaded = load_backup_settings(&conn).unwrap();
        assert_eq!(loaded.passphrase(), Some("s3cret"));
        assert!(loaded.auto_backup);
    }

    #[test]
    fn defaults_when_nothing_saved() {
        let conn = open_memory_database().unwrap();
        let loaded = load_backup_settings(&conn).unwrap();
        assert!(loaded.passphrase().is_none());
        assert!(!loaded.auto_backup);
    }

    #[test]
    fn auto_backup_without_passphrase_rejected() {
        let conn = open_memory_database().unwrap();
        let settings = BackupSettings {
            passphrase: None,
            auto_backup: true,
            ..BackupSettings::default()
        };
        assert!(matches!(
            save_backup_settings(&conn, &settings),
            Err(DatabaseError::ConstraintViolation(_))
        ));
        assert!(get_setting(&conn, BACKUP_AUTO_KEY).unwrap().is_none());
    }
}
