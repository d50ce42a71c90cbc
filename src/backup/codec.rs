//! Backup blob encoding.
//!
//! Layout of a backup file:
//!
//! ```text
//! "MEDVAULT" | format u8 | pbkdf2 iterations u32 LE | salt [32] | nonce [12] | ciphertext + tag
//! ```
//!
//! The plaintext is the JSON form of [`BackupPayload`].

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::config::BackupSettings;
use crate::crypto::{generate_salt, BackupKey, EncryptedData, SALT_LENGTH};
use crate::db;
use crate::models::{now_iso, Attachment, Record};

use super::BackupError;

/// Magic bytes for backup files.
const BACKUP_MAGIC: &[u8; 8] = b"MEDVAULT";
const FORMAT_VERSION: u8 = 1;
/// Version of the JSON payload schema.
pub const PAYLOAD_VERSION: u32 = 1;
const HEADER_LENGTH: usize = BACKUP_MAGIC.len() + 1 + 4 + SALT_LENGTH;
/// Upper bound on the stored iteration count; anything above is treated as
/// a corrupted header rather than run.
const MAX_ITERATIONS: u32 = 10_000_000;

/// Plaintext content of a backup: the full record and attachment tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupPayload {
    pub version: u32,
    pub timestamp: String,
    pub records: Vec<Record>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Read every record and attachment into a payload.
///
/// This is a plain read, not a snapshot: an edit landing between the two
/// table reads can show up in one list and not the other.
pub fn export_payload(conn: &Connection) -> Result<BackupPayload, BackupError> {
    let records = db::get_all_records(conn)?;
    let attachments = db::get_all_attachments(conn)?;
    Ok(BackupPayload {
        version: PAYLOAD_VERSION,
        timestamp: now_iso(),
        records,
        attachments,
    })
}

/// Serialize and encrypt a payload with the passphrase from `settings`.
pub fn encrypt_payload(
    payload: &BackupPayload,
    settings: &BackupSettings,
) -> Result<Vec<u8>, BackupError> {
    let passphrase = settings.passphrase().ok_or(BackupError::MissingPassphrase)?;
    let plaintext = serde_json::to_vec(payload)?;

    let iterations = settings.kdf_iterations.clamp(1, MAX_ITERATIONS);
    let salt = generate_salt();
    let key = BackupKey::derive(passphrase, &salt, iterations);
    let sealed = key.seal(&plaintext)?;

    let mut blob = Vec::with_capacity(HEADER_LENGTH);
    blob.extend_from_slice(BACKUP_MAGIC);
    blob.push(FORMAT_VERSION);
    blob.extend_from_slice(&iterations.to_le_bytes());
    blob.extend_from_slice(&salt);
    sealed.write_to(&mut blob);
    Ok(blob)
}

/// Decrypt and parse a backup blob.
///
/// A wrong passphrase, a damaged file and a payload that is not valid JSON
/// all come back as [`BackupError::WrongPasswordOrCorrupted`].
pub fn decrypt_payload(blob: &[u8], passphrase: &str) -> Result<BackupPayload, BackupError> {
    if passphrase.is_empty() {
        return Err(BackupError::MissingPassphrase);
    }
    if blob.len() < HEADER_LENGTH || &blob[..BACKUP_MAGIC.len()] != BACKUP_MAGIC {
        return Err(BackupError::WrongPasswordOrCorrupted);
    }

    let mut offset = BACKUP_MAGIC.len();
    let format = blob[offset];
    if format != FORMAT_VERSION {
        return Err(BackupError::UnsupportedVersion(u32::from(format)));
    }
    offset += 1;

    let mut iter_bytes = [0u8; 4];
    iter_bytes.copy_from_slice(&blob[offset..offset + 4]);
    let iterations = u32::from_le_bytes(iter_bytes);
    if iterations == 0 || iterations > MAX_ITERATIONS {
        return Err(BackupError::WrongPasswordOrCorrupted);
    }
    offset += 4;

    let mut salt = [0u8; SALT_LENGTH];
    salt.copy_from_slice(&blob[offset..offset + SALT_LENGTH]);
    offset += SALT_LENGTH;

    let sealed = EncryptedData::parse(&blob[offset..])
        .map_err(|_| BackupError::WrongPasswordOrCorrupted)?;
    let key = BackupKey::derive(passphrase, &salt, iterations);
    let plaintext = key
        .open(&sealed)
        .map_err(|_| BackupError::WrongPasswordOrCorrupted)?;

    let payload: BackupPayload =
        serde_json::from_slice(&plaintext).map_err(|_| BackupError::WrongPasswordOrCorrupted)?;
    if payload.version > PAYLOAD_VERSION {
        return Err(BackupError::UnsupportedVersion(payload.version));
    }
    Ok(payload)
}
