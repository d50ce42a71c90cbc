use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use super::encryption::EncryptedData;
use super::CryptoError;

/// Default PBKDF2-SHA256 rounds for new backups. Each blob records the
/// count it was written with.
pub const PBKDF2_ITERATIONS: u32 = 600_000;
/// AES-256 key size.
pub const KEY_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 32;

/// Key for one backup blob, derived from the backup passphrase and that
/// blob's salt. Wiped when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct BackupKey {
    bytes: [u8; KEY_LENGTH],
}

impl BackupKey {
    /// A zero iteration count is bumped to one.
    pub fn derive(passphrase: &str, salt: &[u8; SALT_LENGTH], iterations: u32) -> Self {
        let mut bytes = [0u8; KEY_LENGTH];
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations.max(1), &mut bytes);
        Self { bytes }
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<EncryptedData, CryptoError> {
        EncryptedData::seal(&self.bytes, plaintext)
    }

    pub fn open(&self, sealed: &EncryptedData) -> Result<Vec<u8>, CryptoError> {
        sealed.open(&self.bytes)
    }
}

/// Fresh salt for each backup written.
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}
