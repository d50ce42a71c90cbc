use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use super::keys::KEY_LENGTH;
use super::CryptoError;

pub const NONCE_LENGTH: usize = 12;
/// AES-GCM appends a 16-byte tag, so even an empty backup is this long.
const MIN_SEALED_LENGTH: usize = NONCE_LENGTH + 16;

/// A sealed AES-256-GCM message. On disk it is the nonce followed by the
/// ciphertext with its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    pub nonce: [u8; NONCE_LENGTH],
    pub ciphertext: Vec<u8>,
}

fn cipher_for(key_bytes: &[u8; KEY_LENGTH]) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes))
}

impl EncryptedData {
    /// Seal `plaintext` under a fresh random nonce.
    pub(crate) fn seal(key_bytes: &[u8; KEY_LENGTH], plaintext: &[u8]) -> Result<Self, CryptoError> {
        let mut nonce = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = cipher_for(key_bytes)
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;
        Ok(Self { nonce, ciphertext })
    }

    /// Verify the tag and return the plaintext.
    pub(crate) fn open(&self, key_bytes: &[u8; KEY_LENGTH]) -> Result<Vec<u8>, CryptoError> {
        cipher_for(key_bytes)
            .decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_slice())
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Append the on-disk form to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.reserve(NONCE_LENGTH + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
    }

    /// Split an on-disk message back into nonce and ciphertext.
    pub fn parse(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_SEALED_LENGTH {
            return Err(CryptoError::MalformedPayload("ciphertext shorter than nonce and tag"));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LENGTH);
        let mut fixed = [0u8; NONCE_LENGTH];
        fixed.copy_from_slice(nonce);
        Ok(Self {
            nonce: fixed,
            ciphertext: ciphertext.to_vec(),
        })
    }
}
