//! PBKDF2-HMAC-SHA256 key derivation and AES-256-GCM sealing.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hmac::Hmac;
use rand::RngExt;
use sha2::Sha256;

use crate::error::{CryptoError, DecryptError};
use crate::payload::{EncryptedPayload, IV_LEN, SALT_LEN};

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Key derivation parameters shared by encryption and decryption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfParams {
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

fn derive_key(password: &str, salt: &[u8], params: KdfParams) -> Result<[u8; KEY_LEN], CryptoError> {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, params.iterations, &mut key)
        .map_err(|_| CryptoError::Kdf)?;
    Ok(key)
}

/// Encrypt `plaintext` under `password` with a fresh salt and IV.
pub fn encrypt(
    plaintext: &[u8],
    password: &str,
    params: KdfParams,
) -> Result<EncryptedPayload, CryptoError> {
    let mut rng = rand::rng();
    let salt: [u8; SALT_LEN] = rng.random();
    let iv: [u8; IV_LEN] = rng.random();

    let key = derive_key(password, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::Cipher)?;
    let sealed = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| CryptoError::Cipher)?;

    Ok(EncryptedPayload {
        cipher: sealed,
        iv,
        salt,
    })
}

/// Decrypt a payload.
///
/// Any failure, including a wrong password or a tampered ciphertext, yields
/// the same [`DecryptError`].
pub fn decrypt(
    payload: &EncryptedPayload,
    password: &str,
    params: KdfParams,
) -> Result<Vec<u8>, DecryptError> {
    let key = derive_key(password, &payload.salt, params).map_err(|_| DecryptError)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| DecryptError)?;
    cipher
        .decrypt(Nonce::from_slice(&payload.iv), payload.cipher.as_slice())
        .map_err(|_| DecryptError)
}
