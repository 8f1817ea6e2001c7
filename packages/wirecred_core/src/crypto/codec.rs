//! AES-256-GCM codec for the credential file
//!
//! On-disk framing is `nonce (12 bytes) || ciphertext+tag`, with no header.
//! The nonce is drawn fresh from the OS CSPRNG on every encryption; nonce
//! reuse under the same key would break the AEAD guarantees.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::{kdf, CryptoError, Secret};
use crate::machine;

/// AES-GCM nonce length, fixed and known to both encrypt and decrypt.
pub const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` under a key derived from `password` and the machine
/// fingerprint. Returns `nonce || ciphertext+tag`.
pub fn encrypt(plaintext: &[u8], password: &Secret) -> Result<Vec<u8>, CryptoError> {
    let cipher = password_cipher(password)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a `nonce || ciphertext+tag` blob.
///
/// A wrong password and a tampered or truncated blob all surface as
/// `CryptoError::Authentication`. That error is the only signal the caller
/// gets that the supplied password did not match the one used at encryption
/// time.
pub fn decrypt(blob: &[u8], password: &Secret) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < NONCE_LEN {
        log::debug!("encrypted blob shorter than nonce ({} bytes)", blob.len());
        return Err(CryptoError::Authentication);
    }

    let cipher = password_cipher(password)?;
    let nonce = Nonce::from_slice(&blob[..NONCE_LEN]);

    cipher
        .decrypt(nonce, &blob[NONCE_LEN..])
        .map_err(|_| CryptoError::Authentication)
}

/// Resolve the machine fingerprint, derive the key, build the cipher.
/// The derived key lives in a zeroizing buffer so it is scrubbed on every
/// exit path.
fn password_cipher(password: &Secret) -> Result<Aes256Gcm, CryptoError> {
    let machine_id = machine::resolve()?;
    let key = Zeroizing::new(kdf::derive_key(password.expose(), &machine_id));
    Aes256Gcm::new_from_slice(key.as_slice()).map_err(|e| CryptoError::Cipher(e.to_string()))
}
