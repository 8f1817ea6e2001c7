//! Password-based authenticated encryption for persisted credentials
//!
//! The key is derived from a user password and the machine fingerprint
//! (`machine::resolve`), so an encrypted credential file is bound to the host
//! that created it. `Secret` is the scoped holder for the password bytes; it
//! zeroizes on drop, which covers every exit path.

pub mod codec;
pub mod kdf;

use std::fmt;

use thiserror::Error;
use zeroize::Zeroize;

use crate::machine::MachineIdError;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("machine identity error: {0}")]
    MachineId(#[from] MachineIdError),

    #[error("cipher setup failed: {0}")]
    Cipher(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("authentication failed: wrong password or corrupted data")]
    Authentication,
}

/// Scope-guarded holder of sensitive bytes.
///
/// The bytes are erased when the handle is dropped. Callers read them through
/// `expose` for the duration of a single derive/encrypt/decrypt call and must
/// not copy them into unguarded buffers.
pub struct Secret {
    bytes: Vec<u8>,
}

impl Secret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_exposes_bytes() {
        let secret = Secret::new(b"hunter2".to_vec());
        assert_eq!(secret.expose(), b"hunter2");
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new(b"hunter2".to_vec());
        let printed = format!("{secret:?}");
        assert!(!printed.contains("hunter2"));
    }
}
