//! Password-to-key derivation
//!
//! The AES-256 key is the hex encoding of HMAC-MD5(machine_id, password).
//! Deterministic, with no stored salt: the same password on the same host
//! always yields the same key, which is what makes password-only decryption
//! of a cached credential file possible. Moving the file to another host
//! makes it permanently undecryptable.
//!
//! MD5 here sizes the output (16 digest bytes, 32 hex characters); it is not
//! relied on for collision resistance. The scheme is kept as-is for
//! compatibility with existing credential files. A future format bump should
//! switch to a memory-hard KDF with a stored per-file salt.

use hmac::{Hmac, Mac};
use md5::Md5;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// Derive the symmetric key from a password and the machine fingerprint.
pub fn derive_key(password: &[u8], machine_id: &str) -> [u8; KEY_LEN] {
    let mut mac = Hmac::<Md5>::new_from_slice(machine_id.as_bytes())
        .expect("HMAC-MD5 accepts keys of any length");
    mac.update(password);

    // 16 digest bytes hex-encode to exactly KEY_LEN ASCII bytes.
    let hex_digest = hex::encode(mac.finalize().into_bytes());
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(hex_digest.as_bytes());
    key
}
