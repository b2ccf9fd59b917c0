//! Password hashing for `userPassword` values.
//!
//! New and changed passwords are stored as `{SSHA512}base64(sha512(password || salt) || salt)`,
//! a scheme understood by OpenLDAP (with the `pw-sha2` overlay), 389-ds and most other servers.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha512};

/// Scheme prefix for salted SHA-512 hashes.
pub const SSHA512_PREFIX: &str = "{SSHA512}";

const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 64;

/// Hashes `password` with a fresh random salt.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    hash_with_salt(password, &salt)
}

fn hash_with_salt(password: &str, salt: &[u8]) -> String {
    let mut payload = digest(password, salt);
    payload.extend_from_slice(salt);
    format!("{SSHA512_PREFIX}{}", STANDARD.encode(payload))
}

fn digest(password: &str, salt: &[u8]) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    hasher.finalize().to_vec()
}
