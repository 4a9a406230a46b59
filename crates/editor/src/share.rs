// Share codes, share links, and password protection for shared documents.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

use crate::error::EditorError;

/// Fresh random share code, URL-safe and unpadded.
pub fn generate_share_code() -> String {
    let mut bytes = [0_u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `{base}/share/{code}`, tolerating a trailing slash on `base`.
pub fn build_share_link(base_url: &str, share_code: &str) -> String {
    format!("{}/share/{}", base_url.trim_end_matches('/'), share_code)
}

/// Argon2id PHC string for `password`. Blank passwords are rejected.
pub fn hash_password(password: &str) -> Result<String, EditorError> {
    if password.trim().is_empty() {
        return Err(EditorError::validation("password must not be empty"));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| EditorError::Unexpected(anyhow::anyhow!(error.to_string())))
}

/// Whether `password` matches the stored hash. A malformed hash never
/// matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}
