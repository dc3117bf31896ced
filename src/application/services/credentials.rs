use std::time::Duration;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use rand::RngCore;
use tracing::warn;

use crate::{application::error::ApplicationError, domain::models::auth_token::AuthToken};

const TOKEN_BYTES: usize = 32;

// Argon2id, OWASP baseline. Changing these only affects newly hashed passwords.
const MEMORY_COST_KIB: u32 = 19 * 1024;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;
const HASH_LENGTH: usize = 32;

/// 256 random bits, base64url without padding (43 characters).
pub fn generate_token(valid_duration: Duration) -> AuthToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    AuthToken {
        value: URL_SAFE_NO_PAD.encode(bytes),
        created_at: Utc::now(),
        valid_duration,
    }
}

fn hasher() -> Result<Argon2<'static>, ApplicationError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, Some(HASH_LENGTH))
        .map_err(|e| ApplicationError::InternalError(format!("Invalid hash params: {}", e)))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Returns a PHC string carrying algorithm, parameters and salt.
pub fn generate_hashed_password(raw: &str) -> Result<String, ApplicationError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(raw.as_bytes(), &salt)
        .map_err(|e| ApplicationError::InternalError(format!("Password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

/// A stored hash that cannot be parsed never matches.
pub fn compare_password(hash: &str, raw: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored password hash is malformed: {}", e);
            return false;
        }
    };
    Argon2::default()
        .verify_password(raw.as_bytes(), &parsed)
        .is_ok()
}

/// Argon2 is deliberately slow; keep it off the async worker threads.
pub async fn hash_password_blocking(raw: String) -> Result<String, ApplicationError> {
    tokio::task::spawn_blocking(move || generate_hashed_password(&raw))
        .await
        .map_err(|e| ApplicationError::InternalError(format!("Hashing task failed: {}", e)))?
}

pub async fn compare_password_blocking(hash: String, raw: String) -> Result<bool, ApplicationError> {
    tokio::task::spawn_blocking(move || compare_password(&hash, &raw))
        .await
        .map_err(|e| ApplicationError::InternalError(format!("Verification task failed: {}", e)))
}
