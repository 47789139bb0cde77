//! Password hashing (Argon2id, fixed cost).

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use super::error::PasswordError;

/// Memory cost in KiB (19 MiB).
const MEMORY_COST_KIB: u32 = 19 * 1024;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|_| PasswordError::HashingFailure)?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a plaintext password into a salted PHC digest string.
pub fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let digest = hasher()?
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|_| PasswordError::HashingFailure)?
        .to_string();
    Ok(digest)
}

/// Check a plaintext against a stored digest.
///
/// Any failure, including an unparsable digest, is reported as `false`.
pub fn verify_password(digest: &str, plaintext: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return false;
    };
    let Ok(argon2) = hasher() else {
        return false;
    };
    argon2
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}
