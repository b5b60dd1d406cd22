//! # Credentials
//!
//! Argon2id password hashing. Hashes are stored in PHC string form, so the
//! cost parameters travel with each hash and old hashes keep verifying after
//! the configured cost changes.

use argon2::{Algorithm, Argon2, Params, Version};
use password_hash::rand_core::{OsRng, RngCore};
use password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};

use crate::error::{CoreError, CoreResult};

/// Argon2id with a fixed cost.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    /// The argon2 crate's recommended cost.
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher {
    /// Custom cost: memory in KiB, iterations, lanes.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> CoreResult<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| CoreError::Credentials(e.to_string()))?;
        Ok(Self { params })
    }

    /// Cheapest cost argon2 accepts. Only for tests and demo seeding.
    pub fn fast() -> Self {
        Self::new(Params::MIN_M_COST, Params::MIN_T_COST, 1).unwrap_or_default()
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, password: &str) -> CoreResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| CoreError::Credentials(e.to_string()))
    }

    /// True when `password` matches. A malformed hash never matches.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

/// 128 random bits as lowercase hex. Used for session and token ids.
pub fn random_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_hex_and_distinct() {
        let a = random_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, random_id());
    }

    #[test]
    fn hash_then_verify() {
        let hasher = PasswordHasher::fast();
        let hash = hasher.hash("demo123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("demo123", &hash));
        assert!(!hasher.verify("demo124", &hash));
    }

    #[test]
    fn salts_differ() {
        let hasher = PasswordHasher::fast();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!PasswordHasher::fast().verify("demo123", "not-a-hash"));
    }

    #[test]
    fn hashes_verify_across_costs() {
        let hash = PasswordHasher::fast().hash("demo123").unwrap();
        let stronger = PasswordHasher::new(16, 2, 1).unwrap();
        assert!(stronger.verify("demo123", &hash));
    }

    #[test]
    fn invalid_cost_is_rejected() {
        assert!(PasswordHasher::new(0, 0, 0).is_err());
    }
}
