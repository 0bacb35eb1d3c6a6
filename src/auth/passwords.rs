use argon2::{
    Algorithm, Argon2, ParamsBuilder, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::RngCore;

use crate::auth::{AuthConfig, AuthError, AuthResult};

const SALT_LEN: usize = 16;

#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        Self::with_cost(
            config.password_hash_memory_kib,
            config.password_hash_iterations,
        )
    }

    pub fn with_cost(memory_kib: u32, iterations: u32) -> AuthResult<Self> {
        let mut builder = ParamsBuilder::new();
        builder.m_cost(memory_kib);
        builder.t_cost(iterations);
        builder.p_cost(1);
        let params = builder.build().map_err(AuthError::from)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { argon2 })
    }

    pub fn hash_password(&self, password: &str) -> AuthResult<String> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(AuthError::from)?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(AuthError::from)?
            .to_string();
        Ok(hash)
    }

    /// Check `password` against a PHC-encoded hash. Anything other than a
    /// match, including a stored hash that cannot be parsed, is `false`.
    pub fn verify_password(&self, password: &str, encoded: &str) -> bool {
        let parsed = match PasswordHash::new(encoded) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!("stored password hash is unreadable: {}", err);
                return false;
            }
        };
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => true,
            Err(argon2::password_hash::Error::Password) => false,
            Err(err) => {
                log::warn!("password verification failed: {}", err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_service() -> PasswordService {
        PasswordService::with_cost(1024, 1).expect("password service")
    }

    #[test]
    fn hashes_and_verifies_passwords() {
        let service = cheap_service();
        let hash = service
            .hash_password("super-secret")
            .expect("hash generation");
        assert!(service.verify_password("super-secret", &hash));
        assert!(!service.verify_password("wrong-password", &hash));
        assert!(!service.verify_password("", &hash));
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        let service = cheap_service();
        let first = service.hash_password("hunter2").expect("first hash");
        let second = service.hash_password("hunter2").expect("second hash");
        assert_ne!(first, second);
        assert!(!first.contains("hunter2"));
    }

    #[test]
    fn unreadable_hash_is_a_mismatch() {
        let service = cheap_service();
        assert!(!service.verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn hashes_verify_across_cost_settings() {
        let hash = cheap_service().hash_password("portable").expect("hash");
        let stronger = PasswordService::with_cost(2048, 2).expect("service");
        assert!(stronger.verify_password("portable", &hash));
    }
}
