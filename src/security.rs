//! Password hashing and credential policy.
//!
//! Hashes are Argon2id PHC strings with a fresh random salt per call. Verification
//! reads the parameters embedded in the stored hash, so changing the cost for new
//! hashes never invalidates existing accounts.

use anyhow::{anyhow, Result};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier, Version};
use once_cell::sync::{Lazy, OnceCell};
use password_hash::{PasswordHash, SaltString};
use regex::Regex;

use crate::error::AuthError;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_NAME_LENGTH: usize = 60;
pub const CARD_NUMBER_PREFIX: &str = "IAR/";

// Same shape as the registration form check; ASCII word characters only.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*@[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*(\.[A-Za-z0-9_]{2,3})+$")
        .expect("email pattern compiles")
});

/// Argon2id hasher with configurable cost.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    // Hash of a random throwaway password, verified against when the account is unknown.
    dummy: std::sync::Arc<OnceCell<String>>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .finish()
    }
}

impl Default for PasswordHasher {
    fn default() -> Self { Self::with_params(Params::default()) }
}

impl PasswordHasher {
    pub fn with_params(params: Params) -> Self {
        Self { params, dummy: std::sync::Arc::new(OnceCell::new()) }
    }

    /// Cheap parameters for tests: 1 MiB, one pass.
    pub fn fast_for_tests() -> Self {
        let params = Params::new(1024, 1, 1, None).expect("valid argon2 params");
        Self::with_params(params)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
        let phc = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!(e.to_string()))?
            .to_string();
        Ok(phc)
    }

    /// False on mismatch and on any malformed hash; never errors.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        if let Ok(parsed) = PasswordHash::new(hash) {
            self.argon2().verify_password(password.as_bytes(), &parsed).is_ok()
        } else {
            false
        }
    }

    /// Burn one verification so unknown-account logins cost the same as wrong passwords.
    pub fn verify_dummy(&self, password: &str) {
        let dummy = self.dummy.get_or_init(|| {
            let mut filler = [0u8; 24];
            let _ = getrandom::getrandom(&mut filler);
            let throwaway: String = filler.iter().map(|b| format!("{:02x}", b)).collect();
            self.hash(&throwaway).unwrap_or_default()
        });
        let _ = self.verify(password, dummy);
    }
}

/// Trim + lower-case; the stored form of an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn check_name(name: &str) -> Result<String, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::MissingField("name"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::NameTooLong);
    }
    Ok(name.to_string())
}

pub fn check_password_length(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::PasswordTooShort);
    }
    Ok(())
}

/// At least one ASCII letter and one ASCII digit.
pub fn check_password_strength(password: &str) -> Result<(), AuthError> {
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if has_letter && has_digit { Ok(()) } else { Err(AuthError::PasswordTooWeak) }
}

/// Random card number `IAR/NNNNN` in 10000..=99999. Uniqueness is enforced by the store.
pub fn generate_card_number() -> Result<String> {
    let mut buf = [0u8; 4];
    getrandom::getrandom(&mut buf).map_err(|e| anyhow!(e.to_string()))?;
    let n = 10_000 + (u32::from_le_bytes(buf) % 90_000);
    Ok(format!("{}{}", CARD_NUMBER_PREFIX, n))
}

pub fn is_card_number(s: &str) -> bool {
    match s.strip_prefix(CARD_NUMBER_PREFIX) {
        Some(digits) => digits.len() == 5 && digits.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}
