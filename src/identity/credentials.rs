//! Credential store and verifier for the two fixed principals.
//!
//! Secrets are held only as salted Argon2 PHC hashes computed when the store
//! is constructed; verification is a constant-time PHC comparison. There is
//! deliberately no plaintext comparison path.

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

use crate::error::{AppError, AppResult};

use super::principal::{Principal, Role};

fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

#[derive(Debug, Clone)]
struct CredentialEntry {
    username: String,
    password_hash: String,
    role: Role,
}

/// Fixed-size principal table: one admin, one user, immutable for process lifetime.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    entries: [CredentialEntry; 2],
}

impl CredentialStore {
    pub fn new(
        admin_username: &str,
        admin_password: &str,
        user_username: &str,
        user_password: &str,
    ) -> Result<Self> {
        Ok(Self {
            entries: [
                CredentialEntry {
                    username: admin_username.to_string(),
                    password_hash: hash_password(admin_password)?,
                    role: Role::Admin,
                },
                CredentialEntry {
                    username: user_username.to_string(),
                    password_hash: hash_password(user_password)?,
                    role: Role::User,
                },
            ],
        })
    }

    /// Verify a claimed username/password pair and resolve the principal.
    /// Unknown usernames and mismatched passwords are indistinguishable to the caller.
    pub fn verify(&self, username: &str, password: &str) -> AppResult<Principal> {
        for entry in &self.entries {
            if entry.username == username {
                if verify_password(&entry.password_hash, password) {
                    return Ok(Principal::new(entry.username.clone(), entry.role));
                }
                break;
            }
        }
        Err(AppError::invalid_credentials("invalid_credentials", "invalid username or password"))
    }
}
