//! Secret hashing: user passwords and refresh-token secrets.
//!
//! [`CredentialVerifier`] is the seam the session engine hashes through.
//! Two implementations are provided:
//!
//! - [`Argon2Verifier`] -- Argon2id PHC strings with a random salt. The work
//!   factor is deliberate, so hashing runs on the blocking thread pool.
//! - [`Sha256Verifier`] -- plain SHA-256 hex digest, compared in constant
//!   time. Only suitable for high-entropy input such as refresh secrets.

use std::str::FromStr;
use std::sync::LazyLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use orbit_core::hashing::{constant_time_eq, sha256_hex};

/// Hashing or verification could not be performed.
///
/// A mismatch is not an error; it is `Ok(false)` from `verify`.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("password hash error: {0}")]
    Hash(String),

    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<argon2::password_hash::Error> for HashError {
    fn from(err: argon2::password_hash::Error) -> Self {
        HashError::Hash(err.to_string())
    }
}

/// Produces and checks hashes of secrets.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Hash a plaintext secret for storage.
    async fn hash(&self, secret: &str) -> Result<String, HashError>;

    /// Check a plaintext secret against a stored hash.
    async fn verify(&self, secret: &str, hash: &str) -> Result<bool, HashError>;
}

/// Argon2id verifier. CPU work runs under `spawn_blocking`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Verifier;

#[async_trait]
impl CredentialVerifier for Argon2Verifier {
    async fn hash(&self, secret: &str) -> Result<String, HashError> {
        let secret = secret.to_owned();
        Ok(tokio::task::spawn_blocking(move || hash_password(&secret)).await??)
    }

    async fn verify(&self, secret: &str, hash: &str) -> Result<bool, HashError> {
        let secret = secret.to_owned();
        let hash = hash.to_owned();
        Ok(tokio::task::spawn_blocking(move || verify_password(&secret, &hash)).await??)
    }
}

/// SHA-256 verifier for refresh secrets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Verifier;

#[async_trait]
impl CredentialVerifier for Sha256Verifier {
    async fn hash(&self, secret: &str) -> Result<String, HashError> {
        Ok(sha256_hex(secret.as_bytes()))
    }

    async fn verify(&self, secret: &str, hash: &str) -> Result<bool, HashError> {
        let computed = sha256_hex(secret.as_bytes());
        Ok(constant_time_eq(computed.as_bytes(), hash.as_bytes()))
    }
}

/// Which [`CredentialVerifier`] hashes refresh secrets (`REFRESH_SECRET_HASHER`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HasherKind {
    Argon2,
    Sha256,
}

impl HasherKind {
    pub fn build(self) -> std::sync::Arc<dyn CredentialVerifier> {
        match self {
            HasherKind::Argon2 => std::sync::Arc::new(Argon2Verifier),
            HasherKind::Sha256 => std::sync::Arc::new(Sha256Verifier),
        }
    }
}

impl FromStr for HasherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "argon2" | "argon2id" => Ok(HasherKind::Argon2),
            "sha256" => Ok(HasherKind::Sha256),
            other => Err(format!("unknown hasher '{other}' (expected argon2 or sha256)")),
        }
    }
}

/// Argon2id hash of a throwaway password. Logins for unknown accounts verify
/// against it so both outcomes cost one Argon2 verification.
static DUMMY_PASSWORD_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("orbit-unknown-account").ok());

/// Spend one verification on a login that matched no account.
///
/// Always resolves to `Ok(false)` unless the verification itself fails.
pub async fn verify_unknown_account(
    verifier: &dyn CredentialVerifier,
    password: &str,
) -> Result<bool, HashError> {
    let hash = tokio::task::spawn_blocking(|| DUMMY_PASSWORD_HASH.as_deref()).await?;
    if let Some(hash) = hash {
        verifier.verify(password, hash).await?;
    }
    Ok(false)
}

/// Hash a plaintext password using Argon2id with a random salt.
///
/// Returns the PHC-formatted hash string (includes algorithm, params, salt, and hash).
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC-formatted Argon2id hash.
///
/// Returns `Ok(true)` if the password matches, `Ok(false)` if it does not.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Validate that a password meets minimum strength requirements.
pub fn validate_password_strength(password: &str, min_length: usize) -> Result<(), String> {
    if password.chars().count() < min_length {
        return Err(format!(
            "Password must be at least {min_length} characters long"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"), "expected argon2id PHC prefix");

        assert!(verify_password("correct-horse-battery-staple", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("short", 8)
            .unwrap_err()
            .contains("at least 8 characters"));
        assert!(validate_password_strength("exactly8", 8).is_ok());
    }

    #[tokio::test]
    async fn argon2_verifier_round_trips_off_the_runtime() {
        let verifier = Argon2Verifier;
        let hash = verifier.hash("refresh-secret").await.unwrap();
        assert!(verifier.verify("refresh-secret", &hash).await.unwrap());
        assert!(!verifier.verify("other-secret", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn argon2_verifier_rejects_garbage_hash() {
        let result = Argon2Verifier.verify("secret", "not-a-phc-string").await;
        assert!(matches!(result, Err(HashError::Hash(_))));
    }

    #[tokio::test]
    async fn sha256_verifier_matches_only_same_secret() {
        let verifier = Sha256Verifier;
        let hash = verifier.hash("abc").await.unwrap();
        assert_eq!(hash.len(), 64);
        assert!(verifier.verify("abc", &hash).await.unwrap());
        assert!(!verifier.verify("abd", &hash).await.unwrap());
    }

    #[test]
    fn hasher_kind_parses() {
        assert_eq!("argon2".parse::<HasherKind>(), Ok(HasherKind::Argon2));
        assert_eq!("SHA256".parse::<HasherKind>(), Ok(HasherKind::Sha256));
        assert!("md5".parse::<HasherKind>().is_err());
    }

    /// Records the hashes it is asked to verify against.
    #[derive(Default)]
    struct RecordingVerifier {
        seen: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CredentialVerifier for RecordingVerifier {
        async fn hash(&self, secret: &str) -> Result<String, HashError> {
            Argon2Verifier.hash(secret).await
        }

        async fn verify(&self, secret: &str, hash: &str) -> Result<bool, HashError> {
            self.seen.lock().unwrap().push(hash.to_owned());
            Argon2Verifier.verify(secret, hash).await
        }
    }

    #[tokio::test]
    async fn unknown_account_still_pays_for_an_argon2_verify() {
        let verifier = RecordingVerifier::default();

        assert!(!verify_unknown_account(&verifier, "guess").await.unwrap());
        assert!(!verify_unknown_account(&verifier, "orbit-unknown-account")
            .await
            .unwrap());

        let seen = verifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|h| h.starts_with("$argon2id$")));
        assert_eq!(seen[0], seen[1], "the same fixed hash is reused");
    }
}
