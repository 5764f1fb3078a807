//! Refresh credential wire format and secret generation.
//!
//! A refresh credential is the opaque string `<rotation_id>.<secret>`:
//!
//! - `rotation_id` is a hyphenated lowercase UUID naming the session's
//!   current rotation. It is the lookup key on the server.
//! - `secret` is [`SECRET_BYTES`] random bytes, hex encoded. Only a hash of it
//!   is ever persisted; the plaintext crosses the wire once, at issuance.

use rand::Rng;
use uuid::Uuid;

use crate::hashing::hex_encode;

/// Separator between the rotation id and the secret.
pub const SEPARATOR: char = '.';

/// Number of random bytes in a refresh secret (512 bits).
pub const SECRET_BYTES: usize = 64;

/// Length of the hex-encoded secret.
pub const SECRET_HEX_LEN: usize = SECRET_BYTES * 2;

/// Length of a hyphenated UUID.
const ROTATION_ID_LEN: usize = 36;

/// Why a presented refresh credential could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MalformedCredential {
    #[error("refresh credential is missing the '.' separator")]
    MissingSeparator,
    #[error("refresh credential has an invalid rotation id")]
    InvalidRotationId,
    #[error("refresh credential has an invalid secret")]
    InvalidSecret,
}

/// A parsed or freshly generated refresh credential.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshCredential {
    rotation_id: Uuid,
    secret: String,
}

impl RefreshCredential {
    /// Generate a new rotation id and a new random secret.
    pub fn generate() -> Self {
        Self {
            rotation_id: Uuid::new_v4(),
            secret: generate_secret(),
        }
    }

    /// Parse `<rotation_id>.<secret>`.
    ///
    /// The shape is checked strictly: a hyphenated UUID, the separator, and
    /// exactly [`SECRET_HEX_LEN`] lowercase hex characters.
    pub fn parse(raw: &str) -> Result<Self, MalformedCredential> {
        let (id, secret) = raw
            .split_once(SEPARATOR)
            .ok_or(MalformedCredential::MissingSeparator)?;

        if id.len() != ROTATION_ID_LEN {
            return Err(MalformedCredential::InvalidRotationId);
        }
        let rotation_id =
            Uuid::parse_str(id).map_err(|_| MalformedCredential::InvalidRotationId)?;

        let well_formed = secret.len() == SECRET_HEX_LEN
            && secret
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(MalformedCredential::InvalidSecret);
        }

        Ok(Self {
            rotation_id,
            secret: secret.to_string(),
        })
    }

    pub fn rotation_id(&self) -> Uuid {
        self.rotation_id
    }

    /// The plaintext secret. Hash it before storing; never log it.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Render the credential in its transmitted form.
    pub fn encode(&self) -> String {
        format!("{}{SEPARATOR}{}", self.rotation_id.hyphenated(), self.secret)
    }
}

impl std::fmt::Debug for RefreshCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCredential")
            .field("rotation_id", &self.rotation_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Generate a random hex-encoded refresh secret.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill(&mut bytes[..]);
    hex_encode(&bytes)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn generated_credential_parses_back() {
        let credential = RefreshCredential::generate();
        let encoded = credential.encode();

        let parsed = RefreshCredential::parse(&encoded).expect("generated credential must parse");
        assert_eq!(parsed, credential);
        assert_eq!(parsed.secret().len(), SECRET_HEX_LEN);
    }

    #[test]
    fn generated_secrets_are_unique() {
        let a = RefreshCredential::generate();
        let b = RefreshCredential::generate();
        assert_ne!(a.rotation_id(), b.rotation_id());
        assert_ne!(a.secret(), b.secret());
    }

    #[test]
    fn rejects_missing_separator() {
        assert_matches!(
            RefreshCredential::parse("not-a-real-token"),
            Err(MalformedCredential::MissingSeparator)
        );
        assert_matches!(
            RefreshCredential::parse(""),
            Err(MalformedCredential::MissingSeparator)
        );
    }

    #[test]
    fn rejects_bad_rotation_id() {
        let secret = generate_secret();
        assert_matches!(
            RefreshCredential::parse(&format!("nope.{secret}")),
            Err(MalformedCredential::InvalidRotationId)
        );
        // Simple (unhyphenated) form is not accepted.
        let simple = Uuid::new_v4().simple().to_string();
        assert_matches!(
            RefreshCredential::parse(&format!("{simple}.{secret}")),
            Err(MalformedCredential::InvalidRotationId)
        );
    }

    #[test]
    fn rejects_bad_secret() {
        let id = Uuid::new_v4();
        assert_matches!(
            RefreshCredential::parse(&format!("{id}.abc")),
            Err(MalformedCredential::InvalidSecret)
        );
        let upper = generate_secret().to_uppercase();
        assert_matches!(
            RefreshCredential::parse(&format!("{id}.{upper}")),
            Err(MalformedCredential::InvalidSecret)
        );
        let extra = format!("{id}.{}.x", generate_secret());
        assert_matches!(
            RefreshCredential::parse(&extra),
            Err(MalformedCredential::InvalidSecret)
        );
    }

    #[test]
    fn debug_output_redacts_secret() {
        let credential = RefreshCredential::generate();
        let debug = format!("{credential:?}");
        assert!(!debug.contains(credential.secret()));
        assert!(debug.contains("<redacted>"));
    }
}
