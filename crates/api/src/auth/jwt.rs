//! Access-token signing and verification.
//!
//! Access tokens are short-lived JWTs carrying [`AccessClaims`]. The signing
//! algorithm is chosen once at startup: a shared secret for the `HS*` family
//! or a PEM key pair for `RS*`, `PS*`, `ES*`, and `EdDSA`. Verification only
//! accepts the configured algorithm, so a token whose header names a
//! different one is rejected before its signature is considered.

use std::fmt;
use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use orbit_core::roles::Role;
use orbit_core::types::DbId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{env_or, required, ConfigError};

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;

/// JWT claims embedded in every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// The user's role at issuance.
    pub role: Role,
    /// Rotation id of the session this token was issued under. The access
    /// guard resolves it to check the session is still live.
    pub rid: Uuid,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
}

/// Key material for the configured algorithm.
#[derive(Clone)]
pub enum KeyMaterial {
    /// Shared secret for `HS256` / `HS384` / `HS512`.
    Secret(String),
    /// PEM-encoded private and public keys for asymmetric algorithms.
    KeyPair { private_pem: String, public_pem: String },
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Secret(_) => f.write_str("Secret(<redacted>)"),
            KeyMaterial::KeyPair { .. } => f.write_str("KeyPair(<redacted>)"),
        }
    }
}

/// Configuration for access-token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub algorithm: Algorithm,
    pub key: KeyMaterial,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
    /// Clock-skew tolerance applied to `exp` (default: 0).
    pub leeway_secs: u64,
}

impl JwtConfig {
    /// HS256 configuration with default lifetimes.
    pub fn hmac(secret: impl Into<String>) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            key: KeyMaterial::Secret(secret.into()),
            access_token_expiry_mins: DEFAULT_ACCESS_EXPIRY_MINS,
            leeway_secs: 0,
        }
    }

    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                    | Required          | Default |
    /// |----------------------------|-------------------|---------|
    /// | `JWT_ALGORITHM`            | no                | `HS256` |
    /// | `JWT_SECRET`               | for `HS*`         | --      |
    /// | `JWT_PRIVATE_KEY_PEM`      | for asymmetric    | --      |
    /// | `JWT_PUBLIC_KEY_PEM`       | for asymmetric    | --      |
    /// | `ACCESS_TOKEN_EXPIRY_MINS` | no                | `15`    |
    /// | `JWT_LEEWAY_SECS`          | no                | `0`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        let algorithm: Algorithm = env_or("JWT_ALGORITHM", Algorithm::HS256)?;

        let key = if is_hmac(algorithm) {
            KeyMaterial::Secret(required("JWT_SECRET")?)
        } else {
            KeyMaterial::KeyPair {
                private_pem: required("JWT_PRIVATE_KEY_PEM")?,
                public_pem: required("JWT_PUBLIC_KEY_PEM")?,
            }
        };

        let access_token_expiry_mins: i64 =
            env_or("ACCESS_TOKEN_EXPIRY_MINS", DEFAULT_ACCESS_EXPIRY_MINS)?;
        if access_token_expiry_mins <= 0 {
            return Err(ConfigError::Invalid {
                name: "ACCESS_TOKEN_EXPIRY_MINS",
                reason: "must be positive".into(),
            });
        }

        Ok(Self {
            algorithm,
            key,
            access_token_expiry_mins,
            leeway_secs: env_or("JWT_LEEWAY_SECS", 0)?,
        })
    }
}

fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// An access token could not be accepted.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("access token expired")]
    Expired,

    #[error("access token rejected: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

/// The configured key material does not fit the configured algorithm.
#[derive(Debug, thiserror::Error)]
#[error("invalid {algorithm:?} key material: {source}")]
pub struct KeyError {
    algorithm: Algorithm,
    #[source]
    source: jsonwebtoken::errors::Error,
}

/// A freshly signed access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub claims: AccessClaims,
}

impl AccessToken {
    /// Seconds until expiry, measured from issuance.
    pub fn expires_in(&self) -> i64 {
        self.claims.exp - self.claims.iat
    }
}

/// Signs and verifies access tokens.
///
/// Cheap to clone; keys are shared behind `Arc`. Holds no mutable state.
#[derive(Clone)]
pub struct TokenSigner {
    algorithm: Algorithm,
    access_ttl_secs: i64,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl TokenSigner {
    /// Build a signer, parsing the key material for the configured algorithm.
    pub fn new(config: &JwtConfig) -> Result<Self, KeyError> {
        let algorithm = config.algorithm;
        let key_error = |source: jsonwebtoken::errors::Error| KeyError { algorithm, source };

        let (encoding_key, decoding_key) = match &config.key {
            KeyMaterial::Secret(secret) => (
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
            ),
            KeyMaterial::KeyPair {
                private_pem,
                public_pem,
            } => {
                let (private_pem, public_pem) = (private_pem.as_bytes(), public_pem.as_bytes());
                match algorithm {
                    Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512 => (
                        EncodingKey::from_rsa_pem(private_pem).map_err(key_error)?,
                        DecodingKey::from_rsa_pem(public_pem).map_err(key_error)?,
                    ),
                    Algorithm::ES256 | Algorithm::ES384 => (
                        EncodingKey::from_ec_pem(private_pem).map_err(key_error)?,
                        DecodingKey::from_ec_pem(public_pem).map_err(key_error)?,
                    ),
                    Algorithm::EdDSA => (
                        EncodingKey::from_ed_pem(private_pem).map_err(key_error)?,
                        DecodingKey::from_ed_pem(public_pem).map_err(key_error)?,
                    ),
                    Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                        return Err(key_error(ErrorKind::InvalidKeyFormat.into()));
                    }
                }
            }
        };

        if !is_hmac(algorithm) && matches!(config.key, KeyMaterial::Secret(_)) {
            return Err(key_error(ErrorKind::InvalidKeyFormat.into()));
        }

        let mut validation = Validation::new(algorithm);
        validation.leeway = config.leeway_secs;

        Ok(Self {
            algorithm,
            access_ttl_secs: config.access_token_expiry_mins * 60,
            encoding_key: Arc::new(encoding_key),
            decoding_key: Arc::new(decoding_key),
            validation: Arc::new(validation),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Issue an access token for a session's current rotation.
    pub fn issue(
        &self,
        user_id: DbId,
        role: Role,
        rotation_id: Uuid,
    ) -> Result<AccessToken, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user_id,
            role,
            rid: rotation_id,
            iat: now,
            exp: now + self.access_ttl_secs,
        };
        let token = self.sign(&claims)?;
        Ok(AccessToken { token, claims })
    }

    /// Sign arbitrary claims; `claims.exp` is taken as given.
    pub fn sign(&self, claims: &AccessClaims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
    }

    /// Validate and decode an access token.
    ///
    /// Rejects bad signatures, any `alg` other than the configured one, and
    /// tokens whose `exp` has passed.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, SignatureError> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => SignatureError::Expired,
                _ => SignatureError::Invalid(err),
            })
    }
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("algorithm", &self.algorithm)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .finish_non_exhaustive()
    }
}
