use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use orbit_db::PoolSettings;

use crate::auth::jwt::JwtConfig;
use crate::auth::password::HasherKind;
use crate::auth::session::SessionPolicy;

/// Configuration could not be loaded from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Server configuration loaded from environment variables.
///
/// All fields except the database URL and signing keys have defaults
/// suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Pool size and acquire timeout.
    pub db: PoolSettings,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Access-token signing configuration.
    pub jwt: JwtConfig,
    /// Refresh window and revocation retry policy.
    pub session: SessionPolicy,
    /// Hash function applied to refresh secrets.
    pub refresh_hasher: HasherKind,
    /// Minimum accepted password length at registration (default: `8`).
    pub password_min_length: usize,
    /// Period of the expired-session cleanup job (default: one hour).
    pub cleanup_interval: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                    |
    /// |---------------------------------|----------------------------|
    /// | `HOST`                          | `0.0.0.0`                  |
    /// | `PORT`                          | `8080`                     |
    /// | `DATABASE_URL`                  | -- (required)              |
    /// | `DB_MAX_CONNECTIONS`            | `20`                       |
    /// | `DB_ACQUIRE_TIMEOUT_SECS`       | `5`                        |
    /// | `CORS_ORIGINS`                  | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`          | `30`                       |
    /// | `REFRESH_SECRET_HASHER`         | `argon2`                   |
    /// | `PASSWORD_MIN_LENGTH`           | `8`                        |
    /// | `SESSION_CLEANUP_INTERVAL_SECS` | `3600`                     |
    ///
    /// Signing and session settings are documented on [`JwtConfig::from_env`]
    /// and [`SessionPolicy::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_or("PORT", 8080)?;
        let database_url = required("DATABASE_URL")?;

        let db = PoolSettings {
            max_connections: env_or("DB_MAX_CONNECTIONS", 20)?,
            acquire_timeout: Duration::from_secs(env_or("DB_ACQUIRE_TIMEOUT_SECS", 5)?),
        };

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port,
            database_url,
            db,
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30)?,
            jwt: JwtConfig::from_env()?,
            session: SessionPolicy::from_env()?,
            refresh_hasher: env_or("REFRESH_SECRET_HASHER", HasherKind::Argon2)?,
            password_min_length: env_or("PASSWORD_MIN_LENGTH", 8)?,
            cleanup_interval: positive_secs("SESSION_CLEANUP_INTERVAL_SECS", 3600)?,
        })
    }
}

/// Read a required, non-empty environment variable.
pub(crate) fn required(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

/// Parse an environment variable, falling back to `default` when unset.
pub(crate) fn env_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse a period in whole seconds that must be greater than zero.
pub(crate) fn positive_secs(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env_or(name, default)? {
        0 => Err(ConfigError::Invalid {
            name,
            reason: "must be positive".into(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_uses_default_when_unset() {
        let value: u64 = env_or("ORBIT_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn required_rejects_missing() {
        let err = required("ORBIT_TEST_UNSET_VARIABLE").unwrap_err();
        assert!(matches!(err, ConfigError::Missing("ORBIT_TEST_UNSET_VARIABLE")));
    }

    #[test]
    fn positive_secs_rejects_zero() {
        std::env::set_var("ORBIT_TEST_ZERO_INTERVAL", "0");
        let err = positive_secs("ORBIT_TEST_ZERO_INTERVAL", 3600).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "ORBIT_TEST_ZERO_INTERVAL",
                ..
            }
        ));

        std::env::set_var("ORBIT_TEST_NEGATIVE_INTERVAL", "-5");
        assert!(positive_secs("ORBIT_TEST_NEGATIVE_INTERVAL", 3600).is_err());
    }

    #[test]
    fn positive_secs_accepts_default_and_explicit_values() {
        let period = positive_secs("ORBIT_TEST_UNSET_VARIABLE", 3600).unwrap();
        assert_eq!(period, Duration::from_secs(3600));

        std::env::set_var("ORBIT_TEST_SHORT_INTERVAL", "15");
        let period = positive_secs("ORBIT_TEST_SHORT_INTERVAL", 3600).unwrap();
        assert_eq!(period, Duration::from_secs(15));
    }
}
