/*
 * Responsibility
 * - Load issuer settings from the environment (.env honoured)
 * - Validate values up front (missing or unparseable keys fail the load)
 */
use std::fmt;
use std::str::FromStr;

use jsonwebtoken::Algorithm;

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub issuer: String,
    pub key_id: String,
    pub algorithm: Algorithm,
    // Absent on verify-only deployments.
    pub private_key_pem: Option<String>,
    pub public_key_pem: String,
    pub private_key_passphrase: Option<String>,
    pub leeway_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("Config")
            .field("issuer", &self.issuer)
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("has_private_key", &self.private_key_pem.is_some())
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same parsing as `from_env`, over an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let issuer = lookup("TOKEN_ISSUER")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("TOKEN_ISSUER"))?;

        let key_id = lookup("TOKEN_KEY_ID")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("TOKEN_KEY_ID"))?;

        let algorithm = match lookup("TOKEN_KEY_ALGORITHM") {
            Some(s) => Algorithm::from_str(s.trim())
                .map_err(|_| ConfigError::Invalid("TOKEN_KEY_ALGORITHM"))?,
            None => Algorithm::RS256,
        };

        let private_key_pem = lookup("TOKEN_PRIVATE_KEY_PEM").map(|s| s.replace("\\n", "\n"));

        let public_key_pem = lookup("TOKEN_PUBLIC_KEY_PEM")
            .ok_or(ConfigError::Missing("TOKEN_PUBLIC_KEY_PEM"))?
            .replace("\\n", "\n");

        let private_key_passphrase =
            lookup("TOKEN_PRIVATE_KEY_PASSPHRASE").filter(|s| !s.is_empty());

        let leeway_seconds = match lookup("TOKEN_LEEWAY_SECONDS") {
            Some(s) => s
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("TOKEN_LEEWAY_SECONDS"))?,
            None => 0,
        };

        Ok(Self {
            issuer,
            key_id,
            algorithm,
            private_key_pem,
            public_key_pem,
            private_key_passphrase,
            leeway_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_required_values_and_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("TOKEN_ISSUER", "https://issuer.example"),
            ("TOKEN_KEY_ID", "key-1"),
            ("TOKEN_PUBLIC_KEY_PEM", "-----BEGIN PUBLIC KEY-----\\nabc\\n-----END PUBLIC KEY-----"),
        ]))
        .unwrap();

        assert_eq!(config.issuer, "https://issuer.example");
        assert_eq!(config.key_id, "key-1");
        assert_eq!(config.algorithm, Algorithm::RS256);
        assert_eq!(config.leeway_seconds, 0);
        assert!(config.private_key_pem.is_none());
        assert!(config.public_key_pem.contains('\n'));
    }

    #[test]
    fn parses_algorithm_and_leeway() {
        let config = Config::from_lookup(lookup(&[
            ("TOKEN_ISSUER", "iss"),
            ("TOKEN_KEY_ID", "kid"),
            ("TOKEN_KEY_ALGORITHM", "ES256"),
            ("TOKEN_PUBLIC_KEY_PEM", "pem"),
            ("TOKEN_LEEWAY_SECONDS", "30"),
            ("TOKEN_PRIVATE_KEY_PASSPHRASE", ""),
        ]))
        .unwrap();

        assert_eq!(config.algorithm, Algorithm::ES256);
        assert_eq!(config.leeway_seconds, 30);
        assert!(config.private_key_passphrase.is_none());
    }

    #[test]
    fn missing_issuer_is_reported() {
        let err = Config::from_lookup(lookup(&[("TOKEN_KEY_ID", "kid")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("TOKEN_ISSUER")));
    }

    #[test]
    fn invalid_algorithm_is_reported() {
        let err = Config::from_lookup(lookup(&[
            ("TOKEN_ISSUER", "iss"),
            ("TOKEN_KEY_ID", "kid"),
            ("TOKEN_KEY_ALGORITHM", "none"),
            ("TOKEN_PUBLIC_KEY_PEM", "pem"),
        ]))
        .unwrap_err();
        assert_eq!(err.to_string(), "invalid configuration: TOKEN_KEY_ALGORITHM");
    }

    #[test]
    fn debug_hides_key_material() {
        let config = Config::from_lookup(lookup(&[
            ("TOKEN_ISSUER", "iss"),
            ("TOKEN_KEY_ID", "kid"),
            ("TOKEN_PUBLIC_KEY_PEM", "pem"),
            ("TOKEN_PRIVATE_KEY_PEM", "super-secret"),
        ]))
        .unwrap();
        assert!(!format!("{:?}", config).contains("super-secret"));
    }
}
