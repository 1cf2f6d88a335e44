/// Factory: build `TokenIssuer` from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::services::token::TokenIssuer;
use crate::services::token::keystore::{MemoryKeystore, SigningKey};

pub fn build_issuer(config: &Config) -> Result<TokenIssuer> {
    let mut key = SigningKey::new(&config.key_id, config.algorithm, &config.public_key_pem)?;
    if let Some(pem) = &config.private_key_pem {
        key = key.with_private_key(pem.clone());
    }
    if let Some(passphrase) = &config.private_key_passphrase {
        key = key.with_passphrase(passphrase.clone());
    }

    let keystore = Arc::new(MemoryKeystore::new([key]));

    Ok(TokenIssuer::new(config.issuer.clone(), keystore).with_leeway_seconds(config.leeway_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IssuerError, KeystoreError};
    use crate::services::token::claims::{SignRequest, VerifyExpectation};
    use jsonwebtoken::Algorithm;

    fn config() -> Config {
        Config {
            issuer: "https://issuer.example".into(),
            key_id: "ed-1".into(),
            algorithm: Algorithm::EdDSA,
            private_key_pem: Some(include_str!("../../../tests/fixtures/ed25519_private.pem").into()),
            public_key_pem: include_str!("../../../tests/fixtures/ed25519_public.pem").into(),
            private_key_passphrase: None,
            leeway_seconds: 0,
        }
    }

    #[test]
    fn built_issuer_signs_and_verifies() {
        let issuer = build_issuer(&config()).unwrap();
        assert_eq!(issuer.issuer(), "https://issuer.example");

        let signed = issuer
            .sign(&SignRequest::new("sub", "access_token", "5 minutes").with_audience("api"))
            .unwrap();
        let verified = issuer
            .verify(&signed.token, &VerifyExpectation::default())
            .unwrap();
        assert_eq!(verified.key_id, "ed-1");
        assert_eq!(verified.subject, "sub");
    }

    #[test]
    fn verify_only_config_cannot_sign() {
        let mut config = config();
        config.private_key_pem = None;
        let issuer = build_issuer(&config).unwrap();

        let err = issuer
            .sign(&SignRequest::new("sub", "access_token", "5 minutes").with_audience("api"))
            .unwrap_err();
        assert!(matches!(
            err,
            IssuerError::Keystore(KeystoreError::NoSigningKey)
        ));
    }
}
