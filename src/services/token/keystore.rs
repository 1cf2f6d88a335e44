/*
 * Responsibility
 * - Keystore seam and in-memory implementation
 * - PEM parsing, encrypted PKCS#8 unlock
 */
use std::fmt;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use pkcs8::{EncryptedPrivateKeyInfo, LineEnding, SecretDocument};
use tracing::warn;

use crate::error::KeystoreError;

/// Key material holder consulted by the issuer.
///
/// Implementations must be safe for concurrent reads; keys are never mutated
/// after they are handed out.
pub trait Keystore: Send + Sync {
    /// Current key for new tokens.
    fn signing_key(&self) -> Result<Arc<SigningKey>, KeystoreError>;

    /// Key referenced by a token's `kid` header.
    fn key(&self, key_id: &str) -> Result<Arc<SigningKey>, KeystoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Rsa,
    Ec,
    Okp,
}

impl KeyType {
    pub fn from_algorithm(algorithm: Algorithm) -> Result<Self, KeystoreError> {
        match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Ok(Self::Rsa),
            Algorithm::ES256 | Algorithm::ES384 => Ok(Self::Ec),
            Algorithm::EdDSA => Ok(Self::Okp),
            other => Err(KeystoreError::UnsupportedAlgorithm(other)),
        }
    }
}

/// Asymmetric key pair (or public half only) used to sign and verify tokens.
///
/// - Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct SigningKey {
    id: String,
    algorithm: Algorithm,
    key_type: KeyType,
    private_key_pem: Option<String>,
    passphrase: Option<String>,
    decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("key_type", &self.key_type)
            .field("has_private_key", &self.private_key_pem.is_some())
            .finish()
    }
}

impl SigningKey {
    /// `public_key_pem` is SPKI (or PKCS#1 for RSA) PEM matching `algorithm`.
    pub fn new(
        id: impl Into<String>,
        algorithm: Algorithm,
        public_key_pem: &str,
    ) -> Result<Self, KeystoreError> {
        let id = id.into();
        let key_type = KeyType::from_algorithm(algorithm)?;

        let pem = public_key_pem.as_bytes();
        let decoding_key = match key_type {
            KeyType::Rsa => DecodingKey::from_rsa_pem(pem),
            KeyType::Ec => DecodingKey::from_ec_pem(pem),
            KeyType::Okp => DecodingKey::from_ed_pem(pem),
        }
        .map_err(|e| {
            warn!(key_id = %id, error = %e, "failed to parse public key PEM");
            KeystoreError::InvalidKey {
                id: id.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            id,
            algorithm,
            key_type,
            private_key_pem: None,
            passphrase: None,
            decoding_key,
        })
    }

    /// Attach the private half. PKCS#8 (plain or encrypted) or PKCS#1 PEM.
    pub fn with_private_key(mut self, private_key_pem: impl Into<String>) -> Self {
        self.private_key_pem = Some(private_key_pem.into());
        self
    }

    /// Passphrase for an `ENCRYPTED PRIVATE KEY` PEM.
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn can_sign(&self) -> bool {
        self.private_key_pem.is_some()
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Build the signing material, unlocking the private key with its
    /// passphrase first when one is set.
    pub fn encoding_key(&self) -> Result<EncodingKey, KeystoreError> {
        let pem = self
            .private_key_pem
            .as_deref()
            .ok_or_else(|| KeystoreError::MissingPrivateKey(self.id.clone()))?;

        match self.passphrase.as_deref() {
            Some(passphrase) => {
                let unlocked = self.unlock(pem, passphrase)?;
                let pem = unlocked
                    .to_pem("PRIVATE KEY", LineEnding::LF)
                    .map_err(|e| self.invalid(e))?;
                self.encoding_key_from_pem(pem.as_bytes())
            }
            None => self.encoding_key_from_pem(pem.as_bytes()),
        }
    }

    fn encoding_key_from_pem(&self, pem: &[u8]) -> Result<EncodingKey, KeystoreError> {
        match self.key_type {
            KeyType::Rsa => EncodingKey::from_rsa_pem(pem),
            KeyType::Ec => EncodingKey::from_ec_pem(pem),
            KeyType::Okp => EncodingKey::from_ed_pem(pem),
        }
        .map_err(|e| {
            warn!(key_id = %self.id, error = %e, "failed to parse private key PEM");
            self.invalid(e)
        })
    }

    fn unlock(&self, pem: &str, passphrase: &str) -> Result<SecretDocument, KeystoreError> {
        let (label, document) = pkcs8::Document::from_pem(pem).map_err(|e| self.invalid(e))?;
        if label != "ENCRYPTED PRIVATE KEY" {
            return Err(KeystoreError::InvalidKey {
                id: self.id.clone(),
                reason: format!("passphrase set but PEM label is {label}"),
            });
        }

        let info =
            EncryptedPrivateKeyInfo::try_from(document.as_bytes()).map_err(|e| self.invalid(e))?;

        info.decrypt(passphrase).map_err(|e| {
            warn!(key_id = %self.id, error = %e, "failed to decrypt private key");
            KeystoreError::Passphrase(self.id.clone())
        })
    }

    fn invalid(&self, e: impl fmt::Display) -> KeystoreError {
        KeystoreError::InvalidKey {
            id: self.id.clone(),
            reason: e.to_string(),
        }
    }
}

/// Fixed set of keys held in memory.
///
/// The first key carrying private material is the signing key.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeystore {
    keys: Vec<Arc<SigningKey>>,
}

impl MemoryKeystore {
    pub fn new(keys: impl IntoIterator<Item = SigningKey>) -> Self {
        Self {
            keys: keys.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Keystore for MemoryKeystore {
    fn signing_key(&self) -> Result<Arc<SigningKey>, KeystoreError> {
        self.keys
            .iter()
            .find(|k| k.can_sign())
            .cloned()
            .ok_or(KeystoreError::NoSigningKey)
    }

    fn key(&self, key_id: &str) -> Result<Arc<SigningKey>, KeystoreError> {
        self.keys
            .iter()
            .find(|k| k.id() == key_id)
            .cloned()
            .ok_or_else(|| KeystoreError::KeyNotFound(key_id.to_string()))
    }
}
