/*
 * Responsibility
 * - Error taxonomy for sign / verify / keystore / config
 * - Map jsonwebtoken failures onto TokenErrorReason by kind
 */
use std::error::Error as StdError;
use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, IssuerError>;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum IssuerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid expiry: {0}")]
    InvalidExpiry(#[from] ExpiryError),

    #[error(transparent)]
    InvalidToken(#[from] TokenError),

    #[error(transparent)]
    Keystore(#[from] KeystoreError),

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl IssuerError {
    /// Borrow the wrapped `TokenError` when this is a verify-path failure.
    pub fn as_token_error(&self) -> Option<&TokenError> {
        match self {
            Self::InvalidToken(e) => Some(e),
            _ => None,
        }
    }
}

/// Rejected expiry input. Only raised while signing.
#[derive(Debug, Error)]
pub enum ExpiryError {
    #[error("expiry is not in seconds, got {value}")]
    NotInSeconds { value: i64 },

    #[error("expiry {expires} is not after current time {now}")]
    BeforeNow {
        expires: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("unrecognised duration: {0:?}")]
    InvalidDuration(String),

    #[error("expiry must be a duration string, unix seconds or an instant, got {0}")]
    UnsupportedType(String),

    #[error("expiry is out of range")]
    OutOfRange,
}

#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("keystore has no key usable for signing")]
    NoSigningKey,

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("unsupported key algorithm: {0:?}")]
    UnsupportedAlgorithm(jsonwebtoken::Algorithm),

    #[error("key {0} has no private key material")]
    MissingPrivateKey(String),

    #[error("key {id} is invalid: {reason}")]
    InvalidKey { id: String, reason: String },

    #[error("failed to decrypt private key {0} with its passphrase")]
    Passphrase(String),
}

/// Why a token was rejected.
///
/// Callers that only care about "valid or not" can ignore this and match on
/// `TokenError` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenErrorReason {
    Malformed,
    UnknownKey,
    Signature,
    Expired,
    NotYetValid,
    Audience,
    Issuer,
    Subject,
    Nonce,
    MaxAge,
    ClientId,
    DeviceId,
    ScopeMissing,
    ScopeNotFound,
    TokenType,
}

/// The single "invalid token" error raised on the verify path.
#[derive(Debug)]
pub struct TokenError {
    reason: TokenErrorReason,
    description: String,
    debug: Option<serde_json::Value>,
    source: Option<BoxError>,
}

impl TokenError {
    pub fn new(reason: TokenErrorReason, description: impl Into<String>) -> Self {
        Self {
            reason,
            description: description.into(),
            debug: None,
            source: None,
        }
    }

    pub fn with_debug(mut self, debug: serde_json::Value) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn reason(&self) -> TokenErrorReason {
        self.reason
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Expected vs. actual values for diagnostics. Never contains key material.
    pub fn debug(&self) -> Option<&serde_json::Value> {
        self.debug.as_ref()
    }

    /// Map a `jsonwebtoken` failure onto a reason by inspecting its kind.
    pub(crate) fn from_jwt(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        let (reason, description) = match e.kind() {
            ErrorKind::InvalidSignature => (TokenErrorReason::Signature, "invalid signature"),
            ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
                (TokenErrorReason::Signature, "invalid algorithm")
            }
            ErrorKind::ExpiredSignature => (TokenErrorReason::Expired, "token is expired"),
            ErrorKind::ImmatureSignature => {
                (TokenErrorReason::NotYetValid, "token is not yet valid")
            }
            ErrorKind::InvalidAudience => (TokenErrorReason::Audience, "invalid audience"),
            ErrorKind::InvalidIssuer => (TokenErrorReason::Issuer, "invalid issuer"),
            ErrorKind::InvalidSubject => (TokenErrorReason::Subject, "invalid subject"),
            _ => (TokenErrorReason::Malformed, "token can not be decoded"),
        };

        Self::new(reason, description).with_source(e)
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid token: {}", self.description)
    }
}

impl StdError for TokenError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}
