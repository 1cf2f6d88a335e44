//! Issue and verify signed, time-bounded identity tokens.
//!
//! A [`TokenIssuer`] turns a [`SignRequest`] into a compact JWS whose claims
//! follow a fixed schema, and verifies such tokens back into a
//! [`VerifyResult`], enforcing audience, issuer, subject, scope, type, client
//! and device expectations on the way.

pub mod config;
pub mod error;
pub mod services;

pub use config::{Config, ConfigError};
pub use error::{ExpiryError, IssuerError, KeystoreError, Result, TokenError, TokenErrorReason};
pub use services::token::{
    CanonicalClaims, Clock, DecodedToken, Expiry, KeyType, Keystore, ManualClock, MemoryKeystore,
    Permission, Scope, SignRequest, SignedToken, SigningKey, SystemClock, TokenIssuer,
    VerifyExpectation, VerifyResult, build_issuer, has_scope, is_valid_scope, parse_duration,
    resolve_expiry, sanitize_token, split_claim, to_app_case, to_wire_case,
};
