/*
 * Responsibility
 * - Unverified decode
 * - Verify pipeline (key lookup, signature, standard and application claims)
 */
//! Token decoding and verification.
//!
//! `verify` runs as a single pass: decode, key lookup, signature and standard
//! claims, application assertions, reshape. The first failing stage ends the
//! call with a `TokenError`; nothing partial is returned.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::Validation;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::error::{IssuerError, Result, TokenError, TokenErrorReason};
use crate::services::token::claims::{
    CanonicalClaims, DecodedToken, VerifyExpectation, VerifyResult,
};
use crate::services::token::issuer::TokenIssuer;
use crate::services::token::keystore::SigningKey;
use crate::services::token::sanitize::sanitize_token;

fn malformed(description: &str) -> TokenError {
    TokenError::new(TokenErrorReason::Malformed, description)
}

/// Parse header and claims without checking the signature.
pub fn decode(token: &str) -> std::result::Result<DecodedToken, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(malformed("token can not be decoded")
            .with_debug(json!({ "segments": segments.len() })));
    }

    let header = jsonwebtoken::decode_header(token)
        .map_err(|e| malformed("token can not be decoded").with_source(e))?;

    let key_id = header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or_else(|| malformed("token header has no key id"))?;

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1])
        .map_err(|e| malformed("token can not be decoded").with_source(e))?;

    let claims: CanonicalClaims = serde_json::from_slice(&payload)
        .map_err(|e| malformed("token claims can not be decoded").with_source(e))?;

    Ok(DecodedToken {
        key_id,
        algorithm: header.alg,
        claims,
    })
}

impl TokenIssuer {
    /// See [`decode`].
    pub fn decode(token: &str) -> std::result::Result<DecodedToken, TokenError> {
        decode(token)
    }

    /// Verify a token and reshape its claims for application use.
    ///
    /// `expectation.issuer` falls back to this issuer's name. Every failure is
    /// an `IssuerError::InvalidToken`; inspect `TokenError::reason` for detail.
    pub fn verify(&self, token: &str, expectation: &VerifyExpectation) -> Result<VerifyResult> {
        let issuer = expectation.issuer.as_deref().unwrap_or(&self.issuer);

        info!(
            audience = ?expectation.audience,
            issuer,
            client_id = ?expectation.client_id,
            device_id = ?expectation.device_id,
            token = %sanitize_token(token),
            "verify token"
        );

        self.run_verify(token, expectation, issuer).map_err(|e| {
            warn!(
                reason = ?e.reason(),
                description = e.description(),
                debug = ?e.debug(),
                cause = ?std::error::Error::source(&e),
                token = %sanitize_token(token),
                "token verification failed"
            );
            IssuerError::InvalidToken(e)
        })
    }

    fn run_verify(
        &self,
        token: &str,
        expectation: &VerifyExpectation,
        issuer: &str,
    ) -> std::result::Result<VerifyResult, TokenError> {
        let decoded = decode(token)?;

        let key = self.keystore.key(&decoded.key_id).map_err(|e| {
            TokenError::new(TokenErrorReason::UnknownKey, "signing key not found")
                .with_debug(json!({ "keyId": decoded.key_id }))
                .with_source(e)
        })?;

        debug!(key_id = %key.id(), algorithm = ?key.algorithm(), "verifying token signature");
        let claims = verify_signature(token, &key)?;

        let now = self.clock.now();
        check_standard_claims(&claims, expectation, issuer, now, self.leeway_seconds)?;
        check_application_claims(&claims, expectation)?;

        debug!(token_id = %claims.jti, "token verified");

        VerifyResult::reshape(
            DecodedToken {
                key_id: decoded.key_id,
                algorithm: decoded.algorithm,
                claims,
            },
            token,
        )
    }
}

/// Signature and algorithm check. Temporal claims are left to
/// `check_standard_claims` so they follow the issuer's clock.
fn verify_signature(
    token: &str,
    key: &SigningKey,
) -> std::result::Result<CanonicalClaims, TokenError> {
    let mut validation = Validation::new(key.algorithm());
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<CanonicalClaims>(token, key.decoding_key(), &validation)
        .map(|data| data.claims)
        .map_err(TokenError::from_jwt)
}

fn exact_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

// Case and surrounding whitespace are ignored.
fn tolerant_eq(a: &str, b: &str) -> bool {
    exact_eq(
        &a.trim().to_ascii_lowercase(),
        &b.trim().to_ascii_lowercase(),
    )
}

pub(crate) fn check_standard_claims(
    claims: &CanonicalClaims,
    expectation: &VerifyExpectation,
    issuer: &str,
    now: DateTime<Utc>,
    leeway_seconds: u64,
) -> std::result::Result<(), TokenError> {
    let now = now.timestamp();
    let leeway = i64::try_from(leeway_seconds).unwrap_or(i64::MAX);

    if now >= claims.exp.saturating_add(leeway) {
        return Err(
            TokenError::new(TokenErrorReason::Expired, "token is expired")
                .with_debug(json!({ "expires": claims.exp, "now": now })),
        );
    }

    if claims.nbf > now.saturating_add(leeway) {
        return Err(
            TokenError::new(TokenErrorReason::NotYetValid, "token is not yet valid")
                .with_debug(json!({ "notBefore": claims.nbf, "now": now })),
        );
    }

    if !expectation.audience.is_empty()
        && !expectation.audience.iter().any(|a| claims.aud.contains(a))
    {
        return Err(
            TokenError::new(TokenErrorReason::Audience, "invalid audience").with_debug(json!({
                "expected": expectation.audience,
                "actual": claims.aud,
            })),
        );
    }

    if !exact_eq(&claims.iss, issuer) {
        return Err(
            TokenError::new(TokenErrorReason::Issuer, "invalid issuer")
                .with_debug(json!({ "expected": issuer, "actual": claims.iss })),
        );
    }

    if let Some(subject) = expectation.subject.as_deref() {
        if !exact_eq(&claims.sub, subject) {
            return Err(
                TokenError::new(TokenErrorReason::Subject, "invalid subject")
                    .with_debug(json!({ "expected": subject, "actual": claims.sub })),
            );
        }
    }

    if let Some(nonce) = expectation.nonce.as_deref() {
        let matches = claims
            .nonce
            .as_deref()
            .is_some_and(|actual| exact_eq(actual, nonce));
        if !matches {
            return Err(TokenError::new(TokenErrorReason::Nonce, "invalid nonce"));
        }
    }

    if let Some(max_age) = expectation.max_age {
        let oldest = claims
            .iat
            .saturating_add(max_age.num_seconds())
            .saturating_add(leeway);
        if now >= oldest {
            return Err(
                TokenError::new(TokenErrorReason::MaxAge, "token exceeds max age").with_debug(
                    json!({
                        "issuedAt": claims.iat,
                        "maxAgeSeconds": max_age.num_seconds(),
                        "now": now,
                    }),
                ),
            );
        }
    }

    Ok(())
}

pub(crate) fn check_application_claims(
    claims: &CanonicalClaims,
    expectation: &VerifyExpectation,
) -> std::result::Result<(), TokenError> {
    if let (Some(expected), Some(actual)) = (&expectation.client_id, &claims.client_id) {
        if !tolerant_eq(expected, actual) {
            return Err(
                TokenError::new(TokenErrorReason::ClientId, "invalid client identifier")
                    .with_debug(json!({ "expected": expected, "actual": actual })),
            );
        }
    }

    if let (Some(expected), Some(actual)) = (&expectation.device_id, &claims.device_id) {
        if !tolerant_eq(expected, actual) {
            return Err(
                TokenError::new(TokenErrorReason::DeviceId, "invalid device identifier")
                    .with_debug(json!({ "expected": expected, "actual": actual })),
            );
        }
    }

    if !expectation.scopes.is_empty() {
        let scopes = claims.scopes();
        if scopes.is_empty() {
            return Err(TokenError::new(
                TokenErrorReason::ScopeMissing,
                "scope claim not found on token",
            )
            .with_debug(json!({ "expected": expectation.scopes })));
        }

        if let Some(missing) = expectation.scopes.iter().find(|s| !scopes.contains(*s)) {
            return Err(TokenError::new(
                TokenErrorReason::ScopeNotFound,
                "expected scope not found",
            )
            .with_debug(json!({
                "missing": missing,
                "expected": expectation.scopes,
                "actual": scopes,
            })));
        }
    }

    if let Some(expected) = expectation.token_type.as_deref() {
        if !claims.token_type.is_empty() && !tolerant_eq(expected, &claims.token_type) {
            return Err(
                TokenError::new(TokenErrorReason::TokenType, "invalid token type").with_debug(
                    json!({ "expected": expected, "actual": claims.token_type }),
                ),
            );
        }
    }

    Ok(())
}
