/*
 * Responsibility
 * - TokenIssuer construction
 * - Token signing (claims assembly, kid header, encode)
 */
use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use jsonwebtoken::Header;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{IssuerError, Result};
use crate::services::token::claims::{CanonicalClaims, SignRequest, SignedToken};
use crate::services::token::clock::{Clock, SystemClock};
use crate::services::token::expiry::resolve_expiry;
use crate::services::token::keystore::Keystore;
use crate::services::token::sanitize::sanitize_token;

/// Signs tokens with the keystore's current key and verifies tokens signed by
/// any key it holds.
///
/// Holds only immutable configuration, so one instance can be shared across
/// threads behind an `Arc` (or cloned; clones share the keystore and clock).
#[derive(Clone)]
pub struct TokenIssuer {
    pub(crate) issuer: String,
    pub(crate) keystore: Arc<dyn Keystore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) leeway_seconds: u64,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl TokenIssuer {
    pub fn new(issuer: impl Into<String>, keystore: Arc<dyn Keystore>) -> Self {
        Self {
            issuer: issuer.into(),
            keystore,
            clock: Arc::new(SystemClock),
            leeway_seconds: 0,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Clock skew tolerated on `exp`, `nbf` and max age.
    pub fn with_leeway_seconds(mut self, leeway_seconds: u64) -> Self {
        self.leeway_seconds = leeway_seconds;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a token.
    ///
    /// - `audience` must hold at least one non-empty value and `subject` must be non-empty.
    /// - `id` defaults to a random UUID v4, `not_before` to now.
    pub fn sign(&self, request: &SignRequest) -> Result<SignedToken> {
        debug!(
            subject = %request.subject,
            audience = ?request.audience,
            token_type = %request.token_type,
            "sign token"
        );

        if request.audience.is_empty() || request.audience.iter().any(|a| a.trim().is_empty()) {
            return Err(IssuerError::InvalidRequest(
                "audience must not be empty".to_string(),
            ));
        }
        if request.subject.trim().is_empty() {
            return Err(IssuerError::InvalidRequest(
                "subject must not be empty".to_string(),
            ));
        }

        let id = request
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let now = self.clock.now();
        let expires = resolve_expiry(&request.expiry, now)?;
        let not_before = request.not_before.unwrap_or(now);

        debug!(token_id = %id, expires = %expires, not_before = %not_before, "creating claims object");

        let claims =
            CanonicalClaims::assemble(request, &self.issuer, id.clone(), now, not_before, expires);
        let expires_in = claims.exp - claims.iat;

        let key = self.keystore.signing_key()?;
        debug!(key_id = %key.id(), algorithm = ?key.algorithm(), "using keystore signing key");
        let encoding_key = key.encoding_key()?;

        let mut header = Header::new(key.algorithm());
        header.typ = Some("JWT".to_string());
        header.kid = Some(key.id().to_string());

        let token = jsonwebtoken::encode(&header, &claims, &encoding_key).map_err(|e| {
            error!(key_id = %key.id(), error = %e, "failed to sign token");
            IssuerError::Signing(e)
        })?;

        info!(
            token_id = %id,
            key_id = %key.id(),
            algorithm = ?key.algorithm(),
            expires_in,
            token = %sanitize_token(&token),
            "token signed"
        );

        Ok(SignedToken {
            id,
            token,
            expires: DateTime::from_timestamp(claims.exp, 0).unwrap_or(expires),
            expires_in,
        })
    }
}
