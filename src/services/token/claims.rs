/*
 * Responsibility
 * - Sign request, wire claims, verify expectation and result types
 * - Reshape wire claims for application code
 */
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{TokenError, TokenErrorReason};
use crate::services::token::case::{to_app_case, to_wire_case};
use crate::services::token::expiry::Expiry;
use crate::services::token::scope::{Permission, join_claim, split_claim};

/// Claim names owned by the canonical schema. Extension claims may not use them.
pub const RESERVED_CLAIMS: &[&str] = &[
    "acr",
    "amr",
    "aud",
    "client_id",
    "device_id",
    "exp",
    "iam",
    "iat",
    "iss",
    "jti",
    "nbf",
    "nonce",
    "payload",
    "scope",
    "sub",
    "token_type",
    "username",
];

/// Caller input to `TokenIssuer::sign`.
///
/// Optional values that are empty (empty string, empty list, empty map) are
/// treated as absent and never reach the token.
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub id: Option<String>,
    pub audience: Vec<String>,
    pub subject: String,
    pub token_type: String,
    pub expiry: Expiry,
    pub auth_context_class: Vec<String>,
    pub auth_methods_reference: Vec<String>,
    pub client_id: Option<String>,
    pub device_id: Option<String>,
    pub nonce: Option<String>,
    pub not_before: Option<DateTime<Utc>>,
    pub permission: Option<String>,
    pub scopes: Vec<String>,
    pub username: Option<String>,
    // camelCase keys; stored snake_case on the wire
    pub payload: Map<String, Value>,
    pub claims: Map<String, Value>,
}

impl SignRequest {
    pub fn new(
        subject: impl Into<String>,
        token_type: impl Into<String>,
        expiry: impl Into<Expiry>,
    ) -> Self {
        Self {
            id: None,
            audience: Vec::new(),
            subject: subject.into(),
            token_type: token_type.into(),
            expiry: expiry.into(),
            auth_context_class: Vec::new(),
            auth_methods_reference: Vec::new(),
            client_id: None,
            device_id: None,
            nonce: None,
            not_before: None,
            permission: None,
            scopes: Vec::new(),
            username: None,
            payload: Map::new(),
            claims: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience.push(audience.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    pub fn with_auth_context_class<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auth_context_class
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_auth_methods_reference<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auth_methods_reference
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before);
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_claims(mut self, claims: Map<String, Value>) -> Self {
        self.claims = claims;
        self
    }
}

/// The object that is actually signed.
///
/// List claims travel as single space-joined strings. `payload` and the
/// flattened extension claims are snake_case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalClaims {
    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub jti: String,
    pub nbf: i64,
    pub sub: String,
    pub token_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(aud) => vec![aud],
        OneOrMany::Many(aud) => aud,
    })
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}

impl CanonicalClaims {
    pub(crate) fn assemble(
        request: &SignRequest,
        issuer: &str,
        id: String,
        now: DateTime<Utc>,
        not_before: DateTime<Utc>,
        expires: DateTime<Utc>,
    ) -> Self {
        let extra = to_wire_case(&request.claims)
            .into_iter()
            .filter(|(name, _)| {
                let reserved = RESERVED_CLAIMS.contains(&name.as_str());
                if reserved {
                    warn!(claim = %name, "dropping extension claim that shadows a fixed claim");
                }
                !reserved
            })
            .collect();

        Self {
            aud: request.audience.clone(),
            exp: expires.timestamp(),
            iat: now.timestamp(),
            iss: issuer.to_string(),
            jti: id,
            nbf: not_before.timestamp(),
            sub: request.subject.clone(),
            token_type: request.token_type.clone(),
            acr: join_claim(&request.auth_context_class),
            amr: join_claim(&request.auth_methods_reference),
            client_id: non_empty(&request.client_id),
            device_id: non_empty(&request.device_id),
            iam: non_empty(&request.permission),
            nonce: non_empty(&request.nonce),
            scope: join_claim(&request.scopes),
            username: non_empty(&request.username),
            payload: (!request.payload.is_empty()).then(|| to_wire_case(&request.payload)),
            extra,
        }
    }

    pub fn scopes(&self) -> Vec<String> {
        self.scope.as_deref().map(split_claim).unwrap_or_default()
    }
}

/// Output of `TokenIssuer::sign`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedToken {
    pub id: String,
    pub token: String,
    pub expires: DateTime<Utc>,
    // seconds from issuance; handy as a cache TTL
    pub expires_in: i64,
}

/// Unverified view of a token.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    pub key_id: String,
    pub algorithm: Algorithm,
    pub claims: CanonicalClaims,
}

/// Constraints applied by `TokenIssuer::verify`. Every field left at its
/// default is unconstrained, except `issuer` which falls back to the
/// issuer's own name.
#[derive(Debug, Clone, Default)]
pub struct VerifyExpectation {
    pub audience: Vec<String>,
    pub issuer: Option<String>,
    pub subject: Option<String>,
    pub nonce: Option<String>,
    pub max_age: Option<ChronoDuration>,
    pub scopes: Vec<String>,
    pub token_type: Option<String>,
    pub client_id: Option<String>,
    pub device_id: Option<String>,
}

/// Verified token reshaped for application code.
///
/// Absent optional claims are `None` or empty, never missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub id: String,
    pub key_id: String,
    pub issuer: String,
    pub audience: Vec<String>,
    pub auth_context_class: Vec<String>,
    pub auth_methods_reference: Vec<String>,
    pub client_id: Option<String>,
    pub device_id: Option<String>,
    pub nonce: Option<String>,
    pub payload: Map<String, Value>,
    pub claims: Map<String, Value>,
    pub permission: Option<String>,
    pub scopes: Vec<String>,
    pub subject: String,
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub username: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub not_before: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

fn instant(claim: &'static str, seconds: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
        TokenError::new(TokenErrorReason::Malformed, format!("invalid {claim} claim"))
            .with_debug(serde_json::json!({ "claim": claim, "value": seconds }))
    })
}

impl VerifyResult {
    pub(crate) fn reshape(decoded: DecodedToken, token: &str) -> Result<Self, TokenError> {
        let claims = decoded.claims;
        let scopes = claims.scopes();

        Ok(Self {
            issued_at: instant("iat", claims.iat)?,
            not_before: instant("nbf", claims.nbf)?,
            expires: instant("exp", claims.exp)?,
            id: claims.jti,
            key_id: decoded.key_id,
            issuer: claims.iss,
            audience: claims.aud,
            auth_context_class: claims.acr.as_deref().map(split_claim).unwrap_or_default(),
            auth_methods_reference: claims.amr.as_deref().map(split_claim).unwrap_or_default(),
            client_id: non_empty(&claims.client_id),
            device_id: non_empty(&claims.device_id),
            nonce: non_empty(&claims.nonce),
            payload: claims
                .payload
                .as_ref()
                .map(to_app_case)
                .unwrap_or_default(),
            claims: to_app_case(&claims.extra),
            permission: non_empty(&claims.iam),
            scopes,
            subject: claims.sub,
            token: token.to_string(),
            token_type: claims.token_type,
            username: non_empty(&claims.username),
        })
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Scope list as carried on the wire.
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    pub fn permission(&self) -> Option<Permission> {
        self.permission.as_deref().and_then(|p| p.parse().ok())
    }

    pub fn is_admin(&self) -> bool {
        self.permission() == Some(Permission::Admin)
    }

    pub fn is_user(&self) -> bool {
        self.permission() == Some(Permission::User)
    }

    pub fn is_locked(&self) -> bool {
        self.permission() == Some(Permission::Locked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::token::scope::has_scope;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 9, 0, 0).unwrap()
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test fixture must be an object"),
        }
    }

    fn assemble(request: &SignRequest) -> CanonicalClaims {
        CanonicalClaims::assemble(
            request,
            "mock-issuer",
            "mock-id".into(),
            now(),
            now(),
            now() + ChronoDuration::seconds(10),
        )
    }

    #[test]
    fn fixed_claims_only_when_optionals_absent() {
        let request = SignRequest::new("mock-subject", "access_token", "10 seconds")
            .with_audience("mock-audience");

        let wire = serde_json::to_value(assemble(&request)).unwrap();
        assert_eq!(
            wire,
            json!({
                "aud": ["mock-audience"],
                "exp": 1_577_869_210,
                "iat": 1_577_869_200,
                "iss": "mock-issuer",
                "jti": "mock-id",
                "nbf": 1_577_869_200,
                "sub": "mock-subject",
                "token_type": "access_token",
            })
        );
    }

    #[test]
    fn empty_optionals_are_omitted() {
        let mut request = SignRequest::new("sub", "access_token", "10 seconds")
            .with_audience("aud")
            .with_client_id("")
            .with_permission("")
            .with_scopes(Vec::<String>::new())
            .with_auth_methods_reference([""]);
        request.payload = Map::new();

        let claims = assemble(&request);
        assert_eq!(claims.client_id, None);
        assert_eq!(claims.iam, None);
        assert_eq!(claims.scope, None);
        assert_eq!(claims.amr, None);
        assert_eq!(claims.payload, None);
    }

    #[test]
    fn lists_are_space_joined_and_maps_snake_cased() {
        let request = SignRequest::new("sub", "access_token", "10 seconds")
            .with_audience("aud")
            .with_scopes(["openid", "profile"])
            .with_auth_context_class(["loa2"])
            .with_auth_methods_reference(["pwd", "otp"])
            .with_payload(object(json!({ "someValue": { "deepKey": 1 } })))
            .with_claims(object(json!({ "tenantId": "t1", "tokenType": "shadow" })));

        let wire = serde_json::to_value(assemble(&request)).unwrap();
        assert_eq!(wire["scope"], json!("openid profile"));
        assert_eq!(wire["acr"], json!("loa2"));
        assert_eq!(wire["amr"], json!("pwd otp"));
        assert_eq!(wire["payload"], json!({ "some_value": { "deep_key": 1 } }));
        assert_eq!(wire["tenant_id"], json!("t1"));
        // extension claims cannot overwrite fixed ones
        assert_eq!(wire["token_type"], json!("access_token"));
    }

    #[test]
    fn audience_accepts_string_or_array() {
        let mut wire = serde_json::to_value(assemble(
            &SignRequest::new("sub", "t", "10 seconds").with_audience("aud"),
        ))
        .unwrap();
        wire["aud"] = json!("single");

        let claims: CanonicalClaims = serde_json::from_value(wire).unwrap();
        assert_eq!(claims.aud, vec!["single".to_string()]);
        assert!(claims.extra.is_empty());
    }

    #[test]
    fn reshape_fills_empty_sentinels() {
        let claims = assemble(&SignRequest::new("sub", "t", "10 seconds").with_audience("aud"));
        let result = VerifyResult::reshape(
            DecodedToken {
                key_id: "kid".into(),
                algorithm: Algorithm::ES256,
                claims,
            },
            "a.b.c",
        )
        .unwrap();

        assert_eq!(result.client_id, None);
        assert_eq!(result.device_id, None);
        assert_eq!(result.nonce, None);
        assert_eq!(result.permission, None);
        assert_eq!(result.username, None);
        assert!(result.scopes.is_empty());
        assert!(result.auth_context_class.is_empty());
        assert!(result.auth_methods_reference.is_empty());
        assert!(result.payload.is_empty());
        assert!(result.claims.is_empty());
        assert_eq!(result.token, "a.b.c");
        assert_eq!(result.expires, now() + ChronoDuration::seconds(10));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["clientId"], Value::Null);
        assert_eq!(json["type"], json!("t"));
        assert_eq!(json["scopes"], json!([]));
    }

    #[test]
    fn permission_helpers() {
        let mut claims =
            assemble(&SignRequest::new("sub", "t", "10 seconds").with_audience("aud"));
        claims.iam = Some("admin".into());
        claims.scope = Some("read write".into());
        let result = VerifyResult::reshape(
            DecodedToken {
                key_id: "kid".into(),
                algorithm: Algorithm::ES256,
                claims,
            },
            "t",
        )
        .unwrap();

        assert!(result.is_admin());
        assert!(!result.is_user());
        assert!(!result.is_locked());
        assert!(result.has_scope("write"));
        assert_eq!(result.scope_string(), "read write");
        assert!(has_scope(&result.scope_string(), "read"));
    }
}
