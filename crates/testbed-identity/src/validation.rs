//! Token decoding and validation
//!
//! Checks run in a fixed order so the first failure is the one reported:
//! structure, header, algorithm, signature, payload, `exp`, `nbf`, issuer,
//! audience. Only PS256 is accepted; `none`, HMAC and PKCS#1 v1.5 headers are
//! rejected before the signature is looked at.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::claims::Claims;
use crate::error::ValidationError;
use crate::keys::verify_pss;

/// The only accepted signing algorithm
pub const ALGORITHM: &str = "PS256";

/// JWT header
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JwtHeader {
    /// Signing algorithm
    pub alg: String,
    /// Token type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Key id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// Validation knobs
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Clock skew tolerance applied to `exp` and `nbf`
    pub leeway: Duration,
    /// Audience the token must carry
    pub audience: Option<String>,
    /// Validation time; defaults to now
    pub now: Option<SystemTime>,
}

impl ValidationOptions {
    /// Tolerate clock skew
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Require an audience
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Validate as of a fixed time
    pub fn at(mut self, now: SystemTime) -> Self {
        self.now = Some(now);
        self
    }

    fn now_secs(&self) -> u64 {
        unix_secs(self.now.unwrap_or_else(SystemTime::now))
    }
}

/// Seconds since the epoch, saturating at zero for pre-epoch times.
pub(crate) fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn decode_part(part: &str, what: &str) -> Result<Vec<u8>, ValidationError> {
    URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| ValidationError::malformed(format!("invalid {} encoding: {}", what, e)))
}

/// Decode the header without verifying anything else.
pub fn decode_header(token: &str) -> Result<JwtHeader, ValidationError> {
    let (header, _, _) = split_token(token)?;
    let bytes = decode_part(header, "header")?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ValidationError::malformed(format!("invalid header: {}", e)))
}

fn split_token(token: &str) -> Result<(&str, &str, &str), ValidationError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) if !h.is_empty() && !p.is_empty() && !s.is_empty() => {
            Ok((h, p, s))
        }
        _ => Err(ValidationError::malformed(
            "expected three dot-separated parts",
        )),
    }
}

/// Verify a compact JWS against a PKCS#1 public key and check its claims.
pub(crate) fn validate_token(
    token: &str,
    public_key_der: &[u8],
    expected_issuer: &str,
    opts: &ValidationOptions,
) -> Result<Claims, ValidationError> {
    let (header_b64, payload_b64, signature_b64) = split_token(token)?;

    let header = decode_header(token)?;
    if header.alg != ALGORITHM {
        return Err(ValidationError::UnsupportedAlgorithm { alg: header.alg });
    }

    let signature = decode_part(signature_b64, "signature")?;
    let message = format!("{}.{}", header_b64, payload_b64);
    if !verify_pss(public_key_der, message.as_bytes(), &signature) {
        debug!(kid = ?header.kid, "signature verification failed");
        return Err(ValidationError::BadSignature);
    }

    let payload = decode_part(payload_b64, "payload")?;
    let claims: Claims = serde_json::from_slice(&payload)
        .map_err(|e| ValidationError::malformed(format!("invalid payload: {}", e)))?;

    let now = opts.now_secs();
    let leeway = opts.leeway.as_secs();

    let exp = claims
        .exp
        .ok_or_else(|| ValidationError::malformed("missing exp claim"))?;
    if now >= exp.saturating_add(leeway) {
        return Err(ValidationError::Expired { exp, now });
    }

    if let Some(nbf) = claims.nbf {
        if now.saturating_add(leeway) < nbf {
            return Err(ValidationError::NotYetValid { nbf, now });
        }
    }

    match claims.iss.as_deref() {
        Some(iss) if iss == expected_issuer => {}
        other => {
            return Err(ValidationError::IssuerMismatch {
                expected: expected_issuer.to_string(),
                actual: other.unwrap_or_default().to_string(),
            })
        }
    }

    if let Some(expected) = &opts.audience {
        if !claims.aud.as_ref().is_some_and(|aud| aud.contains(expected)) {
            return Err(ValidationError::AudienceMismatch {
                expected: expected.clone(),
            });
        }
    }

    Ok(claims)
}
