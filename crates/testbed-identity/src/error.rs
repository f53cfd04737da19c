//! Error types for the test-identity issuer

use thiserror::Error;

/// Identity Result type
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Test-identity errors
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Key generation failed; the issuer cannot be used
    #[error("key generation failed: {message}")]
    KeyGen {
        /// Error message
        message: String,
    },

    /// Claim encoding or signing failed; issuance may be retried
    #[error("signing failed: {message}")]
    Sign {
        /// Error message
        message: String,
    },

    /// A persisted key could not be decoded
    #[error("invalid key material: {message}")]
    Key {
        /// Error message
        message: String,
    },

    /// Token rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Filesystem error reading or writing the key cache
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML encoding error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl IdentityError {
    /// Create a key generation error
    pub fn key_gen(msg: impl Into<String>) -> Self {
        Self::KeyGen {
            message: msg.into(),
        }
    }

    /// Create a signing error
    pub fn sign(msg: impl Into<String>) -> Self {
        Self::Sign {
            message: msg.into(),
        }
    }

    /// Create a key decoding error
    pub fn key(msg: impl Into<String>) -> Self {
        Self::Key {
            message: msg.into(),
        }
    }

    /// The validation failure, if this is one
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            _ => None,
        }
    }
}

/// Why a token was rejected
///
/// Messages keep the cause word (`malformed`, `algorithm`, `signature`,
/// `expired`) so log-grepping and substring assertions keep working.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Not three base64url parts, or a part is not the expected JSON
    #[error("malformed token: {reason}")]
    Malformed {
        /// What was wrong with the structure
        reason: String,
    },

    /// Header names an algorithm other than PS256
    #[error("unsupported algorithm: {alg}")]
    UnsupportedAlgorithm {
        /// Algorithm from the token header
        alg: String,
    },

    /// Signature does not verify against this issuer's key
    #[error("bad signature: verification failed")]
    BadSignature,

    /// `exp` has passed
    #[error("token expired at {exp} (now {now})")]
    Expired {
        /// Expiry from the token
        exp: u64,
        /// Validation time
        now: u64,
    },

    /// `nbf` is still in the future
    #[error("token not valid before {nbf} (now {now})")]
    NotYetValid {
        /// Not-before from the token
        nbf: u64,
        /// Validation time
        now: u64,
    },

    /// `iss` differs from the expected issuer
    #[error("issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// Issuer this validator accepts
        expected: String,
        /// Issuer from the token
        actual: String,
    },

    /// `aud` does not contain the expected audience
    #[error("audience mismatch: expected {expected}")]
    AudienceMismatch {
        /// Audience this validator requires
        expected: String,
    },
}

impl ValidationError {
    /// Create a malformed-token error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}
