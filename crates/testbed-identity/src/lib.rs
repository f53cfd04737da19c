//! Test identity issuer
//!
//! Stands in for a real OpenID provider in integration tests: mints PS256
//! bearer tokens for arbitrary subjects, validates them, and publishes the
//! verification key as JWKS plus an OpenID discovery document, either through
//! a Kubernetes manifest or a local HTTP server.
//!
//! ```no_run
//! use testbed_identity::TestIdentity;
//!
//! let identity = TestIdentity::new()?;
//! let token = identity.issue("alice", ["cluster-manager"], [])?;
//! let claims = identity.validate(&token)?;
//! assert_eq!(claims.sub.as_deref(), Some("alice"));
//! # Ok::<(), testbed_identity::IdentityError>(())
//! ```

#![deny(missing_docs)]

pub mod claims;
pub mod discovery;
pub mod error;
pub mod issuer;
pub mod jwks;
pub mod keys;
pub mod manifest;
pub mod provider;
pub mod server;
pub mod validation;

pub use claims::{Audience, Claims, TokenRequest};
pub use discovery::DiscoveryDocument;
pub use error::{IdentityError, Result, ValidationError};
pub use issuer::{
    shared_identity, IssuerConfig, TestIdentity, DEFAULT_ISSUER_URL, DEFAULT_TTL, ISSUER_URL_ENV,
};
pub use jwks::{Jwk, JwkSet};
pub use keys::SigningKey;
pub use manifest::MockIdpManifest;
pub use provider::{EphemeralKeyProvider, FileKeyProvider, KeyProvider, KEY_CACHE_ENV};
pub use validation::ValidationOptions;
