//! JSON Web Key Set rendering

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, Result};
use crate::keys::{der, SigningKey};
use crate::validation::ALGORITHM;

/// A JSON Web Key
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Jwk {
    /// Key type
    pub kty: String,
    /// Public key use
    #[serde(rename = "use")]
    pub use_: String,
    /// Algorithm
    pub alg: String,
    /// Key ID
    pub kid: String,
    /// RSA modulus (base64url)
    pub n: String,
    /// RSA public exponent (base64url)
    pub e: String,
}

impl Jwk {
    /// PS256 signing JWK for a key
    pub fn from_key(key: &SigningKey) -> Result<Self> {
        let (n, e) = key.public_components()?;
        Ok(Self {
            kty: "RSA".to_string(),
            use_: "sig".to_string(),
            alg: ALGORITHM.to_string(),
            kid: key.kid().to_string(),
            n: URL_SAFE_NO_PAD.encode(n),
            e: URL_SAFE_NO_PAD.encode(e),
        })
    }

    /// PKCS#1 public key rebuilt from `n` and `e`, as a relying party would
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        let decode = |v: &str| {
            URL_SAFE_NO_PAD
                .decode(v)
                .map_err(|e| IdentityError::key(format!("invalid JWK component: {}", e)))
        };
        Ok(der::rsa_public_key(&decode(&self.n)?, &decode(&self.e)?))
    }
}

/// JSON Web Key Set
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JwkSet {
    /// Keys
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Set containing just this key
    pub fn from_key(key: &SigningKey) -> Result<Self> {
        Ok(Self {
            keys: vec![Jwk::from_key(key)?],
        })
    }

    /// Find a key by ID
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    /// Pretty JSON body
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
