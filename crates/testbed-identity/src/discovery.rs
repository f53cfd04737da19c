//! OpenID discovery document

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::validation::ALGORITHM;

/// Path of the discovery document below the issuer URL
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

const OIDC_PREFIX: &str = "/protocol/openid-connect";

/// OpenID Provider metadata for the mock issuer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiscoveryDocument {
    /// Issuer URL
    pub issuer: String,
    /// Authorization endpoint
    pub authorization_endpoint: String,
    /// Token endpoint
    pub token_endpoint: String,
    /// JWKS endpoint
    pub jwks_uri: String,
    /// Userinfo endpoint
    pub userinfo_endpoint: String,
    /// Supported response types
    pub response_types_supported: Vec<String>,
    /// Supported subject types
    pub subject_types_supported: Vec<String>,
    /// ID token signing algorithms
    pub id_token_signing_alg_values_supported: Vec<String>,
    /// Supported scopes
    pub scopes_supported: Vec<String>,
    /// Supported grant types
    pub grant_types_supported: Vec<String>,
    /// Claims the issuer may emit
    pub claims_supported: Vec<String>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl DiscoveryDocument {
    /// Document for an issuer URL
    pub fn new(issuer_url: &str) -> Self {
        let issuer = issuer_url.trim_end_matches('/').to_string();
        let endpoint = |name: &str| format!("{}{}/{}", issuer, OIDC_PREFIX, name);
        Self {
            authorization_endpoint: endpoint("auth"),
            token_endpoint: endpoint("token"),
            jwks_uri: endpoint("certs"),
            userinfo_endpoint: endpoint("userinfo"),
            response_types_supported: strings(&["code", "id_token", "code id_token"]),
            subject_types_supported: strings(&["public"]),
            id_token_signing_alg_values_supported: strings(&[ALGORITHM]),
            scopes_supported: strings(&["openid", "profile", "email", "roles"]),
            grant_types_supported: strings(&[
                "authorization_code",
                "client_credentials",
                "password",
                "refresh_token",
            ]),
            claims_supported: strings(&[
                "sub",
                "iss",
                "aud",
                "exp",
                "iat",
                "nbf",
                "jti",
                "typ",
                "scope",
                "preferred_username",
                "realm_access",
            ]),
            issuer,
        }
    }

    /// Path component of the issuer URL, e.g. `/realms/master`
    pub fn issuer_path(&self) -> String {
        url_path(&self.issuer)
    }

    /// Path at which the discovery document is published
    pub fn discovery_path(&self) -> String {
        format!("{}{}", self.issuer_path(), DISCOVERY_PATH)
    }

    /// Path component of `jwks_uri`
    pub fn jwks_path(&self) -> String {
        url_path(&self.jwks_uri)
    }

    /// Pretty JSON body
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Path of an absolute URL without query; empty for a bare host.
fn url_path(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let path = without_scheme
        .find('/')
        .map(|i| &without_scheme[i..])
        .unwrap_or("");
    let path = path.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
    path.trim_end_matches('/').to_string()
}
