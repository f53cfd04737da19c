//! Token claims

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token type claim carried by every issued token
pub const BEARER_TYPE: &str = "Bearer";

/// Standard JWT claims plus everything else the token carries
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Claims {
    /// Subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience (string or array on the wire)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration time (Unix seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,

    /// Not before (Unix seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,

    /// Issued at (Unix seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    /// JWT ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Every other claim
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Claims {
    /// Audience values, empty when absent
    pub fn audiences(&self) -> Vec<&str> {
        match &self.aud {
            Some(Audience::Single(a)) => vec![a.as_str()],
            Some(Audience::Multiple(v)) => v.iter().map(String::as_str).collect(),
            None => Vec::new(),
        }
    }

    /// Get a custom claim by dot-separated path, e.g. `realm_access.roles`
    pub fn get_claim(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.extra.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Space-separated `scope` claim as a list
    pub fn scopes(&self) -> Vec<&str> {
        self.extra
            .get("scope")
            .and_then(Value::as_str)
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Roles from `realm_access.roles`
    pub fn roles(&self) -> Vec<&str> {
        match self.get_claim("realm_access.roles") {
            Some(Value::Array(arr)) => arr.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Lifetime encoded by `iat` and `exp`
    pub fn lifetime(&self) -> Option<Duration> {
        Some(Duration::from_secs(self.exp?.checked_sub(self.iat?)?))
    }
}

/// Audience claim (string or array)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience
    Single(String),
    /// Multiple audiences
    Multiple(Vec<String>),
}

impl Audience {
    /// Check if the audience contains a specific value
    pub fn contains(&self, aud: &str) -> bool {
        match self {
            Audience::Single(s) => s == aud,
            Audience::Multiple(v) => v.iter().any(|a| a == aud),
        }
    }
}

/// What to put in a token
#[derive(Debug, Clone, Default)]
pub struct TokenRequest {
    pub(crate) subject: String,
    pub(crate) audience: Vec<String>,
    pub(crate) scopes: Vec<String>,
    pub(crate) roles: Vec<String>,
    pub(crate) extra: BTreeMap<String, Value>,
    pub(crate) ttl: Option<Duration>,
}

impl TokenRequest {
    /// Request a token for `subject`
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Default::default()
        }
    }

    /// Add an audience
    pub fn audience(mut self, aud: impl Into<String>) -> Self {
        self.audience.push(aud.into());
        self
    }

    /// Add several audiences
    pub fn audiences<I, S>(mut self, aud: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audience.extend(aud.into_iter().map(Into::into));
        self
    }

    /// Add a scope
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    /// Add a realm role
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Set an extra claim; overrides any default of the same name
    pub fn claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Merge a set of extra claims
    pub fn claims(mut self, claims: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.extra.extend(claims);
        self
    }

    /// Token lifetime; defaults to the issuer's
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Subject of the requested token
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn audience_accepts_string_or_array() {
        let single: Claims = serde_json::from_value(json!({"aud": "api"})).unwrap();
        assert_eq!(single.audiences(), ["api"]);
        assert!(single.aud.unwrap().contains("api"));

        let multiple: Claims = serde_json::from_value(json!({"aud": ["api", "web"]})).unwrap();
        assert_eq!(multiple.audiences(), ["api", "web"]);
        assert!(!multiple.aud.unwrap().contains("other"));
    }

    #[test]
    fn nested_claims_and_roles() {
        let claims: Claims = serde_json::from_value(json!({
            "sub": "alice",
            "scope": "openid profile",
            "realm_access": {"roles": ["admin", "viewer"]},
            "tenant": {"id": "t-1"}
        }))
        .unwrap();

        assert_eq!(claims.scopes(), ["openid", "profile"]);
        assert_eq!(claims.roles(), ["admin", "viewer"]);
        assert_eq!(claims.get_claim("tenant.id"), Some(&json!("t-1")));
        assert_eq!(claims.get_claim("tenant.missing"), None);
        assert_eq!(claims.get_claim("scope.nested"), None);
    }

    #[test]
    fn lifetime_from_iat_and_exp() {
        let claims = Claims {
            iat: Some(1_000),
            exp: Some(4_600),
            ..Default::default()
        };
        assert_eq!(claims.lifetime(), Some(Duration::from_secs(3_600)));
        assert_eq!(Claims::default().lifetime(), None);
    }

    #[test]
    fn request_builder_collects_everything() {
        let req = TokenRequest::new("alice")
            .audience("cluster-manager")
            .audiences(["connect-gateway"])
            .scope("openid")
            .role("admin")
            .claim("tenant", "t-1")
            .ttl(Duration::from_secs(60));

        assert_eq!(req.subject(), "alice");
        assert_eq!(req.audience, ["cluster-manager", "connect-gateway"]);
        assert_eq!(req.extra["tenant"], json!("t-1"));
        assert_eq!(req.ttl, Some(Duration::from_secs(60)));
    }
}
