//! Token command - print a bearer token from the shared test issuer
//!
//! Every process of a test run that points at the same key cache signs with
//! the same key, so a token printed here validates against the JWKS served
//! by the in-cluster mock identity provider.
//!
//! ```text
//! TOKEN=$(testbed token --subject alice --audience cluster-manager --role admin)
//! curl -H "Authorization: Bearer $TOKEN" ...
//! ```

use std::time::Duration;

use clap::Args;
use serde_json::Value;
use tracing::debug;

use testbed_identity::TokenRequest;

use super::IssuerSource;
use crate::Result;

/// Token command arguments
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(flatten)]
    pub issuer: IssuerSource,

    /// `sub` claim
    #[arg(long, short = 's')]
    pub subject: String,

    /// Audience; repeat for several
    #[arg(long, short = 'a')]
    pub audience: Vec<String>,

    /// Scope added to the space-separated `scope` claim; repeat for several
    #[arg(long)]
    pub scope: Vec<String>,

    /// Realm role added to `realm_access.roles`; repeat for several
    #[arg(long)]
    pub role: Vec<String>,

    /// Extra claim as `name=value`; the value is parsed as JSON when it can be
    #[arg(long, value_parser = parse_claim)]
    pub claim: Vec<(String, Value)>,

    /// Token lifetime in seconds (default one hour)
    #[arg(long)]
    pub ttl_secs: Option<u64>,
}

impl TokenArgs {
    fn request(&self) -> TokenRequest {
        let mut request = TokenRequest::new(&self.subject)
            .audiences(&self.audience)
            .claims(self.claim.iter().cloned());
        for scope in &self.scope {
            request = request.scope(scope);
        }
        for role in &self.role {
            request = request.role(role);
        }
        if let Some(secs) = self.ttl_secs {
            request = request.ttl(Duration::from_secs(secs));
        }
        request
    }
}

/// `groups=["a","b"]` -> `("groups", ["a","b"])`, `tenant=acme` -> `("tenant", "acme")`
fn parse_claim(raw: &str) -> std::result::Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("claim name is empty in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

/// Run the token command
pub fn run(args: TokenArgs) -> Result<()> {
    let identity = args.issuer.identity()?;
    let token = identity.issue_request(&args.request())?;
    debug!(subject = %args.subject, kid = %identity.kid(), "issued token");
    println!("{}", token);
    Ok(())
}
