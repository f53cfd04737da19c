//! Identity command - publish the test issuer's verification material
//!
//! `manifest` renders the in-cluster mock identity provider for
//! `kubectl apply -f -`; `serve` runs the same endpoints locally. Without
//! `--issuer-url`, `manifest` issues as the Service it renders.

use std::net::SocketAddr;

use clap::{Args, Subcommand};
use tracing::info;

use testbed_identity::manifest::DEFAULT_NAMESPACE;
use testbed_identity::{server, MockIdpManifest, TestIdentity};

use super::IssuerSource;
use crate::Result;

/// Identity command arguments
#[derive(Args, Debug)]
pub struct IdentityArgs {
    #[command(flatten)]
    pub issuer: IssuerSource,

    #[command(subcommand)]
    pub command: IdentityCommand,
}

/// What to publish
#[derive(Subcommand, Debug)]
pub enum IdentityCommand {
    /// Print the JSON Web Key Set
    Jwks,
    /// Print the OpenID discovery document
    Discovery,
    /// Print the verification key as a PEM SubjectPublicKeyInfo
    PublicKey,
    /// Print the Kubernetes manifest of the mock identity provider
    Manifest {
        /// Namespace to deploy into
        #[arg(long, short = 'n', default_value = DEFAULT_NAMESPACE)]
        namespace: String,

        /// Resource and Service name
        #[arg(long)]
        name: Option<String>,

        /// Static file server image
        #[arg(long)]
        image: Option<String>,
    },
    /// Serve discovery and JWKS over HTTP until interrupted
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: SocketAddr,
    },
}

/// Run the identity command
pub async fn run(args: IdentityArgs) -> Result<()> {
    let identity = identity_for(&args.issuer, &args.command)?;
    match args.command {
        IdentityCommand::Serve { listen } => {
            info!(kid = %identity.kid(), "starting mock identity provider");
            server::serve(&identity, listen).await?;
        }
        command => print!("{}", render(&identity, command)?),
    }
    Ok(())
}

fn identity_for(issuer: &IssuerSource, command: &IdentityCommand) -> Result<TestIdentity> {
    match command {
        IdentityCommand::Manifest {
            namespace, name, ..
        } => issuer.identity_or(&mock_idp(namespace.clone(), name.clone(), None).issuer_url()),
        _ => issuer.identity(),
    }
}

fn mock_idp(namespace: String, name: Option<String>, image: Option<String>) -> MockIdpManifest {
    let mut manifest = MockIdpManifest::new(namespace);
    if let Some(name) = name {
        manifest = manifest.with_name(name);
    }
    if let Some(image) = image {
        manifest = manifest.with_image(image);
    }
    manifest
}

/// Body printed by the non-serving subcommands
fn render(identity: &TestIdentity, command: IdentityCommand) -> Result<String> {
    let body = match command {
        IdentityCommand::Jwks => format!("{}\n", identity.jwks()?.to_json()?),
        IdentityCommand::Discovery => format!("{}\n", identity.discovery_document().to_json()?),
        IdentityCommand::PublicKey => identity.public_key_pem(),
        IdentityCommand::Manifest {
            namespace,
            name,
            image,
        } => mock_idp(namespace, name, image).render(identity)?,
        IdentityCommand::Serve { .. } => String::new(),
    };
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn identity() -> TestIdentity {
        TestIdentity::new().unwrap()
    }

    #[test]
    fn jwks_lists_the_signing_key() {
        let identity = identity();
        let body = render(&identity, IdentityCommand::Jwks).unwrap();
        let jwks: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(jwks["keys"][0]["kid"], identity.kid());
        assert_eq!(jwks["keys"][0]["alg"], "PS256");
    }

    #[test]
    fn discovery_names_the_issuer() {
        let identity = identity();
        let body = render(&identity, IdentityCommand::Discovery).unwrap();
        let doc: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["issuer"], identity.issuer_url());
    }

    #[test]
    fn public_key_is_spki_pem() {
        let body = render(&identity(), IdentityCommand::PublicKey).unwrap();
        assert!(body.starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn manifest_honours_overrides() {
        let body = render(
            &identity(),
            IdentityCommand::Manifest {
                namespace: "idp".to_string(),
                name: Some("keycloak".to_string()),
                image: None,
            },
        )
        .unwrap();

        assert!(body.contains("namespace: idp"));
        assert!(body.contains("name: keycloak"));
        assert!(body.contains("nginx-unprivileged"));
    }

    fn manifest_command(namespace: &str, name: Option<&str>) -> IdentityCommand {
        IdentityCommand::Manifest {
            namespace: namespace.to_string(),
            name: name.map(str::to_string),
            image: None,
        }
    }

    #[test]
    fn manifest_issues_as_its_service_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = IssuerSource {
            issuer_url: None,
            key_cache: Some(dir.path().join("key.pem")),
        };
        let command = manifest_command("idp", Some("keycloak"));

        let identity = identity_for(&issuer, &command).unwrap();
        assert_eq!(
            identity.issuer_url(),
            "http://keycloak.idp.svc.cluster.local/realms/master"
        );

        let body = render(&identity, command).unwrap();
        assert!(body.contains("keycloak.idp.svc.cluster.local/realms/master/protocol"));
    }

    #[test]
    fn explicit_issuer_url_wins_for_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = IssuerSource {
            issuer_url: Some("https://idp.example.com/realms/ci".to_string()),
            key_cache: Some(dir.path().join("key.pem")),
        };

        let identity = identity_for(&issuer, &manifest_command("idp", None)).unwrap();
        assert_eq!(identity.issuer_url(), "https://idp.example.com/realms/ci");
    }

    #[test]
    fn other_commands_keep_the_default_issuer() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = IssuerSource {
            issuer_url: None,
            key_cache: Some(dir.path().join("key.pem")),
        };

        let identity = identity_for(&issuer, &IdentityCommand::Jwks).unwrap();
        assert_eq!(identity.issuer_url(), testbed_identity::DEFAULT_ISSUER_URL);
    }
}
