//! Kubernetes manifest for the in-cluster mock identity provider
//!
//! The discovery and JWKS bodies are rendered once, stored in a ConfigMap and
//! served by a static file server at the paths a relying party derives from
//! the issuer URL. Services under test are pointed at the mock purely by
//! issuer URL.
//!
//! The issuer URL must name the rendered Service. [`MockIdpManifest::issuer_url`]
//! gives the in-cluster URL for a name and namespace; issuers configured with
//! anything else publish a `jwks_uri` that does not resolve to this Service.

use serde_json::{json, Value};
use tracing::warn;

use crate::discovery::DiscoveryDocument;
use crate::error::Result;
use crate::TestIdentity;

/// Default namespace of the mock identity provider
pub const DEFAULT_NAMESPACE: &str = "testbed-system";

const DEFAULT_NAME: &str = "mock-idp";
const DEFAULT_REALM_PATH: &str = "/realms/master";
const DEFAULT_IMAGE: &str = "nginxinc/nginx-unprivileged:1.27-alpine";
const CONTAINER_PORT: u16 = 8080;
const WEB_ROOT: &str = "/usr/share/nginx/html";

const DISCOVERY_KEY: &str = "openid-configuration.json";
const JWKS_KEY: &str = "jwks.json";
const NGINX_CONF_KEY: &str = "default.conf";

/// Renders the mock identity provider manifest
#[derive(Debug, Clone)]
pub struct MockIdpManifest {
    namespace: String,
    name: String,
    image: String,
}

impl Default for MockIdpManifest {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl MockIdpManifest {
    /// Manifest for a namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: DEFAULT_NAME.to_string(),
            image: DEFAULT_IMAGE.to_string(),
        }
    }

    /// Override the resource name (also the Service DNS name)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the static file server image
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// In-cluster issuer URL served by this manifest's Service
    pub fn issuer_url(&self) -> String {
        format!("http://{}{}", self.service_host(), DEFAULT_REALM_PATH)
    }

    fn service_host(&self) -> String {
        format!("{}.{}.svc.cluster.local", self.name, self.namespace)
    }

    /// Multi-document YAML: Namespace, ConfigMap, Deployment, Service
    pub fn render(&self, identity: &TestIdentity) -> Result<String> {
        let discovery = identity.discovery_document();
        let host = self.service_host();
        if !identity.issuer_url().starts_with(&format!("http://{}/", host)) {
            warn!(
                issuer = identity.issuer_url(),
                service = %host,
                "issuer URL does not point at the mock identity provider Service"
            );
        }
        let documents = [
            self.namespace_doc(),
            self.config_map(identity, &discovery)?,
            self.deployment(&discovery),
            self.service(),
        ];

        let mut out = String::new();
        for doc in &documents {
            out.push_str("---\n");
            out.push_str(&serde_yaml::to_string(doc)?);
        }
        Ok(out)
    }

    fn labels(&self) -> Value {
        json!({ "app.kubernetes.io/name": self.name, "app.kubernetes.io/part-of": "testbed" })
    }

    fn metadata(&self) -> Value {
        json!({ "name": self.name, "namespace": self.namespace, "labels": self.labels() })
    }

    fn namespace_doc(&self) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": { "name": self.namespace },
        })
    }

    fn config_map(&self, identity: &TestIdentity, discovery: &DiscoveryDocument) -> Result<Value> {
        Ok(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": self.metadata(),
            "data": {
                DISCOVERY_KEY: discovery.to_json()?,
                JWKS_KEY: identity.jwks()?.to_json()?,
                NGINX_CONF_KEY: nginx_conf(),
            },
        }))
    }

    fn deployment(&self, discovery: &DiscoveryDocument) -> Value {
        // ConfigMap item paths are relative to the mount point.
        let relative = |path: String| path.trim_start_matches('/').to_string();
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": self.metadata(),
            "spec": {
                "replicas": 1,
                "selector": { "matchLabels": { "app.kubernetes.io/name": self.name } },
                "template": {
                    "metadata": { "labels": self.labels() },
                    "spec": {
                        "containers": [{
                            "name": "server",
                            "image": self.image,
                            "ports": [{ "name": "http", "containerPort": CONTAINER_PORT }],
                            "readinessProbe": {
                                "httpGet": { "path": "/healthz", "port": "http" },
                                "periodSeconds": 2,
                            },
                            "volumeMounts": [
                                { "name": "documents", "mountPath": WEB_ROOT, "readOnly": true },
                                {
                                    "name": "config",
                                    "mountPath": format!("/etc/nginx/conf.d/{}", NGINX_CONF_KEY),
                                    "subPath": NGINX_CONF_KEY,
                                    "readOnly": true,
                                },
                            ],
                        }],
                        "volumes": [
                            {
                                "name": "documents",
                                "configMap": {
                                    "name": self.name,
                                    "items": [
                                        { "key": DISCOVERY_KEY, "path": relative(discovery.discovery_path()) },
                                        { "key": JWKS_KEY, "path": relative(discovery.jwks_path()) },
                                    ],
                                },
                            },
                            { "name": "config", "configMap": { "name": self.name } },
                        ],
                    },
                },
            },
        })
    }

    fn service(&self) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": self.metadata(),
            "spec": {
                "selector": { "app.kubernetes.io/name": self.name },
                "ports": [{ "name": "http", "port": 80, "targetPort": "http" }],
            },
        })
    }
}

fn nginx_conf() -> String {
    format!(
        "server {{\n    listen {port};\n    root {root};\n    default_type application/json;\n    location = /healthz {{\n        return 200 'ok';\n    }}\n}}\n",
        port = CONTAINER_PORT,
        root = WEB_ROOT,
    )
}
