//! Local mock identity provider
//!
//! Serves the same discovery and JWKS bodies as the in-cluster manifest so a
//! relying service can be exercised without a cluster.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::info;

use crate::discovery::DISCOVERY_PATH;
use crate::error::Result;
use crate::TestIdentity;

#[derive(Clone)]
struct Documents {
    discovery: Arc<Value>,
    jwks: Arc<Value>,
}

async fn discovery_handler(State(docs): State<Documents>) -> Json<Value> {
    Json(docs.discovery.as_ref().clone())
}

async fn jwks_handler(State(docs): State<Documents>) -> Json<Value> {
    Json(docs.jwks.as_ref().clone())
}

/// Router serving discovery at the root and below the issuer path, the JWKS
/// at the `jwks_uri` path, and `/healthz`.
pub fn router(identity: &TestIdentity) -> Result<Router> {
    let discovery = identity.discovery_document();
    let docs = Documents {
        discovery: Arc::new(serde_json::to_value(&discovery)?),
        jwks: Arc::new(serde_json::to_value(identity.jwks()?)?),
    };

    let mut app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route(DISCOVERY_PATH, get(discovery_handler))
        .route(&discovery.jwks_path(), get(jwks_handler));
    if !discovery.issuer_path().is_empty() {
        app = app.route(&discovery.discovery_path(), get(discovery_handler));
    }
    Ok(app.with_state(docs))
}

/// Bind `addr` and serve until the task is cancelled.
pub async fn serve(identity: &TestIdentity, addr: SocketAddr) -> Result<()> {
    let app = router(identity)?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, issuer = identity.issuer_url(), "serving mock identity provider");
    axum::serve(listener, app).await?;
    Ok(())
}
