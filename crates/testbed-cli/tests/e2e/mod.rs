//! End-to-end tests against a real kind cluster
//!
//! The lifecycle test bootstraps the management cluster from the plan in
//! `TESTBED_PLAN`, deploys the mock identity provider and drives the
//! cluster-manager API with tokens from the shared test issuer.
//!
//! # Running Tests
//!
//! ```bash
//! TESTBED_PLAN=bootstrap.yaml \
//! cargo test -p testbed-cli --features cluster-e2e --test e2e -- --ignored --nocapture
//! ```
//!
//! Set `TESTBED_KEEP_CLUSTER=1` to leave the cluster running afterwards.

#[cfg(feature = "cluster-e2e")]
mod cluster_lifecycle_e2e;
#[cfg(feature = "cluster-e2e")]
mod helpers;
