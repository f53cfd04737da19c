//! Testbed CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// Testbed - throwaway clusters and test identities for integration suites
#[derive(Parser, Debug)]
#[command(name = "testbed")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a kind cluster and install every component of a plan
    Bootstrap(commands::bootstrap::BootstrapArgs),
    /// Delete the kind cluster
    Teardown(commands::teardown::TeardownArgs),
    /// Print the merged plan as YAML
    Plan(commands::plan::PlanArgs),
    /// Print a bearer token from the shared test issuer
    Token(commands::token::TokenArgs),
    /// Publish the test issuer's keys and discovery document
    Identity(commands::identity::IdentityArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Bootstrap(args) => commands::bootstrap::run(args).await,
            Commands::Teardown(args) => commands::teardown::run(args).await,
            Commands::Plan(args) => commands::plan::run(args),
            Commands::Token(args) => commands::token::run(args),
            Commands::Identity(args) => commands::identity::run(args).await,
        }
    }
}
