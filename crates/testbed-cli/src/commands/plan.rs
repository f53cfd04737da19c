//! Plan command - print the merged plan
//!
//! Shows exactly what `bootstrap` would apply once `TESTBED_PLAN_OVERRIDE`
//! has been merged over the base document.

use clap::Args;

use super::PlanSource;
use crate::Result;

/// Plan command arguments
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: PlanSource,
}

/// Run the plan command
pub fn run(args: PlanArgs) -> Result<()> {
    let plan = args.source.load()?;
    print!("{}", plan.to_yaml()?);
    Ok(())
}
