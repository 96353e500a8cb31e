use anyhow::Result;
use cdflow_core::destroy::Destroy;
use tracing::{info, instrument};

use crate::context::CommandContext;
use crate::DestroyArgs;

/// Runs `cdflow destroy`.
#[instrument(skip_all, fields(environment = %args.environment))]
pub fn run(args: &DestroyArgs) -> Result<()> {
    let ctx = CommandContext::load(args.component.component.as_deref())?;
    let session = ctx.assume(ctx.environment_account(&args.environment)?)?;

    Destroy {
        runner: &ctx.runner,
        session: session.as_ref(),
        scheme: &ctx.scheme,
        scope: ctx.scope(&args.environment),
    }
    .run(args.plan_only)?;

    if !args.plan_only {
        info!(target: "cdflow", "destroyed {} in {}", ctx.component, args.environment);
    }
    Ok(())
}
