use anyhow::Result;
use cdflow_core::shell::open_shell;
use tracing::instrument;

use crate::context::CommandContext;
use crate::ShellArgs;

/// Runs `cdflow shell`.
#[instrument(skip_all, fields(environment = %args.environment))]
pub fn run(args: &ShellArgs) -> Result<()> {
    let ctx = CommandContext::load(args.component.component.as_deref())?;
    let session = ctx.assume(ctx.environment_account(&args.environment)?)?;
    let shell = std::env::var("SHELL").ok();

    open_shell(
        &ctx.runner,
        session.as_ref(),
        &ctx.scheme,
        ctx.scope(&args.environment),
        shell.as_deref(),
    )
}
