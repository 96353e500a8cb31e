use anyhow::Result;
use cdflow_core::plugin::{plugin_for, ReleaseContext};
use cdflow_core::release::{current_commit, Release};
use tracing::{info, instrument};

use crate::context::CommandContext;
use crate::ReleaseArgs;

/// Runs `cdflow release`.
#[instrument(skip_all, fields(version = ?args.version))]
pub fn run(args: &ReleaseArgs) -> Result<()> {
    let ctx = CommandContext::load(args.component.component.as_deref())?;
    let session = ctx.release_session()?;
    let plugin = plugin_for(ctx.manifest.component_type);

    let Some(version) = args.version.as_deref() else {
        info!(target: "cdflow", "no version given, building {} locally", ctx.component);
        plugin.create(&ReleaseContext {
            runner: &ctx.runner,
            session: session.as_ref(),
            scheme: &ctx.scheme,
            component: &ctx.component,
            version: None,
            source_dir: &ctx.cwd,
        })?;
        return Ok(());
    };

    let commit = match &args.commit {
        Some(commit) => commit.clone(),
        None => current_commit(&ctx.runner, &ctx.cwd)?,
    };

    let key = Release {
        runner: &ctx.runner,
        session: session.as_ref(),
        scheme: &ctx.scheme,
        source_dir: &ctx.cwd,
        platform_config: args.platform_config.as_deref(),
        commit: &commit,
        version,
        component: &ctx.component,
        team: &ctx.manifest.team,
    }
    .create(plugin.as_ref())?;

    info!(
        target: "cdflow",
        "released {} {} to s3://{}/{}",
        ctx.component,
        version,
        ctx.scheme.release_bucket,
        key
    );
    Ok(())
}
