use anyhow::Result;
use cdflow_core::constants::INFRASTRUCTURE_DEFINITIONS_PATH;
use cdflow_core::deploy::Deploy;
use cdflow_core::monitor::EcsMonitor;
use cdflow_core::release::fetch_release;
use cdflow_core::secrets::get_secrets;
use cdflow_core::state::{StateLocation, TerraformState};
use cdflow_core::ComponentType;
use tracing::{info, instrument};

use crate::context::CommandContext;
use crate::DeployArgs;

/// Runs `cdflow deploy`.
#[instrument(skip_all, fields(environment = %args.environment, version = %args.version))]
pub fn run(args: &DeployArgs) -> Result<()> {
    let ctx = CommandContext::load(args.component.component.as_deref())?;
    let account = ctx.environment_account(&args.environment)?;
    let session = ctx.assume(account)?;
    let session = session.as_ref();

    let release_session = ctx.release_session()?;
    let release = fetch_release(
        release_session.as_ref(),
        &ctx.scheme.release_bucket,
        &ctx.component,
        &args.version,
    )?;

    let scope = ctx.scope(&args.environment);
    let location = StateLocation::resolve(session, &ctx.scheme, scope)?;
    let _state = TerraformState::initialise(
        &ctx.runner,
        session,
        location,
        &args.environment,
        release.path(),
        INFRASTRUCTURE_DEFINITIONS_PATH,
        false,
    )?;

    let secrets = get_secrets(
        &ctx.runner,
        session,
        &args.environment,
        &ctx.manifest.team,
        &ctx.component,
    )?;

    Deploy {
        runner: &ctx.runner,
        session,
        release_dir: release.path(),
        environment: &args.environment,
        account_alias: &account.alias,
    }
    .run(&secrets, args.plan_only)?;

    if args.plan_only {
        return Ok(());
    }

    if let (ComponentType::Docker, Some(cluster)) =
        (ctx.manifest.component_type, ctx.manifest.ecs_cluster.as_deref())
    {
        EcsMonitor::new(session, cluster, &args.environment, &ctx.component, &args.version)
            .wait()?;
    }

    info!(
        target: "cdflow",
        "deployed {} {} to {}",
        ctx.component,
        args.version,
        args.environment
    );
    Ok(())
}
