use std::fs;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::account::AccountScheme;
use crate::aws::{session_env, AwsSession};
use crate::process::{Invocation, ProcessRunner};
use crate::state::{StateLocation, StateScope, TerraformState};

const DEFAULT_SHELL: &str = "/bin/bash";
const SHELL_DIR: &str = "infra";

/// Opens an interactive shell in a directory initialised against the
/// environment's state, with the environment's credentials exported.
#[instrument(skip(runner, session, scheme))]
pub fn open_shell(
    runner: &dyn ProcessRunner,
    session: &dyn AwsSession,
    scheme: &AccountScheme,
    scope: StateScope<'_>,
    shell: Option<&str>,
) -> Result<()> {
    let work_dir = tempfile::tempdir().context("failed to create shell directory")?;
    fs::create_dir(work_dir.path().join(SHELL_DIR)).context("failed to create shell directory")?;

    let location = StateLocation::resolve(session, scheme, scope)?;
    let state = TerraformState::initialise(
        runner,
        session,
        location,
        scope.environment,
        work_dir.path(),
        SHELL_DIR,
        false,
    )?;

    let shell = shell.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_SHELL);
    info!(
        "starting {} with state for {} in {}",
        shell,
        scope.environment,
        state.terraform_dir().display()
    );
    runner.run(
        &Invocation::new(shell)
            .envs(session_env(session))
            .current_dir(work_dir.path()),
    )
}
