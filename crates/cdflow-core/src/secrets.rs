use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::aws::{session_env, AwsSession};
use crate::constants::CREDSTASH_BINARY;
use crate::error::UserFacingError;
use crate::process::{Invocation, ProcessRunner};

/// Fetches the component's deploy secrets for an environment from credstash.
///
/// Secrets are stored as `deploy.<env>.<component>.<name>` in the team's
/// `credstash-<team>` table; the returned map is keyed by `<name>`.
#[instrument(skip(runner, session))]
pub fn get_secrets(
    runner: &dyn ProcessRunner,
    session: &dyn AwsSession,
    environment: &str,
    team: &str,
    component: &str,
) -> Result<BTreeMap<String, String>> {
    let table = format!("credstash-{team}");
    let prefix = format!("deploy.{environment}.{component}.");
    let base = Invocation::new(CREDSTASH_BINARY)
        .args(["-t", table.as_str(), "-r", session.region()])
        .envs(session_env(session));

    let listed = runner.capture(&base.clone().arg("list"))?;
    if !listed.success {
        if listed.stderr.contains("ResourceNotFoundException") {
            info!("no credstash table {}, deploying without secrets", table);
            return Ok(BTreeMap::new());
        }
        return Err(UserFacingError::Process(format!(
            "credstash list failed: {}",
            listed.stderr.trim()
        ))
        .into());
    }

    let names: Vec<&str> = listed
        .stdout
        .lines()
        .filter_map(|line| line.strip_prefix(prefix.as_str()))
        .filter_map(|rest| rest.split_whitespace().next())
        .collect();

    let mut secrets = BTreeMap::new();
    for name in names {
        debug!("fetching secret {}{}", prefix, name);
        let value = runner.check_output(&base.clone().args(["get", &format!("{prefix}{name}")]))?;
        let value = value.strip_suffix('\n').unwrap_or(&value).to_string();
        secrets.insert(name.to_string(), value);
    }
    Ok(secrets)
}
