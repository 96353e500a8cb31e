use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::{info, instrument};

use crate::aws::{session_env, AwsSession};
use crate::constants::{
    CONFIG_BASE_PATH, GLOBAL_CONFIG_FILE, INFRASTRUCTURE_DEFINITIONS_PATH,
    PLATFORM_CONFIG_BASE_PATH, RELEASE_METADATA_FILE, TERRAFORM_BINARY,
};
use crate::process::{Invocation, ProcessRunner};

/// `plan-<unix time>`, shared by the plan and apply of one run.
pub fn plan_file_name() -> String {
    format!("plan-{}", chrono::Utc::now().timestamp())
}

/// Writes `{"secrets": {...}}` to a temporary file for `-var-file`.
pub fn write_secrets_file(secrets: &BTreeMap<String, String>) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("cdflow_secrets_")
        .suffix(".json")
        .tempfile()
        .context("failed to create secrets file")?;
    serde_json::to_writer(&mut file, &json!({ "secrets": secrets }))
        .context("failed to write secrets file")?;
    file.flush().context("failed to flush secrets file")?;
    Ok(file)
}

/// Plans and applies a fetched release into an environment.
pub struct Deploy<'a> {
    pub runner: &'a dyn ProcessRunner,
    /// Session in the environment's account.
    pub session: &'a dyn AwsSession,
    pub release_dir: &'a Path,
    pub environment: &'a str,
    /// Alias of the environment's account, naming its platform config.
    pub account_alias: &'a str,
}

impl Deploy<'_> {
    fn platform_config_file(&self) -> PathBuf {
        Path::new(PLATFORM_CONFIG_BASE_PATH)
            .join(self.account_alias)
            .join(format!("{}.json", self.session.region()))
    }

    pub fn plan_args(&self, secrets_file: &Path, plan_file: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "plan".into(),
            "-input=false".into(),
            "-var".into(),
            format!("env={}", self.environment),
            "-var".into(),
            format!("aws_region={}", self.session.region()),
            "-var-file".into(),
            RELEASE_METADATA_FILE.into(),
            "-var-file".into(),
            self.platform_config_file().display().to_string(),
            "-var-file".into(),
            secrets_file.display().to_string(),
        ];

        let config = Path::new(CONFIG_BASE_PATH);
        for file in [
            config.join(format!("{}.json", self.environment)),
            config.join(GLOBAL_CONFIG_FILE),
        ] {
            if self.release_dir.join(&file).is_file() {
                args.push("-var-file".into());
                args.push(file.display().to_string());
            }
        }

        args.extend([
            "-out".into(),
            plan_file.to_string(),
            INFRASTRUCTURE_DEFINITIONS_PATH.into(),
        ]);
        args
    }

    #[instrument(skip_all, fields(environment = self.environment))]
    pub fn run(
        &self,
        secrets: &BTreeMap<String, String>,
        plan_only: bool,
    ) -> Result<()> {
        let secrets_file = write_secrets_file(secrets)?;
        let plan_file = plan_file_name();
        let env = session_env(self.session);

        info!("planning deployment to {}", self.environment);
        self.runner.run(
            &Invocation::new(TERRAFORM_BINARY)
                .args(self.plan_args(secrets_file.path(), &plan_file))
                .envs(env.clone())
                .current_dir(self.release_dir),
        )?;

        if plan_only {
            info!("plan only, not applying");
            return Ok(());
        }

        info!("applying {}", plan_file);
        self.runner.run(
            &Invocation::new(TERRAFORM_BINARY)
                .args(["apply", "-input=false", plan_file.as_str()])
                .envs(env)
                .current_dir(self.release_dir),
        )
    }
}
