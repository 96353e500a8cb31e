use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::account::AccountScheme;
use crate::aws::{session_env, AwsSession};
use crate::constants::TERRAFORM_BINARY;
use crate::deploy::plan_file_name;
use crate::process::{Invocation, ProcessRunner};
use crate::state::{StateLocation, StateScope, TerraformState};

const DESTROY_DIR: &str = "destroy";

/// Terraform with no resources: planning it against existing state destroys
/// everything the state holds.
const DESTROY_DEFINITION: &str = r#"variable "aws_region" {}

provider "aws" {
  region = var.aws_region
}
"#;

pub fn write_destroy_definition(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join("main.tf");
    fs::write(&path, DESTROY_DEFINITION)
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Tears down everything a component has deployed into an environment.
pub struct Destroy<'a> {
    pub runner: &'a dyn ProcessRunner,
    /// Session in the environment's account.
    pub session: &'a dyn AwsSession,
    pub scheme: &'a AccountScheme,
    pub scope: StateScope<'a>,
}

impl Destroy<'_> {
    #[instrument(skip_all, fields(environment = self.scope.environment, component = self.scope.component))]
    pub fn run(&self, plan_only: bool) -> Result<()> {
        let work_dir = tempfile::tempdir().context("failed to create destroy directory")?;
        write_destroy_definition(&work_dir.path().join(DESTROY_DIR))?;

        let location = StateLocation::resolve(self.session, self.scheme, self.scope)?;
        let state = TerraformState::initialise(
            self.runner,
            self.session,
            location,
            self.scope.environment,
            work_dir.path(),
            DESTROY_DIR,
            true,
        )?;

        let plan_file = plan_file_name();
        let env = session_env(self.session);
        let aws_region = format!("aws_region={}", self.session.region());
        info!("planning destruction of {}", self.scope.component);
        self.runner.run(
            &Invocation::new(TERRAFORM_BINARY)
                .args([
                    "plan",
                    "-destroy",
                    "-input=false",
                    "-var",
                    aws_region.as_str(),
                    "-out",
                    plan_file.as_str(),
                    DESTROY_DIR,
                ])
                .envs(env.clone())
                .current_dir(work_dir.path()),
        )?;

        if plan_only {
            return Ok(());
        }

        self.runner.run(
            &Invocation::new(TERRAFORM_BINARY)
                .args(["apply", "-input=false", plan_file.as_str()])
                .envs(env)
                .current_dir(work_dir.path()),
        )?;
        state.remove(self.session)
    }
}
