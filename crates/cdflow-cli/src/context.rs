use std::path::PathBuf;

use anyhow::{Context, Result};
use cdflow_aws::SdkSession;
use cdflow_core::config::{component_name, load_account_scheme, role_session_name_from_env};
use cdflow_core::state::StateScope;
use cdflow_core::{aws, Account, AccountScheme, AwsSession, Manifest, SystemRunner};
use tracing::{info, instrument};

/// Everything every command resolves before doing its work.
pub struct CommandContext {
    pub runner: SystemRunner,
    pub root: SdkSession,
    pub manifest: Manifest,
    pub scheme: AccountScheme,
    pub component: String,
    pub session_name: String,
    pub cwd: PathBuf,
}

impl CommandContext {
    #[instrument]
    pub fn load(component: Option<&str>) -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to read working directory")?;
        let manifest = Manifest::load(&cwd)?;
        let root = SdkSession::from_environment()?;
        let scheme = load_account_scheme(&root, &manifest.account_scheme_url)?;
        let runner = SystemRunner;
        let component = component_name(&runner, component, &cwd)?;
        let session_name = role_session_name_from_env()?;
        info!(target: "cdflow", "component {} ({})", component, manifest.component_type);

        Ok(Self {
            runner,
            root,
            manifest,
            scheme,
            component,
            session_name,
            cwd,
        })
    }

    pub fn assume(&self, account: &Account) -> Result<Box<dyn AwsSession>> {
        aws::assume_role(&self.root, account, &self.scheme, &self.session_name)
    }

    pub fn release_session(&self) -> Result<Box<dyn AwsSession>> {
        self.assume(&self.scheme.release_account)
    }

    pub fn environment_account(&self, environment: &str) -> Result<&Account> {
        Ok(self.scheme.account_for_environment(environment)?)
    }

    pub fn scope<'a>(&'a self, environment: &'a str) -> StateScope<'a> {
        StateScope {
            environment,
            component: &self.component,
            team: &self.manifest.team,
        }
    }
}
