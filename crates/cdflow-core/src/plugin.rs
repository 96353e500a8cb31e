//! Release plugins: the per component type build and publish step.

use std::path::Path;

use anyhow::Result;
use serde_json::{Map, Value};

use crate::account::AccountScheme;
use crate::aws::AwsSession;
use crate::component::ComponentType;
use crate::process::ProcessRunner;

pub mod ecs;
pub mod infrastructure;
pub mod lambda;

pub use ecs::DockerPlugin;
pub use infrastructure::InfrastructurePlugin;
pub use lambda::LambdaPlugin;

/// Extra fields merged into `release.json`.
pub type ReleaseData = Map<String, Value>;

/// Everything a plugin needs to build and publish an artefact.
pub struct ReleaseContext<'a> {
    pub runner: &'a dyn ProcessRunner,
    /// Session in the release account.
    pub session: &'a dyn AwsSession,
    pub scheme: &'a AccountScheme,
    pub component: &'a str,
    /// `None` for a local build that publishes nothing.
    pub version: Option<&'a str>,
    /// The component checkout.
    pub source_dir: &'a Path,
}

/// A contract for the build step of each component type.
pub trait ReleasePlugin: std::fmt::Debug {
    fn name(&self) -> &str;

    /// Builds the artefact and, when a version is given, publishes it.
    fn create(&self, ctx: &ReleaseContext<'_>) -> Result<ReleaseData>;
}

pub fn plugin_for(component_type: ComponentType) -> Box<dyn ReleasePlugin> {
    match component_type {
        ComponentType::Docker => Box::new(DockerPlugin),
        ComponentType::Lambda => Box::new(LambdaPlugin),
        ComponentType::Infrastructure => Box::new(InfrastructurePlugin),
    }
}
