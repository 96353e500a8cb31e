use anyhow::Result;

use super::{ReleaseContext, ReleaseData, ReleasePlugin};

/// Infrastructure-only components ship nothing but their Terraform code.
#[derive(Debug, Default, Clone, Copy)]
pub struct InfrastructurePlugin;

impl ReleasePlugin for InfrastructurePlugin {
    fn name(&self) -> &str {
        "infrastructure"
    }

    fn create(&self, _ctx: &ReleaseContext<'_>) -> Result<ReleaseData> {
        Ok(ReleaseData::new())
    }
}
