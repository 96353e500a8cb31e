use std::fs;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, instrument};

use super::{ReleaseContext, ReleaseData, ReleasePlugin};
use crate::archive::zip_dir;
use crate::error::UserFacingError;

/// Zips the `<component>/` source directory and uploads it to the scheme's
/// lambda bucket.
#[derive(Debug, Default, Clone, Copy)]
pub struct LambdaPlugin;

impl ReleasePlugin for LambdaPlugin {
    fn name(&self) -> &str {
        "lambda"
    }

    #[instrument(skip_all, fields(component = ctx.component))]
    fn create(&self, ctx: &ReleaseContext<'_>) -> Result<ReleaseData> {
        let source = ctx.source_dir.join(ctx.component);
        let zip_path = ctx.source_dir.join(format!("{}.zip", ctx.component));
        zip_dir(&source, ctx.component, &zip_path)
            .with_context(|| format!("failed to zip {}", source.display()))?;

        let Some(version) = ctx.version else {
            info!("built {}", zip_path.display());
            return Ok(ReleaseData::new());
        };

        let bucket = ctx.scheme.lambda_bucket.as_str();
        if bucket.is_empty() {
            return Err(UserFacingError::MissingLambdaBucket.into());
        }
        let key = format!("{}/{}.zip", ctx.component, version);
        info!("uploading {} to s3://{}/{}", zip_path.display(), bucket, key);
        ctx.session
            .s3()
            .upload_file(bucket, &key, &zip_path)
            .with_context(|| format!("failed to upload s3://{}/{}", bucket, key))?;
        fs::remove_file(&zip_path)
            .with_context(|| format!("failed to remove {}", zip_path.display()))?;

        let mut data = ReleaseData::new();
        data.insert("s3_bucket".to_string(), Value::String(bucket.to_string()));
        data.insert("s3_key".to_string(), Value::String(key));
        Ok(data)
    }
}
