use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::{ReleaseContext, ReleaseData, ReleasePlugin};
use crate::constants::DOCKER_BINARY;
use crate::process::Invocation;

const DEV_TAG: &str = "dev";

/// Builds a docker image and pushes it to the release account's ECR.
#[derive(Debug, Default, Clone, Copy)]
pub struct DockerPlugin;

impl DockerPlugin {
    pub fn image_name(ctx: &ReleaseContext<'_>) -> String {
        format!(
            "{}.dkr.ecr.{}.amazonaws.com/{}:{}",
            ctx.scheme.release_account.id,
            ctx.session.region(),
            ctx.component,
            ctx.version.unwrap_or(DEV_TAG)
        )
    }

    fn ensure_repository(&self, ctx: &ReleaseContext<'_>) -> Result<()> {
        let ecr = ctx.session.ecr();
        match ecr.describe_repository(ctx.component) {
            Ok(()) => {}
            Err(e) if e.has_code("RepositoryNotFoundException") => {
                info!("creating ECR repository {}", ctx.component);
                ecr.create_repository(ctx.component)
                    .with_context(|| format!("failed to create repository {}", ctx.component))?;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to describe repository {}", ctx.component))
            }
        }

        if let Some(policy) = pull_policy(ctx) {
            ecr.set_repository_policy(ctx.component, &policy.to_string())
                .with_context(|| format!("failed to set policy on {}", ctx.component))?;
        }
        Ok(())
    }

    fn login(&self, ctx: &ReleaseContext<'_>) -> Result<()> {
        let authorization = ctx
            .session
            .ecr()
            .authorization()
            .context("failed to get ECR authorization token")?;
        let decoded = STANDARD
            .decode(authorization.token.as_bytes())
            .context("ECR authorization token is not base64")?;
        let decoded = String::from_utf8(decoded).context("ECR authorization token is not UTF-8")?;
        let (username, password) = decoded
            .split_once(':')
            .context("ECR authorization token is not user:password")?;

        ctx.runner.run(
            &Invocation::new(DOCKER_BINARY)
                .args(["login", "-u", username, "-p", password])
                .arg(authorization.proxy_endpoint.as_str()),
        )
    }
}

/// Lets every non-release account in the scheme pull the image.
fn pull_policy(ctx: &ReleaseContext<'_>) -> Option<Value> {
    let statements: Vec<Value> = ctx
        .scheme
        .account_ids()
        .into_iter()
        .filter(|id| *id != ctx.scheme.release_account.id)
        .map(|id| {
            json!({
                "Sid": format!("allow_{id}"),
                "Effect": "Allow",
                "Principal": {"AWS": format!("arn:aws:iam::{id}:root")},
                "Action": [
                    "ecr:GetDownloadUrlForLayer",
                    "ecr:BatchGetImage",
                    "ecr:BatchCheckLayerAvailability"
                ]
            })
        })
        .collect();

    if statements.is_empty() {
        return None;
    }
    Some(json!({"Version": "2008-10-17", "Statement": statements}))
}

impl ReleasePlugin for DockerPlugin {
    fn name(&self) -> &str {
        "docker"
    }

    #[instrument(skip_all, fields(component = ctx.component))]
    fn create(&self, ctx: &ReleaseContext<'_>) -> Result<ReleaseData> {
        let image = Self::image_name(ctx);
        info!("building {}", image);
        ctx.runner.run(
            &Invocation::new(DOCKER_BINARY)
                .args(["build", "-t", image.as_str(), "."])
                .current_dir(ctx.source_dir),
        )?;

        if ctx.version.is_some() {
            self.ensure_repository(ctx)?;
            self.login(ctx)?;
            info!("pushing {}", image);
            ctx.runner
                .run(&Invocation::new(DOCKER_BINARY).args(["push", image.as_str()]))?;
        }

        let mut data = ReleaseData::new();
        data.insert("image_id".to_string(), Value::String(image));
        Ok(data)
    }
}
