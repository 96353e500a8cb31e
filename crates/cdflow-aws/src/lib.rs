//! AWS SDK implementation of the `cdflow-core` session seam.
//!
//! The SDK is async; every call is driven to completion on a tokio runtime
//! shared by a session and all sessions assumed from it.

use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use cdflow_core::aws::{DynamoDbApi, EcrApi, EcsApi, S3Api};
use cdflow_core::constants::DEFAULT_REGION;
use cdflow_core::{AwsCredentials, AwsError, AwsResult, AwsSession};
use tokio::runtime::Runtime;
use tracing::debug;

mod dynamodb;
mod ecr;
mod ecs;
mod s3;

pub use dynamodb::SdkDynamoDb;
pub use ecr::SdkEcr;
pub use ecs::SdkEcs;
pub use s3::SdkS3;

/// Converts an SDK error, keeping the service error code.
pub(crate) fn to_aws_error<E, R>(err: SdkError<E, R>) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(ToOwned::to_owned);
    AwsError {
        code,
        message: DisplayErrorContext(&err).to_string(),
    }
}

/// For request builders rejecting a missing required field.
pub(crate) fn build_error(err: impl std::fmt::Display) -> AwsError {
    AwsError::new(None, format!("invalid request: {err}"))
}

pub struct SdkSession {
    runtime: Arc<Runtime>,
    region: String,
    credentials: Option<AwsCredentials>,
    sts: aws_sdk_sts::Client,
    s3: SdkS3,
    dynamodb: SdkDynamoDb,
    ecr: SdkEcr,
    ecs: SdkEcs,
}

impl SdkSession {
    /// A session from the default credential chain. The region comes from
    /// the environment or profile, falling back to `eu-west-1`.
    pub fn from_environment() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start tokio runtime")?;
        let region = RegionProviderChain::default_provider().or_else(Region::new(DEFAULT_REGION));
        let config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .load(),
        );
        Ok(Self::from_config(Arc::new(runtime), &config, None))
    }

    fn from_config(
        runtime: Arc<Runtime>,
        config: &SdkConfig,
        credentials: Option<AwsCredentials>,
    ) -> Self {
        let region = config
            .region()
            .map(ToString::to_string)
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        debug!("aws session in {}", region);
        Self {
            sts: aws_sdk_sts::Client::new(config),
            s3: SdkS3::new(aws_sdk_s3::Client::new(config), Arc::clone(&runtime)),
            dynamodb: SdkDynamoDb::new(aws_sdk_dynamodb::Client::new(config), Arc::clone(&runtime)),
            ecr: SdkEcr::new(aws_sdk_ecr::Client::new(config), Arc::clone(&runtime)),
            ecs: SdkEcs::new(aws_sdk_ecs::Client::new(config), Arc::clone(&runtime)),
            runtime,
            region,
            credentials,
        }
    }
}

impl AwsSession for SdkSession {
    fn region(&self) -> &str {
        &self.region
    }

    fn credentials(&self) -> Option<&AwsCredentials> {
        self.credentials.as_ref()
    }

    fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        region: &str,
    ) -> AwsResult<Box<dyn AwsSession>> {
        let output = self
            .runtime
            .block_on(
                self.sts
                    .assume_role()
                    .role_arn(role_arn)
                    .role_session_name(session_name)
                    .send(),
            )
            .map_err(to_aws_error)?;
        let issued = output
            .credentials()
            .ok_or_else(|| AwsError::new(None, "assume role returned no credentials"))?;
        let credentials = AwsCredentials {
            access_key_id: issued.access_key_id().to_string(),
            secret_access_key: issued.secret_access_key().to_string(),
            session_token: Some(issued.session_token().to_string()),
        };

        let provider = aws_sdk_sts::config::Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            credentials.session_token.clone(),
            None,
            "cdflow",
        );
        let config = self.runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .credentials_provider(provider)
                .load(),
        );
        Ok(Box::new(Self::from_config(
            Arc::clone(&self.runtime),
            &config,
            Some(credentials),
        )))
    }

    fn s3(&self) -> &dyn S3Api {
        &self.s3
    }

    fn dynamodb(&self) -> &dyn DynamoDbApi {
        &self.dynamodb
    }

    fn ecr(&self) -> &dyn EcrApi {
        &self.ecr
    }

    fn ecs(&self) -> &dyn EcsApi {
        &self.ecs
    }
}
