use std::sync::Arc;

use aws_sdk_ecr::Client;
use cdflow_core::aws::{EcrApi, RegistryAuthorization};
use cdflow_core::{AwsError, AwsResult};
use tokio::runtime::Runtime;

use crate::to_aws_error;

pub struct SdkEcr {
    client: Client,
    runtime: Arc<Runtime>,
}

impl SdkEcr {
    pub(crate) fn new(client: Client, runtime: Arc<Runtime>) -> Self {
        Self { client, runtime }
    }
}

impl EcrApi for SdkEcr {
    fn describe_repository(&self, name: &str) -> AwsResult<()> {
        self.runtime
            .block_on(
                self.client
                    .describe_repositories()
                    .repository_names(name)
                    .send(),
            )
            .map_err(to_aws_error)?;
        Ok(())
    }

    fn create_repository(&self, name: &str) -> AwsResult<()> {
        self.runtime
            .block_on(self.client.create_repository().repository_name(name).send())
            .map_err(to_aws_error)?;
        Ok(())
    }

    fn set_repository_policy(&self, name: &str, policy: &str) -> AwsResult<()> {
        self.runtime
            .block_on(
                self.client
                    .set_repository_policy()
                    .repository_name(name)
                    .policy_text(policy)
                    .send(),
            )
            .map_err(to_aws_error)?;
        Ok(())
    }

    fn authorization(&self) -> AwsResult<RegistryAuthorization> {
        let output = self
            .runtime
            .block_on(self.client.get_authorization_token().send())
            .map_err(to_aws_error)?;
        let data = output
            .authorization_data()
            .first()
            .ok_or_else(|| AwsError::new(None, "no ECR authorization data returned"))?;
        match (data.authorization_token(), data.proxy_endpoint()) {
            (Some(token), Some(endpoint)) => Ok(RegistryAuthorization {
                token: token.to_string(),
                proxy_endpoint: endpoint.to_string(),
            }),
            _ => Err(AwsError::new(None, "incomplete ECR authorization data")),
        }
    }
}
