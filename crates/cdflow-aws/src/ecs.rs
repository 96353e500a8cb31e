use std::sync::Arc;

use aws_sdk_ecs::Client;
use cdflow_core::aws::{EcsApi, EcsDeployment, EcsService};
use cdflow_core::{AwsError, AwsResult};
use tokio::runtime::Runtime;

use crate::to_aws_error;

pub struct SdkEcs {
    client: Client,
    runtime: Arc<Runtime>,
}

impl SdkEcs {
    pub(crate) fn new(client: Client, runtime: Arc<Runtime>) -> Self {
        Self { client, runtime }
    }
}

impl EcsApi for SdkEcs {
    fn describe_service(&self, cluster: &str, service: &str) -> AwsResult<EcsService> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .describe_services()
                    .cluster(cluster)
                    .services(service)
                    .send(),
            )
            .map_err(to_aws_error)?;
        let described = output.services().first().ok_or_else(|| {
            AwsError::new(
                Some("ServiceNotFoundException"),
                format!("service {service} not found in cluster {cluster}"),
            )
        })?;

        Ok(EcsService {
            deployments: described
                .deployments()
                .iter()
                .map(|d| EcsDeployment {
                    status: d.status().unwrap_or_default().to_string(),
                    task_definition: d.task_definition().unwrap_or_default().to_string(),
                    desired_count: d.desired_count(),
                    pending_count: d.pending_count(),
                    running_count: d.running_count(),
                })
                .collect(),
            events: described
                .events()
                .iter()
                .filter_map(|e| e.message().map(ToOwned::to_owned))
                .collect(),
        })
    }

    fn task_definition_image(&self, task_definition: &str) -> AwsResult<String> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .describe_task_definition()
                    .task_definition(task_definition)
                    .send(),
            )
            .map_err(to_aws_error)?;
        output
            .task_definition()
            .and_then(|t| t.container_definitions().first())
            .and_then(|c| c.image())
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                AwsError::new(None, format!("task definition {task_definition} has no image"))
            })
    }
}
