use std::collections::HashMap;
use std::sync::Arc;

use aws_sdk_dynamodb::types::{
    AttributeDefinition, KeySchemaElement, KeyType, ProvisionedThroughput, ScalarAttributeType,
    Tag,
};
use aws_sdk_dynamodb::Client;
use cdflow_core::aws::{DynamoDbApi, TableDescription};
use cdflow_core::{AwsError, AwsResult};
use tokio::runtime::Runtime;

use crate::{build_error, to_aws_error};

pub struct SdkDynamoDb {
    client: Client,
    runtime: Arc<Runtime>,
}

impl SdkDynamoDb {
    pub(crate) fn new(client: Client, runtime: Arc<Runtime>) -> Self {
        Self { client, runtime }
    }
}

impl DynamoDbApi for SdkDynamoDb {
    fn describe_table(&self, name: &str) -> AwsResult<TableDescription> {
        let output = self
            .runtime
            .block_on(self.client.describe_table().table_name(name).send())
            .map_err(to_aws_error)?;
        let table = output
            .table()
            .ok_or_else(|| AwsError::new(None, format!("no description for table {name}")))?;
        Ok(TableDescription {
            name: table.table_name().unwrap_or(name).to_string(),
            arn: table.table_arn().unwrap_or_default().to_string(),
            status: table
                .table_status()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            attribute_names: table
                .attribute_definitions()
                .iter()
                .map(|a| a.attribute_name().to_string())
                .collect(),
        })
    }

    fn list_tags(&self, arn: &str) -> AwsResult<HashMap<String, String>> {
        let output = self
            .runtime
            .block_on(self.client.list_tags_of_resource().resource_arn(arn).send())
            .map_err(to_aws_error)?;
        Ok(output
            .tags()
            .iter()
            .map(|tag| (tag.key().to_string(), tag.value().to_string()))
            .collect())
    }

    fn create_lock_table(&self, name: &str, hash_key: &str) -> AwsResult<String> {
        let attribute = AttributeDefinition::builder()
            .attribute_name(hash_key)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(build_error)?;
        let key = KeySchemaElement::builder()
            .attribute_name(hash_key)
            .key_type(KeyType::Hash)
            .build()
            .map_err(build_error)?;
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(1)
            .write_capacity_units(1)
            .build()
            .map_err(build_error)?;

        let output = self
            .runtime
            .block_on(
                self.client
                    .create_table()
                    .table_name(name)
                    .attribute_definitions(attribute)
                    .key_schema(key)
                    .provisioned_throughput(throughput)
                    .send(),
            )
            .map_err(to_aws_error)?;
        output
            .table_description()
            .and_then(|t| t.table_arn())
            .map(ToOwned::to_owned)
            .ok_or_else(|| AwsError::new(None, format!("no ARN returned for table {name}")))
    }

    fn tag_resource(&self, arn: &str, tags: &[(&str, &str)]) -> AwsResult<()> {
        let mut request = self.client.tag_resource().resource_arn(arn);
        for (key, value) in tags {
            request = request.tags(
                Tag::builder()
                    .key(*key)
                    .value(*value)
                    .build()
                    .map_err(build_error)?,
            );
        }
        self.runtime
            .block_on(request.send())
            .map_err(to_aws_error)?;
        Ok(())
    }
}
