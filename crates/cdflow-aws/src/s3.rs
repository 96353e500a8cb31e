use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, Tag, Tagging};
use aws_sdk_s3::Client;
use cdflow_core::aws::S3Api;
use cdflow_core::{AwsError, AwsResult};
use tokio::runtime::Runtime;

use crate::{build_error, to_aws_error};

/// Buckets in us-east-1 are created without a location constraint.
const NO_CONSTRAINT_REGION: &str = "us-east-1";

pub struct SdkS3 {
    client: Client,
    runtime: Arc<Runtime>,
}

impl SdkS3 {
    pub(crate) fn new(client: Client, runtime: Arc<Runtime>) -> Self {
        Self { client, runtime }
    }
}

impl S3Api for SdkS3 {
    fn list_buckets(&self) -> AwsResult<Vec<String>> {
        let output = self
            .runtime
            .block_on(self.client.list_buckets().send())
            .map_err(to_aws_error)?;
        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(ToOwned::to_owned))
            .collect())
    }

    fn bucket_tags(&self, bucket: &str) -> AwsResult<HashMap<String, String>> {
        let output = self
            .runtime
            .block_on(self.client.get_bucket_tagging().bucket(bucket).send())
            .map_err(to_aws_error)?;
        Ok(output
            .tag_set()
            .iter()
            .map(|tag| (tag.key().to_string(), tag.value().to_string()))
            .collect())
    }

    fn bucket_location(&self, bucket: &str) -> AwsResult<Option<String>> {
        let output = self
            .runtime
            .block_on(self.client.get_bucket_location().bucket(bucket).send())
            .map_err(to_aws_error)?;
        Ok(output
            .location_constraint()
            .map(|c| c.as_str().to_string()))
    }

    fn create_bucket(&self, bucket: &str, region: &str) -> AwsResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if region != NO_CONSTRAINT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        self.runtime
            .block_on(request.send())
            .map_err(to_aws_error)?;
        Ok(())
    }

    fn put_bucket_tags(&self, bucket: &str, tags: &[(&str, &str)]) -> AwsResult<()> {
        let tag_set = tags
            .iter()
            .map(|(key, value)| {
                Tag::builder()
                    .key(*key)
                    .value(*value)
                    .build()
                    .map_err(build_error)
            })
            .collect::<AwsResult<Vec<_>>>()?;
        let tagging = Tagging::builder()
            .set_tag_set(Some(tag_set))
            .build()
            .map_err(build_error)?;
        self.runtime
            .block_on(
                self.client
                    .put_bucket_tagging()
                    .bucket(bucket)
                    .tagging(tagging)
                    .send(),
            )
            .map_err(to_aws_error)?;
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str) -> AwsResult<Vec<u8>> {
        self.runtime.block_on(async {
            let output = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(to_aws_error)?;
            let body = output
                .body
                .collect()
                .await
                .map_err(|e| AwsError::new(None, format!("failed to read s3://{bucket}/{key}: {e}")))?;
            Ok::<_, AwsError>(body.into_bytes().to_vec())
        })
    }

    fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> AwsResult<()> {
        self.runtime.block_on(async {
            let body = ByteStream::from_path(path)
                .await
                .map_err(|e| AwsError::new(None, format!("failed to read {}: {e}", path.display())))?;
            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map_err(to_aws_error)?;
            Ok::<_, AwsError>(())
        })
    }

    fn delete_object(&self, bucket: &str, key: &str) -> AwsResult<()> {
        self.runtime
            .block_on(self.client.delete_object().bucket(bucket).key(key).send())
            .map_err(to_aws_error)?;
        Ok(())
    }
}
