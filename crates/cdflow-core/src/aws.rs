//! The seam between cdflow and AWS.
//!
//! Orchestration code only talks to these traits. `cdflow-aws` implements
//! them over the AWS SDK; tests implement them in memory.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Formatter};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::account::{Account, AccountScheme};
use crate::error::AwsResult;

/// Temporary credentials of an assumed role.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Debug for AwsCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A DynamoDB table as far as lock table discovery cares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDescription {
    pub name: String,
    pub arn: String,
    pub status: String,
    pub attribute_names: Vec<String>,
}

/// Credentials for `docker login` against a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuthorization {
    /// Base64 encoded `user:password`.
    pub token: String,
    pub proxy_endpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EcsDeployment {
    pub status: String,
    pub task_definition: String,
    pub desired_count: i32,
    pub pending_count: i32,
    pub running_count: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EcsService {
    pub deployments: Vec<EcsDeployment>,
    pub events: Vec<String>,
}

pub trait S3Api {
    fn list_buckets(&self) -> AwsResult<Vec<String>>;
    /// Fails with `NoSuchTagSet` when the bucket has never been tagged.
    fn bucket_tags(&self, bucket: &str) -> AwsResult<HashMap<String, String>>;
    /// The raw `LocationConstraint`; `None` for the us-east-1 default.
    fn bucket_location(&self, bucket: &str) -> AwsResult<Option<String>>;
    fn create_bucket(&self, bucket: &str, region: &str) -> AwsResult<()>;
    fn put_bucket_tags(&self, bucket: &str, tags: &[(&str, &str)]) -> AwsResult<()>;
    fn get_object(&self, bucket: &str, key: &str) -> AwsResult<Vec<u8>>;
    fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> AwsResult<()>;
    fn delete_object(&self, bucket: &str, key: &str) -> AwsResult<()>;
}

pub trait DynamoDbApi {
    fn describe_table(&self, name: &str) -> AwsResult<TableDescription>;
    fn list_tags(&self, arn: &str) -> AwsResult<HashMap<String, String>>;
    /// Creates a table keyed by a single string hash attribute and returns its ARN.
    fn create_lock_table(&self, name: &str, hash_key: &str) -> AwsResult<String>;
    fn tag_resource(&self, arn: &str, tags: &[(&str, &str)]) -> AwsResult<()>;
}

pub trait EcrApi {
    fn describe_repository(&self, name: &str) -> AwsResult<()>;
    fn create_repository(&self, name: &str) -> AwsResult<()>;
    fn set_repository_policy(&self, name: &str, policy: &str) -> AwsResult<()>;
    fn authorization(&self) -> AwsResult<RegistryAuthorization>;
}

pub trait EcsApi {
    fn describe_service(&self, cluster: &str, service: &str) -> AwsResult<EcsService>;
    /// Image of the first container in the task definition.
    fn task_definition_image(&self, task_definition: &str) -> AwsResult<String>;
}

/// An authenticated AWS session bound to a region.
pub trait AwsSession {
    fn region(&self) -> &str;
    /// Credentials to hand to child processes. Root sessions using the
    /// ambient credential chain return `None`.
    fn credentials(&self) -> Option<&AwsCredentials>;
    fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        region: &str,
    ) -> AwsResult<Box<dyn AwsSession>>;
    fn s3(&self) -> &dyn S3Api;
    fn dynamodb(&self) -> &dyn DynamoDbApi;
    fn ecr(&self) -> &dyn EcrApi;
    fn ecs(&self) -> &dyn EcsApi;
}

/// Assumes the account's role in the scheme's default region.
pub fn assume_role(
    root: &dyn AwsSession,
    account: &Account,
    scheme: &AccountScheme,
    session_name: &str,
) -> Result<Box<dyn AwsSession>> {
    let role_arn = account.role_arn();
    info!("assuming role {} in account {}", account.role, account.id);
    root.assume_role(&role_arn, session_name, &scheme.default_region)
        .with_context(|| format!("failed to assume role {}", role_arn))
}

/// Environment variables that give a child process the session's identity.
pub fn session_env(session: &dyn AwsSession) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    if let Some(credentials) = session.credentials() {
        env.insert(
            "AWS_ACCESS_KEY_ID".to_string(),
            credentials.access_key_id.clone(),
        );
        env.insert(
            "AWS_SECRET_ACCESS_KEY".to_string(),
            credentials.secret_access_key.clone(),
        );
        if let Some(token) = &credentials.session_token {
            env.insert("AWS_SESSION_TOKEN".to_string(), token.clone());
        }
    }
    env.insert("AWS_DEFAULT_REGION".to_string(), session.region().to_string());
    env
}
