//! Constants used across the cdflow workspace.

/// The manifest describing the component being released or deployed.
pub const MANIFEST_FILE: &str = "cdflow.yml";

/// Directory holding the component's Terraform code.
pub const INFRASTRUCTURE_DEFINITIONS_PATH: &str = "infra";

/// Directory holding per-environment Terraform variable files.
pub const CONFIG_BASE_PATH: &str = "config";
pub const GLOBAL_CONFIG_FILE: &str = "all.json";

/// Directory inside a release bundle holding platform configuration.
pub const PLATFORM_CONFIG_BASE_PATH: &str = "platform-config";

pub const RELEASE_METADATA_FILE: &str = "release.json";

pub const TERRAFORM_BINARY: &str = "terraform";
pub const DOCKER_BINARY: &str = "docker";
pub const CREDSTASH_BINARY: &str = "credstash";
pub const GIT_BINARY: &str = "git";

/// Name of the state object written by Terraform's S3 backend.
pub const TFSTATE_FILENAME: &str = "terraform.tfstate";

/// Region used when neither the environment nor the profile sets one.
pub const DEFAULT_REGION: &str = "eu-west-1";

/// Tag identifying the bucket that holds classic Terraform state.
pub const TFSTATE_TAG_NAME: &str = "is-cdflow-tfstate-bucket";
pub const TAG_VALUE: &str = "true";
pub const TFSTATE_NAME_PREFIX: &str = "cdflow-tfstate";
pub const MAX_BUCKET_CREATION_ATTEMPTS: usize = 10;

/// DynamoDB table used for classic Terraform state locking.
pub const LOCK_TABLE_NAME: &str = "terraform_locks";
pub const LOCK_TABLE_TAG_NAME: &str = "cdflow_terraform_locks";
pub const LOCK_TABLE_ID_COLUMN: &str = "LockID";
