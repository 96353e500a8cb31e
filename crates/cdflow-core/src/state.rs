//! Terraform remote state: discovering (or creating) the S3 bucket and
//! DynamoDB lock table, and initialising Terraform against them.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use sha1::{Digest, Sha1};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::account::{AccountScheme, Backend};
use crate::aws::{session_env, AwsSession};
use crate::constants::{
    LOCK_TABLE_ID_COLUMN, LOCK_TABLE_NAME, LOCK_TABLE_TAG_NAME, MAX_BUCKET_CREATION_ATTEMPTS,
    TAG_VALUE, TERRAFORM_BINARY, TFSTATE_FILENAME, TFSTATE_NAME_PREFIX, TFSTATE_TAG_NAME,
};
use crate::process::{Invocation, ProcessRunner};

const BACKEND_DEFINITION: &str = r#"terraform {
  backend "s3" {
  }
}
"#;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("multiple buckets with {}={} tag found", TFSTATE_TAG_NAME, TAG_VALUE)]
    MultipleBuckets,
    #[error("could not create bucket after {0} attempts")]
    BucketCreationExhausted(usize),
    #[error("no tag {} found for {}", LOCK_TABLE_TAG_NAME, .0)]
    MissingTag(String),
    #[error("no attribute {} in table {}", LOCK_TABLE_ID_COLUMN, .0)]
    IncorrectSchema(String),
    #[error("table {0} did not become ACTIVE")]
    TableNotActive(String),
}

/// Bucket location constraints name a few regions by legacy aliases.
pub(crate) fn normalise_location(location: Option<&str>) -> &str {
    match location {
        None | Some("") => "us-east-1",
        Some("EU") => "eu-west-1",
        Some(region) => region,
    }
}

pub fn bucket_name_for_attempt(region: &str, account_id: &str, attempt: usize) -> String {
    let digest = Sha1::digest(format!("{region}{account_id}{attempt}").as_bytes());
    format!("{}-{}", TFSTATE_NAME_PREFIX, &format!("{:x}", digest)[..12])
}

/// Finds the account's tagged state bucket in the session region, creating
/// one when none exists.
pub struct S3BucketFactory<'a> {
    session: &'a dyn AwsSession,
    account_id: &'a str,
}

impl<'a> S3BucketFactory<'a> {
    pub fn new(session: &'a dyn AwsSession, account_id: &'a str) -> Self {
        Self {
            session,
            account_id,
        }
    }

    #[instrument(skip(self), fields(region = self.session.region()))]
    pub fn get_bucket_name(&self) -> Result<String> {
        let s3 = self.session.s3();
        let mut tagged = Vec::new();
        for bucket in s3.list_buckets().context("failed to list buckets")? {
            if self.in_session_region(&bucket)? && self.has_tag(&bucket)? {
                tagged.push(bucket);
            }
        }

        match tagged.len() {
            0 => self.create_bucket(),
            1 => Ok(tagged.remove(0)),
            _ => Err(StateError::MultipleBuckets.into()),
        }
    }

    fn has_tag(&self, bucket: &str) -> Result<bool> {
        match self.session.s3().bucket_tags(bucket) {
            Ok(tags) => Ok(tags.get(TFSTATE_TAG_NAME).map(String::as_str) == Some(TAG_VALUE)),
            Err(e) if e.has_code("NoSuchTagSet") => Ok(false),
            Err(e) => Err(e).with_context(|| format!("failed to get tags of bucket {}", bucket)),
        }
    }

    fn in_session_region(&self, bucket: &str) -> Result<bool> {
        let location = self
            .session
            .s3()
            .bucket_location(bucket)
            .with_context(|| format!("failed to get location of bucket {}", bucket))?;
        Ok(normalise_location(location.as_deref()) == self.session.region())
    }

    fn create_bucket(&self) -> Result<String> {
        let region = self.session.region();
        for attempt in 0..MAX_BUCKET_CREATION_ATTEMPTS {
            let name = bucket_name_for_attempt(region, self.account_id, attempt);
            match self.session.s3().create_bucket(&name, region) {
                Ok(()) => {
                    info!("created state bucket {}", name);
                    self.session
                        .s3()
                        .put_bucket_tags(&name, &[(TFSTATE_TAG_NAME, TAG_VALUE)])
                        .with_context(|| format!("failed to tag bucket {}", name))?;
                    return Ok(name);
                }
                Err(e)
                    if e.has_code("BucketAlreadyExists")
                        || e.has_code("BucketAlreadyOwnedByYou") =>
                {
                    debug!("bucket {} is taken, trying the next name", name);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to create bucket {}", name))
                }
            }
        }
        Err(StateError::BucketCreationExhausted(MAX_BUCKET_CREATION_ATTEMPTS).into())
    }
}

/// Finds the account's Terraform lock table, creating it when missing.
pub struct LockTableFactory<'a> {
    session: &'a dyn AwsSession,
    poll_interval: Duration,
    max_polls: usize,
}

impl<'a> LockTableFactory<'a> {
    pub fn new(session: &'a dyn AwsSession) -> Self {
        Self {
            session,
            poll_interval: Duration::from_secs(20),
            max_polls: 25,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[instrument(skip(self))]
    pub fn get_table_name(&self) -> Result<String> {
        let dynamodb = self.session.dynamodb();
        match dynamodb.describe_table(LOCK_TABLE_NAME) {
            Ok(table) => {
                let tags = dynamodb
                    .list_tags(&table.arn)
                    .with_context(|| format!("failed to list tags of {}", table.arn))?;
                if tags.get(LOCK_TABLE_TAG_NAME).map(String::as_str) != Some(TAG_VALUE) {
                    return Err(StateError::MissingTag(table.arn).into());
                }
                if !table.attribute_names.iter().any(|a| a == LOCK_TABLE_ID_COLUMN) {
                    return Err(StateError::IncorrectSchema(table.name).into());
                }
                Ok(table.name)
            }
            Err(e) if e.has_code("ResourceNotFoundException") => self.create_table(),
            Err(e) => Err(e).context("failed to describe lock table"),
        }
    }

    fn create_table(&self) -> Result<String> {
        let dynamodb = self.session.dynamodb();
        info!("creating lock table {}", LOCK_TABLE_NAME);
        let arn = dynamodb
            .create_lock_table(LOCK_TABLE_NAME, LOCK_TABLE_ID_COLUMN)
            .context("failed to create lock table")?;
        dynamodb
            .tag_resource(&arn, &[(LOCK_TABLE_TAG_NAME, TAG_VALUE)])
            .context("failed to tag lock table")?;

        for _ in 0..self.max_polls {
            let table = dynamodb
                .describe_table(LOCK_TABLE_NAME)
                .context("failed to describe lock table")?;
            if table.status == "ACTIVE" {
                return Ok(table.name);
            }
            debug!("lock table is {}, waiting", table.status);
            thread::sleep(self.poll_interval);
        }
        Err(StateError::TableNotActive(LOCK_TABLE_NAME.to_string()).into())
    }
}

/// What the state belongs to.
#[derive(Debug, Clone, Copy)]
pub struct StateScope<'a> {
    pub environment: &'a str,
    pub component: &'a str,
    pub team: &'a str,
}

/// Where the state object lives and how Terraform was initialised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLocation {
    pub bucket: String,
    pub lock_table: String,
    pub key: String,
    pub workspace_key_prefix: Option<String>,
}

impl StateLocation {
    /// Resolves the bucket and lock table for the scope, discovering or
    /// creating them for the classic backend.
    pub fn resolve(
        session: &dyn AwsSession,
        scheme: &AccountScheme,
        scope: StateScope<'_>,
    ) -> Result<Self> {
        match scheme.backend() {
            Backend::Classic => {
                let account = scheme.account_for_environment(scope.environment)?;
                let bucket = S3BucketFactory::new(session, &account.id).get_bucket_name()?;
                let lock_table = LockTableFactory::new(session).get_table_name()?;
                Ok(Self::classic(bucket, lock_table, scope))
            }
            Backend::Workspace {
                bucket,
                dynamodb_table,
            } => Ok(Self::workspace(bucket.clone(), dynamodb_table.clone(), scope)),
        }
    }

    pub fn classic(bucket: String, lock_table: String, scope: StateScope<'_>) -> Self {
        Self {
            bucket,
            lock_table,
            key: format!(
                "{}/{}/{}",
                scope.environment, scope.component, TFSTATE_FILENAME
            ),
            workspace_key_prefix: None,
        }
    }

    pub fn workspace(bucket: String, lock_table: String, scope: StateScope<'_>) -> Self {
        Self {
            bucket,
            lock_table,
            key: TFSTATE_FILENAME.to_string(),
            workspace_key_prefix: Some(format!("{}/{}", scope.team, scope.component)),
        }
    }

    /// The S3 key of the environment's state object.
    pub fn state_key(&self, environment: &str) -> String {
        match &self.workspace_key_prefix {
            Some(prefix) => format!("{}/{}/{}", prefix, environment, self.key),
            None => self.key.clone(),
        }
    }

    fn backend_config(&self, region: &str) -> Vec<String> {
        let mut args = vec![
            format!("-backend-config=bucket={}", self.bucket),
            format!("-backend-config=region={}", region),
            format!("-backend-config=key={}", self.key),
            format!("-backend-config=dynamodb_table={}", self.lock_table),
        ];
        if let Some(prefix) = &self.workspace_key_prefix {
            args.push(format!("-backend-config=workspace_key_prefix={}", prefix));
        }
        args
    }
}

/// A Terraform directory initialised against remote state. The generated
/// backend file is removed when this is dropped.
#[derive(Debug)]
pub struct TerraformState {
    location: StateLocation,
    environment: String,
    terraform_dir: PathBuf,
    _backend_file: NamedTempFile,
}

impl TerraformState {
    #[instrument(skip(runner, session, location), fields(bucket = %location.bucket))]
    pub fn initialise(
        runner: &dyn ProcessRunner,
        session: &dyn AwsSession,
        location: StateLocation,
        environment: &str,
        base_dir: &Path,
        sub_dir: &str,
        get_modules: bool,
    ) -> Result<Self> {
        let terraform_dir = base_dir.join(sub_dir);
        let mut backend_file = tempfile::Builder::new()
            .prefix("cdflow_backend_")
            .suffix(".tf")
            .tempfile_in(&terraform_dir)
            .with_context(|| {
                format!("failed to create backend file in {}", terraform_dir.display())
            })?;
        backend_file
            .write_all(BACKEND_DEFINITION.as_bytes())
            .context("failed to write backend file")?;
        debug!("wrote backend config to {}", backend_file.path().display());

        let env = session_env(session);
        let dir_arg = terraform_dir.display().to_string();
        let get = if get_modules { "true" } else { "false" };
        runner.run(
            &Invocation::new(TERRAFORM_BINARY)
                .args([
                    "init".to_string(),
                    format!("-get={get}"),
                    format!("-get-plugins={get}"),
                ])
                .args(location.backend_config(session.region()))
                .arg(dir_arg.clone())
                .envs(env.clone())
                .current_dir(base_dir),
        )?;

        if location.workspace_key_prefix.is_some() {
            let listed = runner.check_output(
                &Invocation::new(TERRAFORM_BINARY)
                    .args(["workspace", "list", dir_arg.as_str()])
                    .envs(env.clone())
                    .current_dir(base_dir),
            )?;
            let exists = listed
                .lines()
                .map(|line| line.trim_start_matches('*').trim())
                .any(|name| name == environment);
            let action = if exists { "select" } else { "new" };
            info!("terraform workspace {} {}", action, environment);
            runner.run(
                &Invocation::new(TERRAFORM_BINARY)
                    .args(["workspace", action, environment, dir_arg.as_str()])
                    .envs(env)
                    .current_dir(base_dir),
            )?;
        }

        Ok(Self {
            location,
            environment: environment.to_string(),
            terraform_dir,
            _backend_file: backend_file,
        })
    }

    pub fn location(&self) -> &StateLocation {
        &self.location
    }

    pub fn terraform_dir(&self) -> &Path {
        &self.terraform_dir
    }

    pub fn state_key(&self) -> String {
        self.location.state_key(&self.environment)
    }

    /// Deletes the environment's state object.
    pub fn remove(&self, session: &dyn AwsSession) -> Result<()> {
        let key = self.state_key();
        info!("removing state s3://{}/{}", self.location.bucket, key);
        session
            .s3()
            .delete_object(&self.location.bucket, &key)
            .with_context(|| format!("failed to delete s3://{}/{}", self.location.bucket, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::TableDescription;
    use crate::process::CapturedOutput;
    use crate::testing::{FakeSession, FakeTable, RecordingRunner};
    use std::collections::HashMap;

    const TAG: &[(&str, &str)] = &[(TFSTATE_TAG_NAME, TAG_VALUE)];

    fn scope() -> StateScope<'static> {
        StateScope {
            environment: "ci",
            component: "widget",
            team: "platform",
        }
    }

    #[test]
    fn bucket_name_is_deterministic_sha1_prefix() {
        // sha1("eu-west-11234567890")
        let name = bucket_name_for_attempt("eu-west-1", "123456789", 0);
        assert_eq!(name, "cdflow-tfstate-c3ab7bee01ca");
        assert_ne!(name, bucket_name_for_attempt("eu-west-1", "123456789", 1));
        assert_eq!(name.len(), "cdflow-tfstate-".len() + 12);
    }

    #[test]
    fn returns_single_tagged_bucket_in_region() {
        let session = FakeSession::new("eu-west-1");
        session.add_bucket("untagged", Some("eu-west-1"), None);
        session.add_bucket("other-region", Some("us-west-2"), Some(TAG));
        session.add_bucket("state", Some("EU"), Some(TAG));

        let name = S3BucketFactory::new(&session, "123456789")
            .get_bucket_name()
            .expect("bucket should be found");
        assert_eq!(name, "state");
        assert!(session.created_buckets().is_empty());
    }

    #[test]
    fn buckets_in_other_regions_are_not_tag_checked() {
        let session = FakeSession::new("eu-west-1");
        session.add_bucket("other-region", Some("us-west-2"), None);
        session.add_bucket("state", Some("eu-west-1"), Some(TAG));
        assert!(session
            .s3()
            .bucket_tags("other-region")
            .expect_err("cross-region tagging redirects")
            .has_code("PermanentRedirect"));

        let name = S3BucketFactory::new(&session, "123456789")
            .get_bucket_name()
            .expect("in-region bucket should be found");
        assert_eq!(name, "state");
    }

    #[test]
    fn empty_location_means_us_east_1() {
        let session = FakeSession::new("us-east-1");
        session.add_bucket("state", None, Some(TAG));
        let name = S3BucketFactory::new(&session, "123456789")
            .get_bucket_name()
            .expect("bucket should be found");
        assert_eq!(name, "state");
    }

    #[test]
    fn multiple_tagged_buckets_is_an_error() {
        let session = FakeSession::new("eu-west-1");
        session.add_bucket("one", Some("eu-west-1"), Some(TAG));
        session.add_bucket("two", Some("eu-west-1"), Some(TAG));
        let err = S3BucketFactory::new(&session, "123456789")
            .get_bucket_name()
            .expect_err("ambiguous buckets");
        assert_eq!(
            err.to_string(),
            "multiple buckets with is-cdflow-tfstate-bucket=true tag found"
        );
    }

    #[test]
    fn creates_and_tags_bucket_when_none_found() {
        let session = FakeSession::new("eu-west-1");
        let name = S3BucketFactory::new(&session, "123456789")
            .get_bucket_name()
            .expect("bucket should be created");
        assert_eq!(name, bucket_name_for_attempt("eu-west-1", "123456789", 0));
        let bucket = session.bucket(&name).expect("bucket exists");
        assert_eq!(
            bucket.tags.expect("bucket tagged").get(TFSTATE_TAG_NAME),
            Some(&TAG_VALUE.to_string())
        );
    }

    #[test]
    fn taken_names_move_to_next_attempt() {
        let session = FakeSession::new("eu-west-1");
        session.fail_next_create_bucket("BucketAlreadyExists");
        session.fail_next_create_bucket("BucketAlreadyOwnedByYou");
        let name = S3BucketFactory::new(&session, "123456789")
            .get_bucket_name()
            .expect("third attempt succeeds");
        assert_eq!(name, bucket_name_for_attempt("eu-west-1", "123456789", 2));
    }

    #[test]
    fn other_create_errors_propagate() {
        let session = FakeSession::new("eu-west-1");
        session.fail_next_create_bucket("AccessDenied");
        let err = S3BucketFactory::new(&session, "123456789")
            .get_bucket_name()
            .expect_err("access denied propagates");
        assert!(format!("{err:#}").contains("AccessDenied"));
    }

    #[test]
    fn gives_up_after_ten_attempts() {
        let session = FakeSession::new("eu-west-1");
        for _ in 0..MAX_BUCKET_CREATION_ATTEMPTS {
            session.fail_next_create_bucket("BucketAlreadyExists");
        }
        let err = S3BucketFactory::new(&session, "123456789")
            .get_bucket_name()
            .expect_err("all names taken");
        assert_eq!(err.to_string(), "could not create bucket after 10 attempts");
    }

    fn lock_table(tags: &[(&str, &str)], attributes: &[&str]) -> FakeTable {
        FakeTable {
            description: TableDescription {
                name: LOCK_TABLE_NAME.to_string(),
                arn: "arn:aws:dynamodb:eu-west-1:123:table/terraform_locks".to_string(),
                status: "ACTIVE".to_string(),
                attribute_names: attributes.iter().map(|a| a.to_string()).collect(),
            },
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            pending_describes: 0,
        }
    }

    #[test]
    fn existing_lock_table_is_returned() {
        let session = FakeSession::new("eu-west-1");
        session.add_table(lock_table(
            &[(LOCK_TABLE_TAG_NAME, TAG_VALUE)],
            &[LOCK_TABLE_ID_COLUMN],
        ));
        let name = LockTableFactory::new(&session)
            .get_table_name()
            .expect("table is valid");
        assert_eq!(name, LOCK_TABLE_NAME);
    }

    #[test]
    fn untagged_lock_table_is_rejected() {
        let session = FakeSession::new("eu-west-1");
        session.add_table(lock_table(&[], &[LOCK_TABLE_ID_COLUMN]));
        let err = LockTableFactory::new(&session)
            .get_table_name()
            .expect_err("missing tag");
        assert!(matches!(
            err.downcast_ref::<StateError>(),
            Some(StateError::MissingTag(_))
        ));
    }

    #[test]
    fn lock_table_without_id_column_is_rejected() {
        let session = FakeSession::new("eu-west-1");
        session.add_table(lock_table(&[(LOCK_TABLE_TAG_NAME, TAG_VALUE)], &["Other"]));
        let err = LockTableFactory::new(&session)
            .get_table_name()
            .expect_err("wrong schema");
        assert!(matches!(
            err.downcast_ref::<StateError>(),
            Some(StateError::IncorrectSchema(_))
        ));
    }

    #[test]
    fn missing_lock_table_is_created_tagged_and_awaited() {
        let session = FakeSession::new("eu-west-1");
        let name = LockTableFactory::new(&session)
            .with_poll_interval(Duration::ZERO)
            .get_table_name()
            .expect("table is created");
        assert_eq!(name, LOCK_TABLE_NAME);
        let table = session.table(LOCK_TABLE_NAME).expect("table exists");
        assert_eq!(table.description.status, "ACTIVE");
        assert_eq!(table.description.attribute_names, vec![LOCK_TABLE_ID_COLUMN]);
        assert_eq!(
            table.tags.get(LOCK_TABLE_TAG_NAME).map(String::as_str),
            Some(TAG_VALUE)
        );
    }

    #[test]
    fn other_describe_errors_propagate() {
        let session = FakeSession::new("eu-west-1");
        session.fail_describe_table("AccessDeniedException");
        assert!(LockTableFactory::new(&session).get_table_name().is_err());
        assert!(session.table(LOCK_TABLE_NAME).is_none());
    }

    #[test]
    fn state_keys_per_backend() {
        let classic = StateLocation::classic("b".into(), "t".into(), scope());
        assert_eq!(classic.state_key("ci"), "ci/widget/terraform.tfstate");

        let workspace = StateLocation::workspace("b".into(), "t".into(), scope());
        assert_eq!(workspace.state_key("ci"), "platform/widget/ci/terraform.tfstate");
    }

    #[test]
    fn classic_init_passes_backend_config_and_cleans_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("infra")).expect("infra dir");
        let session = FakeSession::assumed("eu-west-1");
        let runner = RecordingRunner::default();
        let location = StateLocation::classic("state".into(), "locks".into(), scope());

        let state = TerraformState::initialise(
            &runner,
            &session,
            location,
            "ci",
            dir.path(),
            "infra",
            false,
        )
        .expect("init should pass");

        let backend_files: Vec<_> = std::fs::read_dir(dir.path().join("infra"))
            .expect("read infra")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(backend_files.len(), 1);
        assert!(backend_files[0].starts_with("cdflow_backend_"));
        assert!(backend_files[0].ends_with(".tf"));

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 1);
        let infra = dir.path().join("infra").display().to_string();
        assert_eq!(
            invocations[0].argv(),
            vec![
                "terraform".to_string(),
                "init".to_string(),
                "-get=false".to_string(),
                "-get-plugins=false".to_string(),
                "-backend-config=bucket=state".to_string(),
                "-backend-config=region=eu-west-1".to_string(),
                "-backend-config=key=ci/widget/terraform.tfstate".to_string(),
                "-backend-config=dynamodb_table=locks".to_string(),
                infra,
            ]
        );
        assert_eq!(invocations[0].cwd.as_deref(), Some(dir.path()));
        assert_eq!(
            invocations[0].env.get("AWS_ACCESS_KEY_ID").map(String::as_str),
            Some("dummy-access-key-id")
        );

        drop(state);
        assert_eq!(
            std::fs::read_dir(dir.path().join("infra"))
                .expect("read infra")
                .count(),
            0
        );
    }

    #[test]
    fn workspace_init_selects_existing_workspace() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("infra")).expect("infra dir");
        let session = FakeSession::assumed("eu-west-1");
        let runner = RecordingRunner::default();
        runner.respond_ok("workspace list", "* default\n  ci\n  live\n");
        let location = StateLocation::workspace("tfstate".into(), "tflocks".into(), scope());

        let _state = TerraformState::initialise(
            &runner, &session, location, "ci", dir.path(), "infra", true,
        )
        .expect("init should pass");

        let argvs = runner.argvs();
        assert_eq!(argvs.len(), 3);
        assert!(argvs[0].contains(&"-get=true".to_string()));
        assert!(argvs[0]
            .contains(&"-backend-config=workspace_key_prefix=platform/widget".to_string()));
        assert!(argvs[0].contains(&"-backend-config=key=terraform.tfstate".to_string()));
        assert_eq!(&argvs[2][..4], &["terraform", "workspace", "select", "ci"]);
    }

    #[test]
    fn workspace_init_creates_missing_workspace() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("infra")).expect("infra dir");
        let session = FakeSession::assumed("eu-west-1");
        let runner = RecordingRunner::default();
        runner.respond(
            "workspace list",
            CapturedOutput {
                success: true,
                stdout: "* default\n  cinema\n".to_string(),
                stderr: String::new(),
            },
        );
        let location = StateLocation::workspace("tfstate".into(), "tflocks".into(), scope());

        let _state = TerraformState::initialise(
            &runner, &session, location, "ci", dir.path(), "infra", false,
        )
        .expect("init should pass");

        assert_eq!(&runner.argvs()[2][..4], &["terraform", "workspace", "new", "ci"]);
    }

    #[test]
    fn remove_deletes_state_object() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = FakeSession::assumed("eu-west-1");
        session.put_object("state", "ci/widget/terraform.tfstate", b"{}");
        let runner = RecordingRunner::default();
        let state = TerraformState::initialise(
            &runner,
            &session,
            StateLocation::classic("state".into(), "locks".into(), scope()),
            "ci",
            dir.path(),
            "",
            false,
        )
        .expect("init should pass");

        state.remove(&session).expect("remove should pass");
        assert!(session
            .object("state", "ci/widget/terraform.tfstate")
            .is_none());
    }

    #[test]
    fn resolve_uses_workspace_backend_from_scheme() {
        let session = FakeSession::assumed("eu-west-1");
        let scheme = AccountScheme::parse(
            r#"{
                "accounts": {"foodev": {"id": "123456789", "role": "admon"}},
                "release-account": "foodev",
                "release-bucket": "releases",
                "default-region": "eu-west-1",
                "environments": {"*": "foodev"},
                "terraform-backend-s3-bucket": "tfstate",
                "terraform-backend-s3-dynamodb-table": "tflocks"
            }"#,
        )
        .expect("scheme should parse");
        let location = StateLocation::resolve(&session, &scheme, scope()).expect("resolve");
        assert_eq!(location.bucket, "tfstate");
        assert_eq!(location.lock_table, "tflocks");
        assert!(session.created_buckets().is_empty());
    }

    #[test]
    fn resolve_discovers_classic_bucket_and_table() {
        let session = FakeSession::assumed("eu-west-1");
        session.add_bucket("state", Some("eu-west-1"), Some(TAG));
        session.add_table(lock_table(
            &[(LOCK_TABLE_TAG_NAME, TAG_VALUE)],
            &[LOCK_TABLE_ID_COLUMN],
        ));
        let scheme = AccountScheme::parse(
            r#"{
                "accounts": {"foodev": {"id": "123456789", "role": "admon"}},
                "release-account": "foodev",
                "release-bucket": "releases",
                "default-region": "eu-west-1",
                "environments": {"*": "foodev"}
            }"#,
        )
        .expect("scheme should parse");
        let location = StateLocation::resolve(&session, &scheme, scope()).expect("resolve");
        assert_eq!(
            location,
            StateLocation::classic("state".into(), LOCK_TABLE_NAME.into(), scope())
        );
    }
}
