//! In-memory AWS session and recording process runner for unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::rc::Rc;

use anyhow::Result;

use crate::aws::{
    AwsCredentials, AwsSession, DynamoDbApi, EcrApi, EcsApi, EcsService, RegistryAuthorization,
    S3Api, TableDescription,
};
use crate::error::{AwsError, AwsResult, UserFacingError};
use crate::process::{CapturedOutput, Invocation, ProcessRunner};
use crate::state::normalise_location;

#[derive(Debug, Default, Clone)]
pub struct FakeBucket {
    pub location: Option<String>,
    pub tags: Option<HashMap<String, String>>,
    pub objects: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Default, Clone)]
pub struct FakeTable {
    pub description: TableDescription,
    pub tags: HashMap<String, String>,
    /// Describes left before a CREATING table turns ACTIVE.
    pub pending_describes: usize,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, FakeBucket>,
    create_bucket_errors: VecDeque<AwsError>,
    created_buckets: Vec<(String, String)>,
    tables: BTreeMap<String, FakeTable>,
    describe_table_error: Option<AwsError>,
    repositories: BTreeMap<String, Option<String>>,
    describe_repository_error: Option<AwsError>,
    services: VecDeque<EcsService>,
    task_images: HashMap<String, String>,
    assumed_roles: Vec<(String, String)>,
}

/// A fake session. Sessions created through `assume_role` share the same
/// backing state as the root.
#[derive(Debug, Clone)]
pub struct FakeSession {
    region: String,
    credentials: Option<AwsCredentials>,
    state: Rc<RefCell<State>>,
}

impl FakeSession {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            credentials: None,
            state: Rc::default(),
        }
    }

    pub fn assumed(region: &str) -> Self {
        Self {
            credentials: Some(dummy_credentials()),
            ..Self::new(region)
        }
    }

    pub fn add_bucket(&self, name: &str, location: Option<&str>, tags: Option<&[(&str, &str)]>) {
        let tags = tags.map(|tags| {
            tags.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        });
        self.state.borrow_mut().buckets.insert(
            name.to_string(),
            FakeBucket {
                location: location.map(ToOwned::to_owned),
                tags,
                objects: BTreeMap::new(),
            },
        );
    }

    pub fn bucket(&self, name: &str) -> Option<FakeBucket> {
        self.state.borrow().buckets.get(name).cloned()
    }

    pub fn put_object(&self, bucket: &str, key: &str, body: &[u8]) {
        self.state
            .borrow_mut()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .objects
            .insert(key.to_string(), body.to_vec());
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key).cloned())
    }

    pub fn fail_next_create_bucket(&self, code: &str) {
        self.state
            .borrow_mut()
            .create_bucket_errors
            .push_back(AwsError::with_code(code));
    }

    pub fn created_buckets(&self) -> Vec<(String, String)> {
        self.state.borrow().created_buckets.clone()
    }

    pub fn add_table(&self, table: FakeTable) {
        self.state
            .borrow_mut()
            .tables
            .insert(table.description.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> Option<FakeTable> {
        self.state.borrow().tables.get(name).cloned()
    }

    pub fn fail_describe_table(&self, code: &str) {
        self.state.borrow_mut().describe_table_error = Some(AwsError::with_code(code));
    }

    pub fn add_repository(&self, name: &str) {
        self.state
            .borrow_mut()
            .repositories
            .insert(name.to_string(), None);
    }

    pub fn repository_policy(&self, name: &str) -> Option<String> {
        self.state.borrow().repositories.get(name).cloned().flatten()
    }

    pub fn has_repository(&self, name: &str) -> bool {
        self.state.borrow().repositories.contains_key(name)
    }

    pub fn fail_describe_repository(&self, code: &str) {
        self.state.borrow_mut().describe_repository_error = Some(AwsError::with_code(code));
    }

    pub fn push_service_state(&self, service: EcsService) {
        self.state.borrow_mut().services.push_back(service);
    }

    pub fn set_task_image(&self, task_definition: &str, image: &str) {
        self.state
            .borrow_mut()
            .task_images
            .insert(task_definition.to_string(), image.to_string());
    }

    pub fn assumed_roles(&self) -> Vec<(String, String)> {
        self.state.borrow().assumed_roles.clone()
    }
}

pub fn dummy_credentials() -> AwsCredentials {
    AwsCredentials {
        access_key_id: "dummy-access-key-id".to_string(),
        secret_access_key: "dummy-secret-access-key".to_string(),
        session_token: Some("dummy-session-token".to_string()),
    }
}

fn not_found(code: &str) -> AwsError {
    AwsError::with_code(code)
}

impl AwsSession for FakeSession {
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
        self.state
            .borrow_mut()
            .assumed_roles
            .push((role_arn.to_string(), session_name.to_string()));
        Ok(Box::new(Self {
            region: region.to_string(),
            credentials: Some(dummy_credentials()),
            state: Rc::clone(&self.state),
        }))
    }

    fn s3(&self) -> &dyn S3Api {
        self
    }

    fn dynamodb(&self) -> &dyn DynamoDbApi {
        self
    }

    fn ecr(&self) -> &dyn EcrApi {
        self
    }

    fn ecs(&self) -> &dyn EcsApi {
        self
    }
}

impl S3Api for FakeSession {
    fn list_buckets(&self) -> AwsResult<Vec<String>> {
        Ok(self.state.borrow().buckets.keys().cloned().collect())
    }

    fn bucket_tags(&self, bucket: &str) -> AwsResult<HashMap<String, String>> {
        let state = self.state.borrow();
        let bucket = state
            .buckets
            .get(bucket)
            .ok_or_else(|| not_found("NoSuchBucket"))?;
        // S3 redirects requests for buckets outside the client's region.
        if normalise_location(bucket.location.as_deref()) != self.region {
            return Err(AwsError::new(
                Some("PermanentRedirect"),
                "the bucket must be addressed using the specified endpoint",
            ));
        }
        bucket.tags.clone().ok_or_else(|| not_found("NoSuchTagSet"))
    }

    fn bucket_location(&self, bucket: &str) -> AwsResult<Option<String>> {
        let state = self.state.borrow();
        let bucket = state
            .buckets
            .get(bucket)
            .ok_or_else(|| not_found("NoSuchBucket"))?;
        Ok(bucket.location.clone())
    }

    fn create_bucket(&self, bucket: &str, region: &str) -> AwsResult<()> {
        let mut state = self.state.borrow_mut();
        if let Some(err) = state.create_bucket_errors.pop_front() {
            return Err(err);
        }
        state
            .created_buckets
            .push((bucket.to_string(), region.to_string()));
        let location = (region != "us-east-1").then(|| region.to_string());
        state.buckets.insert(
            bucket.to_string(),
            FakeBucket {
                location,
                ..FakeBucket::default()
            },
        );
        Ok(())
    }

    fn put_bucket_tags(&self, bucket: &str, tags: &[(&str, &str)]) -> AwsResult<()> {
        let mut state = self.state.borrow_mut();
        let bucket = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| not_found("NoSuchBucket"))?;
        bucket.tags = Some(
            tags.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str) -> AwsResult<Vec<u8>> {
        self.object(bucket, key)
            .ok_or_else(|| not_found("NoSuchKey"))
    }

    fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> AwsResult<()> {
        let body = std::fs::read(path).map_err(|e| AwsError::new(None, e.to_string()))?;
        self.put_object(bucket, key, &body);
        Ok(())
    }

    fn delete_object(&self, bucket: &str, key: &str) -> AwsResult<()> {
        if let Some(bucket) = self.state.borrow_mut().buckets.get_mut(bucket) {
            bucket.objects.remove(key);
        }
        Ok(())
    }
}

impl DynamoDbApi for FakeSession {
    fn describe_table(&self, name: &str) -> AwsResult<TableDescription> {
        let mut state = self.state.borrow_mut();
        if let Some(err) = state.describe_table_error.clone() {
            return Err(err);
        }
        let table = state
            .tables
            .get_mut(name)
            .ok_or_else(|| not_found("ResourceNotFoundException"))?;
        if table.pending_describes == 0 {
            table.description.status = "ACTIVE".to_string();
        } else {
            table.pending_describes -= 1;
        }
        Ok(table.description.clone())
    }

    fn list_tags(&self, arn: &str) -> AwsResult<HashMap<String, String>> {
        self.state
            .borrow()
            .tables
            .values()
            .find(|t| t.description.arn == arn)
            .map(|t| t.tags.clone())
            .ok_or_else(|| not_found("ResourceNotFoundException"))
    }

    fn create_lock_table(&self, name: &str, hash_key: &str) -> AwsResult<String> {
        let arn = format!("arn:aws:dynamodb:{}:000000000000:table/{}", self.region, name);
        let mut state = self.state.borrow_mut();
        state.describe_table_error = None;
        state.tables.insert(
            name.to_string(),
            FakeTable {
                description: TableDescription {
                    name: name.to_string(),
                    arn: arn.clone(),
                    status: "CREATING".to_string(),
                    attribute_names: vec![hash_key.to_string()],
                },
                tags: HashMap::new(),
                pending_describes: 1,
            },
        );
        Ok(arn)
    }

    fn tag_resource(&self, arn: &str, tags: &[(&str, &str)]) -> AwsResult<()> {
        let mut state = self.state.borrow_mut();
        let table = state
            .tables
            .values_mut()
            .find(|t| t.description.arn == arn)
            .ok_or_else(|| not_found("ResourceNotFoundException"))?;
        table
            .tags
            .extend(tags.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        Ok(())
    }
}

impl EcrApi for FakeSession {
    fn describe_repository(&self, name: &str) -> AwsResult<()> {
        let state = self.state.borrow();
        if let Some(err) = state.describe_repository_error.clone() {
            return Err(err);
        }
        if state.repositories.contains_key(name) {
            Ok(())
        } else {
            Err(not_found("RepositoryNotFoundException"))
        }
    }

    fn create_repository(&self, name: &str) -> AwsResult<()> {
        self.add_repository(name);
        Ok(())
    }

    fn set_repository_policy(&self, name: &str, policy: &str) -> AwsResult<()> {
        let mut state = self.state.borrow_mut();
        let repository = state
            .repositories
            .get_mut(name)
            .ok_or_else(|| not_found("RepositoryNotFoundException"))?;
        *repository = Some(policy.to_string());
        Ok(())
    }

    fn authorization(&self) -> AwsResult<RegistryAuthorization> {
        Ok(RegistryAuthorization {
            // base64("AWS:dummy-password")
            token: "QVdTOmR1bW15LXBhc3N3b3Jk".to_string(),
            proxy_endpoint: "https://123456789.dkr.ecr.eu-west-12.amazonaws.com".to_string(),
        })
    }
}

impl EcsApi for FakeSession {
    fn describe_service(&self, _cluster: &str, _service: &str) -> AwsResult<EcsService> {
        let mut state = self.state.borrow_mut();
        // The last scripted state repeats once the queue is drained.
        if state.services.len() > 1 {
            state.services.pop_front().ok_or_else(|| not_found("ServiceNotFoundException"))
        } else {
            state
                .services
                .front()
                .cloned()
                .ok_or_else(|| not_found("ServiceNotFoundException"))
        }
    }

    fn task_definition_image(&self, task_definition: &str) -> AwsResult<String> {
        self.state
            .borrow()
            .task_images
            .get(task_definition)
            .cloned()
            .ok_or_else(|| not_found("ClientException"))
    }
}

/// Records every invocation instead of spawning it. Captured output is
/// scripted by substring of the rendered command line.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    invocations: RefCell<Vec<Invocation>>,
    responses: RefCell<Vec<(String, CapturedOutput)>>,
    failures: RefCell<Vec<String>>,
}

impl RecordingRunner {
    pub fn respond(&self, pattern: &str, output: CapturedOutput) {
        self.responses
            .borrow_mut()
            .push((pattern.to_string(), output));
    }

    pub fn respond_ok(&self, pattern: &str, stdout: &str) {
        self.respond(
            pattern,
            CapturedOutput {
                success: true,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
    }

    /// Makes `run` fail for commands containing `pattern`.
    pub fn fail_on(&self, pattern: &str) {
        self.failures.borrow_mut().push(pattern.to_string());
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }

    pub fn argvs(&self) -> Vec<Vec<String>> {
        self.invocations
            .borrow()
            .iter()
            .map(Invocation::argv)
            .collect()
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        self.invocations.borrow_mut().push(invocation.clone());
        let rendered = invocation.to_string();
        if self
            .failures
            .borrow()
            .iter()
            .any(|pattern| rendered.contains(pattern.as_str()))
        {
            return Err(UserFacingError::Process(format!("{} failed", rendered)).into());
        }
        Ok(())
    }

    fn capture(&self, invocation: &Invocation) -> Result<CapturedOutput> {
        self.invocations.borrow_mut().push(invocation.clone());
        let rendered = invocation.to_string();
        let output = self
            .responses
            .borrow()
            .iter()
            .find(|(pattern, _)| rendered.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or(CapturedOutput {
                success: true,
                ..CapturedOutput::default()
            });
        Ok(output)
    }
}
