use thiserror::Error;

/// Errors caused by the caller's input or environment rather than by a bug.
///
/// The CLI prints these as a single `error:` line without a context chain.
#[derive(Debug, Error)]
pub enum UserFacingError {
    #[error("JOB_NAME must be at least 6 characters")]
    JobNameTooShort,
    #[error("EMAIL does not contain a valid email address")]
    InvalidEmail,
    #[error("JOB_NAME or EMAIL must be set")]
    NoJobNameOrEmail,
    #[error("{0} not found")]
    ManifestNotFound(String),
    #[error("malformed {path}: {reason}")]
    MalformedManifest { path: String, reason: String },
    #[error("invalid s3 url '{0}' (expected s3://<bucket>/<key>)")]
    InvalidS3Url(String),
    #[error("could not get component name from git remote: {0}")]
    ComponentName(String),
    #[error("no account for environment {0}")]
    NoAccountForEnvironment(String),
    #[error("lambda-bucket must be set in the account scheme for lambda releases")]
    MissingLambdaBucket,
    #[error("command failed: {0}")]
    Process(String),
}

/// An error returned by an AWS API call, keeping the service error code.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AwsError {
    pub code: Option<String>,
    pub message: String,
}

impl AwsError {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(ToOwned::to_owned),
            message: message.into(),
        }
    }

    pub fn with_code(code: &str) -> Self {
        Self::new(Some(code), code)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

pub type AwsResult<T> = std::result::Result<T, AwsError>;
