use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::account::AccountScheme;
use crate::aws::AwsSession;
use crate::component::ComponentType;
use crate::constants::{GIT_BINARY, MANIFEST_FILE};
use crate::error::UserFacingError;
use crate::process::{Invocation, ProcessRunner};

const MAX_SESSION_NAME_LENGTH: usize = 64;

/// The component's `cdflow.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    pub account_scheme_url: String,
    pub team: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    /// ECS cluster to watch after deploying a docker component.
    pub ecs_cluster: Option<String>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self, UserFacingError> {
        serde_yaml::from_str(text).map_err(|e| UserFacingError::MalformedManifest {
            path: MANIFEST_FILE.to_string(),
            reason: e.to_string(),
        })
    }

    /// Loads `cdflow.yml` from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(UserFacingError::ManifestNotFound(MANIFEST_FILE.to_string()).into());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::parse(&text)?)
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)^.+@([\w-]+\.)+\w+\n?$").expect("valid email regex"))
}

fn disallowed_session_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\w+=,.@-]+").expect("valid session name regex"))
}

/// Builds the STS role session name from `JOB_NAME` or `EMAIL`.
pub fn role_session_name(
    job_name: Option<&str>,
    email: Option<&str>,
) -> Result<String, UserFacingError> {
    let raw = match (job_name, email) {
        (Some(job_name), _) => {
            if job_name.chars().count() < 6 {
                return Err(UserFacingError::JobNameTooShort);
            }
            job_name
        }
        (None, Some(email)) => {
            if !email_pattern().is_match(email) {
                return Err(UserFacingError::InvalidEmail);
            }
            email
        }
        (None, None) => return Err(UserFacingError::NoJobNameOrEmail),
    };

    let sanitised = disallowed_session_chars().replace_all(raw, "-");
    Ok(sanitised.chars().take(MAX_SESSION_NAME_LENGTH).collect())
}

pub fn role_session_name_from_env() -> Result<String, UserFacingError> {
    let job_name = std::env::var("JOB_NAME").ok();
    let email = std::env::var("EMAIL").ok();
    role_session_name(job_name.as_deref(), email.as_deref())
}

/// Last path segment of a git remote URL without its `.git` suffix.
pub fn component_name_from_remote(remote: &str) -> Result<String, UserFacingError> {
    let trimmed = remote.trim().trim_end_matches('/');
    let segment = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default();
    let name = segment.strip_suffix(".git").unwrap_or(segment);
    if name.is_empty() {
        return Err(UserFacingError::ComponentName(format!(
            "no repository name in '{}'",
            remote.trim()
        )));
    }
    Ok(name.to_string())
}

/// The `-c` override, or the name of the repository the working directory
/// is a checkout of.
#[instrument(skip(runner))]
pub fn component_name(
    runner: &dyn ProcessRunner,
    component: Option<&str>,
    dir: &Path,
) -> Result<String> {
    if let Some(component) = component {
        return Ok(component.to_string());
    }
    let output = runner.capture(
        &Invocation::new(GIT_BINARY)
            .args(["config", "remote.origin.url"])
            .current_dir(dir),
    )?;
    if !output.success {
        return Err(UserFacingError::ComponentName(
            "git config remote.origin.url failed".to_string(),
        )
        .into());
    }
    let name = component_name_from_remote(&output.stdout)?;
    debug!("component name from git remote: {}", name);
    Ok(name)
}

/// Splits `s3://bucket/key` into its bucket and key.
pub fn parse_s3_url(url: &str) -> Result<(String, String), UserFacingError> {
    let invalid = || UserFacingError::InvalidS3Url(url.to_string());
    let rest = url.strip_prefix("s3://").ok_or_else(invalid)?;
    let (bucket, key) = rest.split_once('/').ok_or_else(invalid)?;
    if bucket.is_empty() || key.is_empty() {
        return Err(invalid());
    }
    Ok((bucket.to_string(), key.to_string()))
}

/// Downloads and parses the account scheme the manifest points at.
#[instrument(skip(session))]
pub fn load_account_scheme(session: &dyn AwsSession, url: &str) -> Result<AccountScheme> {
    let (bucket, key) = parse_s3_url(url)?;
    let body = session
        .s3()
        .get_object(&bucket, &key)
        .with_context(|| format!("failed to fetch account scheme from {}", url))?;
    let text = String::from_utf8(body).context("account scheme is not valid UTF-8")?;
    AccountScheme::parse(&text)
}
