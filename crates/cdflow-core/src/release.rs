//! Building, publishing and fetching release bundles.
//!
//! A release bundle is a zip of `<component>-<version>/` holding the
//! Terraform code with its modules and providers vendored, the
//! component's config, the platform config and a `release.json`
//! describing the release.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tempfile::TempDir;
use tracing::{info, instrument};

use crate::account::AccountScheme;
use crate::archive::{copy_dir, extract_zip, zip_dir};
use crate::aws::AwsSession;
use crate::constants::{
    CONFIG_BASE_PATH, GIT_BINARY, INFRASTRUCTURE_DEFINITIONS_PATH, PLATFORM_CONFIG_BASE_PATH,
    RELEASE_METADATA_FILE, TERRAFORM_BINARY,
};
use crate::plugin::{ReleaseContext, ReleasePlugin};
use crate::process::{Invocation, ProcessRunner};

pub fn format_release_key(component: &str, version: &str) -> String {
    format!("{component}/{component}-{version}.zip")
}

/// The commit checked out in `dir`.
pub fn current_commit(runner: &dyn ProcessRunner, dir: &Path) -> Result<String> {
    let output = runner.check_output(
        &Invocation::new(GIT_BINARY)
            .args(["rev-parse", "HEAD"])
            .current_dir(dir),
    )?;
    Ok(output.trim().to_string())
}

/// A zipped bundle on local disk. The file lives as long as this value.
#[derive(Debug)]
pub struct ReleaseArchive {
    _dir: TempDir,
    path: PathBuf,
}

impl ReleaseArchive {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct Release<'a> {
    pub runner: &'a dyn ProcessRunner,
    /// Session in the release account.
    pub session: &'a dyn AwsSession,
    pub scheme: &'a AccountScheme,
    /// The component checkout.
    pub source_dir: &'a Path,
    pub platform_config: Option<&'a Path>,
    pub commit: &'a str,
    pub version: &'a str,
    pub component: &'a str,
    pub team: &'a str,
}

impl Release<'_> {
    fn bundle_name(&self) -> String {
        format!("{}-{}", self.component, self.version)
    }

    /// Builds the bundle and uploads it to the release bucket, returning the key.
    #[instrument(skip_all, fields(component = self.component, version = self.version))]
    pub fn create(&self, plugin: &dyn ReleasePlugin) -> Result<String> {
        let archive = self.create_archive(plugin)?;
        let bucket = &self.scheme.release_bucket;
        let key = format_release_key(self.component, self.version);
        info!("uploading release to s3://{}/{}", bucket, key);
        self.session
            .s3()
            .upload_file(bucket, &key, archive.path())
            .with_context(|| format!("failed to upload s3://{}/{}", bucket, key))?;
        Ok(key)
    }

    #[instrument(skip_all, fields(plugin = plugin.name()))]
    pub fn create_archive(&self, plugin: &dyn ReleasePlugin) -> Result<ReleaseArchive> {
        let temp = tempfile::tempdir().context("failed to create release directory")?;
        let bundle_name = self.bundle_name();
        let base = temp.path().join(&bundle_name);
        fs::create_dir(&base).with_context(|| format!("failed to create {}", base.display()))?;

        self.vendor_infrastructure(&base)?;

        let config = self.source_dir.join(CONFIG_BASE_PATH);
        if config.is_dir() {
            copy_dir(&config, &base.join(CONFIG_BASE_PATH))?;
        }
        if let Some(platform_config) = self.platform_config.filter(|p| p.is_dir()) {
            copy_dir(platform_config, &base.join(PLATFORM_CONFIG_BASE_PATH))?;
        }

        let extra = plugin.create(&ReleaseContext {
            runner: self.runner,
            session: self.session,
            scheme: self.scheme,
            component: self.component,
            version: Some(self.version),
            source_dir: self.source_dir,
        })?;
        self.write_metadata(&base, extra)?;

        let path = temp.path().join(format!("{bundle_name}.zip"));
        zip_dir(&base, &bundle_name, &path)?;
        info!("created release archive {}", path.display());
        Ok(ReleaseArchive { _dir: temp, path })
    }

    fn vendor_infrastructure(&self, base: &Path) -> Result<()> {
        let infra = self.source_dir.join(INFRASTRUCTURE_DEFINITIONS_PATH);
        copy_dir(&infra, &base.join(INFRASTRUCTURE_DEFINITIONS_PATH))
            .with_context(|| format!("failed to copy {}", infra.display()))?;
        self.runner.run(
            &Invocation::new(TERRAFORM_BINARY)
                .args([
                    "init",
                    "-backend=false",
                    "-input=false",
                    INFRASTRUCTURE_DEFINITIONS_PATH,
                ])
                .current_dir(base),
        )
    }

    fn write_metadata(&self, base: &Path, extra: serde_json::Map<String, Value>) -> Result<()> {
        let mut release = serde_json::Map::new();
        release.insert("commit".to_string(), json!(self.commit));
        release.insert("version".to_string(), json!(self.version));
        release.insert("component".to_string(), json!(self.component));
        release.insert("team".to_string(), json!(self.team));
        release.extend(extra);

        let path = base.join(RELEASE_METADATA_FILE);
        let body = serde_json::to_string(&json!({ "release": release }))
            .context("failed to serialise release metadata")?;
        fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))
    }
}

/// An extracted release. The directory is removed when this is dropped.
#[derive(Debug)]
pub struct FetchedRelease {
    _dir: TempDir,
    path: PathBuf,
}

impl FetchedRelease {
    /// The `<component>-<version>` directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[instrument(skip(session))]
pub fn fetch_release(
    session: &dyn AwsSession,
    bucket: &str,
    component: &str,
    version: &str,
) -> Result<FetchedRelease> {
    let key = format_release_key(component, version);
    info!("fetching release s3://{}/{}", bucket, key);
    let body = session
        .s3()
        .get_object(bucket, &key)
        .with_context(|| format!("failed to download s3://{}/{}", bucket, key))?;

    let dir = tempfile::Builder::new()
        .prefix("release-")
        .tempdir()
        .context("failed to create release directory")?;
    extract_zip(body, dir.path())?;
    let path = dir.path().join(format!("{component}-{version}"));
    Ok(FetchedRelease { _dir: dir, path })
}
