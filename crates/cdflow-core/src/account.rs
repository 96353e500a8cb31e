use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::error::UserFacingError;

/// An AWS account cdflow can assume a role in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub alias: String,
    pub id: String,
    pub role: String,
}

impl Account {
    pub fn role_arn(&self) -> String {
        format!("arn:aws:iam::{}:role/{}", self.id, self.role)
    }
}

/// Where Terraform keeps state for the scheme's accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// One tagged bucket and lock table per account, discovered at runtime.
    Classic,
    /// A shared bucket and lock table, one Terraform workspace per environment.
    Workspace { bucket: String, dynamodb_table: String },
}

#[derive(Debug, Error)]
pub enum AccountSchemeError {
    #[error("{field} refers to unknown account '{alias}'")]
    UnknownAccount { field: String, alias: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawScheme {
    accounts: BTreeMap<String, RawAccount>,
    release_account: String,
    release_bucket: String,
    #[serde(default)]
    lambda_bucket: String,
    default_region: String,
    environments: BTreeMap<String, String>,
    #[serde(default)]
    classic_metadata_handling: bool,
    terraform_backend_s3_bucket: Option<String>,
    terraform_backend_s3_dynamodb_table: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    id: String,
    role: String,
}

/// The organisation-wide description of accounts, buckets and the
/// environment to account mapping.
#[derive(Debug, Clone)]
pub struct AccountScheme {
    pub accounts: BTreeMap<String, Account>,
    pub release_account: Account,
    pub release_bucket: String,
    pub lambda_bucket: String,
    pub default_region: String,
    pub environments: BTreeMap<String, String>,
    pub backend: Backend,
}

impl AccountScheme {
    pub fn parse(json: &str) -> Result<Self> {
        let raw: RawScheme =
            serde_json::from_str(json).context("failed to parse account scheme")?;

        let accounts: BTreeMap<String, Account> = raw
            .accounts
            .into_iter()
            .map(|(alias, account)| {
                let account = Account {
                    alias: alias.clone(),
                    id: account.id,
                    role: account.role,
                };
                (alias, account)
            })
            .collect();

        let release_account = lookup(&accounts, "release-account", &raw.release_account)?;
        for (environment, alias) in &raw.environments {
            lookup(&accounts, &format!("environments.{environment}"), alias)?;
        }

        let backend = match (
            raw.classic_metadata_handling,
            raw.terraform_backend_s3_bucket,
            raw.terraform_backend_s3_dynamodb_table,
        ) {
            (false, Some(bucket), Some(dynamodb_table)) => Backend::Workspace {
                bucket,
                dynamodb_table,
            },
            _ => Backend::Classic,
        };

        Ok(Self {
            accounts,
            release_account,
            release_bucket: raw.release_bucket,
            lambda_bucket: raw.lambda_bucket,
            default_region: raw.default_region,
            environments: raw.environments,
            backend,
        })
    }

    pub fn account_ids(&self) -> Vec<&str> {
        self.accounts.values().map(|a| a.id.as_str()).collect()
    }

    /// The account an environment deploys to. An explicit mapping wins over
    /// the `*` catch-all.
    pub fn account_for_environment(&self, environment: &str) -> Result<&Account, UserFacingError> {
        self.environments
            .get(environment)
            .or_else(|| self.environments.get("*"))
            .and_then(|alias| self.accounts.get(alias))
            .ok_or_else(|| UserFacingError::NoAccountForEnvironment(environment.to_string()))
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }
}

fn lookup(
    accounts: &BTreeMap<String, Account>,
    field: &str,
    alias: &str,
) -> Result<Account, AccountSchemeError> {
    accounts
        .get(alias)
        .cloned()
        .ok_or_else(|| AccountSchemeError::UnknownAccount {
            field: field.to_string(),
            alias: alias.to_string(),
        })
}
