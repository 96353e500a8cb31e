//! Core logic for cdflow.
//!
//! This crate holds the manifest and account scheme, Terraform state
//! handling, release bundles, deploy and destroy orchestration, and the
//! seams (`AwsSession`, `ProcessRunner`) the CLI plugs real AWS and real
//! processes into.

pub mod account;
pub mod archive;
pub mod aws;
pub mod component;
pub mod config;
pub mod constants;
pub mod deploy;
pub mod destroy;
pub mod error;
pub mod monitor;
pub mod plugin;
pub mod process;
pub mod release;
pub mod secrets;
pub mod shell;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use account::{Account, AccountScheme, Backend};
pub use aws::{AwsCredentials, AwsSession};
pub use component::ComponentType;
pub use config::Manifest;
pub use error::{AwsError, AwsResult, UserFacingError};
pub use process::{Invocation, ProcessRunner, SystemRunner};
