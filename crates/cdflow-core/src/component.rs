use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// The kind of artefact a component releases, taken from the manifest `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ComponentType {
    Docker,
    Lambda,
    Infrastructure,
}

impl ComponentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Lambda => "lambda",
            Self::Infrastructure => "infrastructure",
        }
    }
}

impl Display for ComponentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ComponentTypeParseError {
    #[error("unsupported component type '{0}' (supported: docker, lambda, infrastructure)")]
    Unknown(String),
}

impl FromStr for ComponentType {
    type Err = ComponentTypeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "docker" => Ok(Self::Docker),
            "lambda" => Ok(Self::Lambda),
            "infrastructure" => Ok(Self::Infrastructure),
            other => Err(ComponentTypeParseError::Unknown(other.to_string())),
        }
    }
}

impl TryFrom<String> for ComponentType {
    type Error = ComponentTypeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
