use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::domain::ProsumerId;

/// Failures of the envelope core. Every variant reaches the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DoeError {
    #[error("Prosumer not found: {0}")]
    NotFound(ProsumerId),

    #[error("Invalid network configuration: {0}")]
    InvalidConfig(String),

    #[error("Input out of range: {0}")]
    OutOfRangeInput(String),
}

/// Stable machine-readable tag for a [`DoeError`], used in batch results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DoeErrorKind {
    NotFound,
    InvalidConfig,
    OutOfRangeInput,
}

impl DoeError {
    pub fn kind(&self) -> DoeErrorKind {
        match self {
            DoeError::NotFound(_) => DoeErrorKind::NotFound,
            DoeError::InvalidConfig(_) => DoeErrorKind::InvalidConfig,
            DoeError::OutOfRangeInput(_) => DoeErrorKind::OutOfRangeInput,
        }
    }
}
