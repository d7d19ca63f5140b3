//! Local validation failures.
//!
//! Every variant here is raised before a request leaves the process, so a caller
//! seeing one knows the service was never contacted.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("extended retention slot must be 1, 2 or 3, got {0}")]
    InvalidRetentionSlot(u8),

    #[error("unknown extended retention rule '{0}'")]
    UnknownRetentionRule(String),

    #[error("unknown cipher '{0}'")]
    UnknownCipher(String),

    #[error("DDB resiliency needs at least one partition for jobs to run, got {0}")]
    InvalidMinimumPartitions(u32),

    #[error("{flag} requires deduplication to be enabled on the copy")]
    DedupeDisabled { flag: &'static str },

    #[error("invalid job id '{0}'")]
    InvalidJobId(String),

    #[error("no job ids supplied")]
    NoJobIds,

    #[error("no policy exists with name: {0}")]
    PolicyNotFound(String),

    #[error("no copy exists with name: {0}")]
    CopyNotFound(String),

    #[error("storage policy copy \"{0}\" already exists")]
    CopyAlreadyExists(String),

    #[error("storage policy \"{0}\" already exists")]
    PolicyAlreadyExists(String),

    #[error("copy \"{0}\" is the primary copy and cannot be deleted")]
    PrimaryCopyDeletion(String),

    #[error("copy \"{0}\" is the snap primary copy and cannot be deleted")]
    SnapPrimaryDeletion(String),

    #[error("policy \"{0}\" uses a global dedup store and cannot be started over")]
    DependentPolicyStartOver(String),

    #[error("policy \"{0}\" has no primary copy")]
    NoPrimaryCopy(String),

    #[error("{option} does not apply to {frequency} selective copies")]
    SelectiveDayStartMismatch {
        option: &'static str,
        frequency: &'static str,
    },

    #[error("{field} is out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("unknown {field} '{value}'")]
    UnknownOption { field: &'static str, value: String },
}

impl ValidationError {
    pub fn empty(field: &'static str) -> Self {
        ValidationError::EmptyField { field }
    }
}

/// Rejects blank names before they reach a request body.
pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::empty(field));
    }
    Ok(())
}
