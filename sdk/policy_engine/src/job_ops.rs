//! # Job Operations on a Copy
//!
//! Maps a semantic job operation onto the two service channels that accept
//! it, normalizes caller-supplied job ids, and plans batches for the legacy
//! script channel whose command line has a length ceiling.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::names::{CopyId, PolicyId};

/// Longest comma-joined id list the legacy script channel accepts per call.
pub const LEGACY_BATCH_LIMIT: usize = 200;

/// Name of the server-side script that marks jobs on a copy.
pub const MARK_JOBS_SCRIPT: &str = "MarkJobsOnCopy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobOperation {
    Delete,
    AllowCopy,
    PreventCopy,
    Recopy,
    MarkBad,
    PickForVerification,
    DoNotVerify,
    PickForBackupCopy,
}

/// Service channel an operation is sent over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobChannel {
    /// JSON endpoint taking the whole id array in one request.
    Batch,
    /// Script invocation taking a comma-joined id string, length-limited.
    Legacy,
}

impl JobOperation {
    /// `opType` on the batch endpoint, for operations it supports.
    pub fn batch_op_type(self) -> Option<&'static str> {
        match self {
            JobOperation::Delete => Some("DELETE"),
            JobOperation::AllowCopy => Some("ALLOW_COPY"),
            JobOperation::PreventCopy => Some("DISALLOW_COPY"),
            JobOperation::Recopy => Some("RECOPY"),
            _ => None,
        }
    }

    /// Operation argument of the legacy mark-jobs script. Deleting is not
    /// available there.
    pub fn script_operation(self) -> Option<&'static str> {
        match self {
            JobOperation::Delete => None,
            JobOperation::AllowCopy => Some("allowcopy"),
            JobOperation::PreventCopy => Some("donotcopy"),
            JobOperation::Recopy => Some("recopy"),
            JobOperation::MarkBad => Some("markJobsBad"),
            JobOperation::PickForVerification => Some("pickForVerification"),
            JobOperation::DoNotVerify => Some("donotPickForVerification"),
            JobOperation::PickForBackupCopy => Some("pickForBackupCopy"),
        }
    }

    /// Preferred channel: the batch endpoint whenever it supports the operation.
    pub fn channel(self) -> JobChannel {
        if self.batch_op_type().is_some() {
            JobChannel::Batch
        } else {
            JobChannel::Legacy
        }
    }
}

impl std::fmt::Display for JobOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobOperation::Delete => "delete",
            JobOperation::AllowCopy => "allow copy",
            JobOperation::PreventCopy => "prevent copy",
            JobOperation::Recopy => "recopy",
            JobOperation::MarkBad => "mark bad",
            JobOperation::PickForVerification => "pick for verification",
            JobOperation::DoNotVerify => "do not verify",
            JobOperation::PickForBackupCopy => "pick for backup copy",
        };
        f.write_str(name)
    }
}

// ============================================================================
// JOB ID NORMALIZATION
// ============================================================================

/// Job ids as a caller may supply them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSelection {
    Single(u64),
    /// Comma-separated list, e.g. `"101, 102,103"`.
    Text(String),
    Ids(Vec<u64>),
    /// Each entry may itself be comma-separated.
    Strings(Vec<String>),
}

impl From<u64> for JobSelection {
    fn from(id: u64) -> Self {
        JobSelection::Single(id)
    }
}

impl From<&str> for JobSelection {
    fn from(s: &str) -> Self {
        JobSelection::Text(s.to_string())
    }
}

impl From<String> for JobSelection {
    fn from(s: String) -> Self {
        JobSelection::Text(s)
    }
}

impl From<Vec<u64>> for JobSelection {
    fn from(ids: Vec<u64>) -> Self {
        JobSelection::Ids(ids)
    }
}

impl From<&[u64]> for JobSelection {
    fn from(ids: &[u64]) -> Self {
        JobSelection::Ids(ids.to_vec())
    }
}

impl From<Vec<String>> for JobSelection {
    fn from(ids: Vec<String>) -> Self {
        JobSelection::Strings(ids)
    }
}

impl From<Vec<&str>> for JobSelection {
    fn from(ids: Vec<&str>) -> Self {
        JobSelection::Strings(ids.into_iter().map(str::to_string).collect())
    }
}

impl JobSelection {
    pub fn normalize(&self) -> Result<JobIds, ValidationError> {
        let mut raw = Vec::new();
        match self {
            JobSelection::Single(id) => raw.push(*id),
            JobSelection::Ids(ids) => raw.extend_from_slice(ids),
            JobSelection::Text(text) => parse_text(text, &mut raw)?,
            JobSelection::Strings(items) => {
                for item in items {
                    parse_text(item, &mut raw)?;
                }
            }
        }
        JobIds::new(raw)
    }
}

fn parse_text(text: &str, out: &mut Vec<u64>) -> Result<(), ValidationError> {
    for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let id = token
            .parse::<u64>()
            .map_err(|_| ValidationError::InvalidJobId(token.to_string()))?;
        out.push(id);
    }
    Ok(())
}

/// Non-empty, duplicate-free job ids in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIds(Vec<u64>);

impl JobIds {
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for id in ids {
            if id == 0 {
                return Err(ValidationError::InvalidJobId("0".to_string()));
            }
            if seen.insert(id) {
                out.push(id);
            }
        }
        if out.is_empty() {
            return Err(ValidationError::NoJobIds);
        }
        Ok(JobIds(out))
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

/// Body of the batch job-operation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJobRequest {
    pub op_type: String,
    pub job_ids: Vec<u64>,
    pub commcell_id: u32,
    pub copy_id: CopyId,
    pub storage_policy_id: PolicyId,
    pub load_dependent_jobs: bool,
    pub load_archiver_jobs: bool,
}

impl BatchJobRequest {
    /// Builds the body, or `None` when the operation has no batch form.
    pub fn new(
        operation: JobOperation,
        ids: &JobIds,
        commcell_id: u32,
        policy_id: PolicyId,
        copy_id: CopyId,
    ) -> Option<Self> {
        Some(BatchJobRequest {
            op_type: operation.batch_op_type()?.to_string(),
            job_ids: ids.as_slice().to_vec(),
            commcell_id,
            copy_id,
            storage_policy_id: policy_id,
            load_dependent_jobs: false,
            load_archiver_jobs: false,
        })
    }
}

/// Splits ids into comma-joined batches of at most `limit` characters. Only
/// an id longer than `limit` by itself produces a longer batch. Every id
/// appears in exactly one batch, in input order.
pub fn plan_legacy_batches(ids: &JobIds, limit: usize) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();

    for id in ids.as_slice() {
        let token = id.to_string();
        if !current.is_empty() && current.len() + 1 + token.len() > limit {
            batches.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(',');
        }
        current.push_str(&token);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Command line for one legacy mark-jobs call.
pub fn legacy_mark_command(policy_name: &str, copy_name: &str, operation: &str, batch: &str) -> String {
    format!(
        "-sn {} -si {} -si {} -si {} -si {}",
        MARK_JOBS_SCRIPT, policy_name, copy_name, operation, batch
    )
}

/// The legacy channel answers in plain text; this phrase means the service
/// rejected the ids for the copy.
pub fn is_legacy_rejection(text: &str) -> bool {
    text.to_lowercase().contains("jobs do not belong")
}
