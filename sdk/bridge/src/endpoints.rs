//! Service endpoint paths, relative to the configured base URL.

use policy_engine::{CopyId, PolicyId};

/// Policy listing (`GET`, with `getAll=TRUE`) and policy creation (`POST`).
pub const POLICIES: &str = "StoragePolicy";
pub const CREATE_COPY: &str = "StoragePolicy/Copy";
pub const DELETE_COPY: &str = "StoragePolicy/DeleteCopy";
/// Takes XML-style request objects as JSON bodies, or a `command` query.
pub const EXECUTE_QCOMMAND: &str = "ExecuteQCommand";
/// Runs a server-side script given in the `command` query.
pub const EXECUTE_QSCRIPT: &str = "ExecuteQScript";
pub const CREATE_TASK: &str = "CreateTask";
pub const JOB_OPERATIONS: &str = "V4/StoragePolicy/Copy/JobOperations";

/// `propertyLevel` of the basic policy document (copy listing).
pub const POLICY_PROPERTY_LEVEL: &str = "10";
/// `propertyLevel` of the advanced policy document.
pub const ADVANCED_PROPERTY_LEVEL: &str = "20";

pub fn policy(policy_id: PolicyId) -> String {
    format!("V2/StoragePolicy/{}", policy_id)
}

pub fn copy(policy_id: PolicyId, copy_id: CopyId) -> String {
    format!("V2/StoragePolicy/{}/Copy/{}", policy_id, copy_id)
}

pub fn disable_compliance_lock(policy_id: PolicyId, copy_id: CopyId) -> String {
    format!("{}/DisableComplianceLock", copy(policy_id, copy_id))
}
