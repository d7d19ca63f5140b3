//! # Maintenance and Task Requests
//!
//! Bodies for the policy-level maintenance operations: DDB seal, partition,
//! move, recovery and reconstruction, verification and aux-copy tasks,
//! start-over, reassociation, and the smaller per-copy commands (data path
//! edits, seal frequency report, jobs-on-copy script).
//!
//! Task-style operations share one envelope (`taskInfo` with associations,
//! a task header and one sub-task); [`task_request`] builds it so each
//! operation only supplies its operation type and options.

use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::error::{require_non_empty, ValidationError};
use crate::names::{CopyId, EntityRef, PolicyId};

/// Operation type codes for task-style requests.
pub mod op_types {
    pub const AUX_COPY: u32 = 4003;
    pub const VERIFICATION: u32 = 4007;
    pub const DDB_RECONSTRUCTION: u32 = 4036;
    pub const DDB_MOVE: u32 = 5013;
}

/// Destination of a reassociation that leaves subclients unassigned.
pub const UNASSIGNED_POLICY: &str = "CV_DEFAULT";

const ANY_MEDIA_AGENT: &str = "<ANY MEDIAAGENT>";

/// Builds the common task envelope around one sub-task.
pub fn task_request(policy_name: &str, copy_name: &str, operation_type: u32, options: Value) -> Value {
    json!({
        "taskInfo": {
            "associations": [{ "copyName": copy_name, "storagePolicyName": policy_name }],
            "task": {
                "taskType": 1,
                "initiatedFrom": 1,
                "policyType": 0,
                "taskId": 0,
                "taskFlags": { "disabled": false }
            },
            "subTasks": [{
                "subTaskOperation": 1,
                "subTask": { "subTaskType": 1, "operationType": operation_type },
                "options": options
            }]
        }
    })
}

// ============================================================================
// DDB LIFECYCLE
// ============================================================================

pub fn seal_ddb_request(policy_name: &str, copy_name: &str) -> Result<Value, ValidationError> {
    require_non_empty("copy name", copy_name)?;
    Ok(json!({
        "App_SealSIDBStoreReq": {
            "archiveGroupCopy": { "copyName": copy_name, "storagePolicyName": policy_name }
        }
    }))
}

pub fn add_ddb_partition_request(
    commcell_id: u32,
    copy_id: CopyId,
    store_id: u64,
    path: &str,
    media_agent: &EntityRef,
) -> Result<Value, ValidationError> {
    require_non_empty("partition path", path)?;
    let client = media_agent.resolve("media agent")?;
    Ok(json!({
        "EVGui_ParallelDedupConfigReq": {
            "commCellId": commcell_id,
            "copyId": copy_id.value(),
            "operation": 15,
            "SIDBStore": { "SIDBStoreId": store_id },
            "dedupconfigItem": {
                "commCellId": 0,
                "maInfoList": [{
                    "clientInfo": client.to_json("id", "name"),
                    "subStoreList": [{ "accessPath": { "path": path } }]
                }]
            }
        }
    }))
}

/// Relocation of one DDB partition. With `config_only` only the database
/// record changes; the files must be moved by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdbMove {
    pub copy_name: String,
    pub src_path: String,
    pub dest_path: String,
    pub src_media_agent: String,
    pub dest_media_agent: String,
    pub config_only: bool,
}

impl DdbMove {
    pub fn build_request(&self, policy_name: &str) -> Result<Value, ValidationError> {
        require_non_empty("copy name", &self.copy_name)?;
        require_non_empty("source path", &self.src_path)?;
        require_non_empty("destination path", &self.dest_path)?;
        require_non_empty("source media agent", &self.src_media_agent)?;
        require_non_empty("destination media agent", &self.dest_media_agent)?;

        let options = json!({
            "adminOpts": {
                "libraryOption": {
                    "operation": 20,
                    "ddbMoveOption": {
                        "flags": 2,
                        "subStoreList": [{
                            "srcPath": self.src_path,
                            "changeOnlyDB": self.config_only,
                            "destPath": self.dest_path,
                            "destMediaAgent": { "name": self.dest_media_agent },
                            "srcMediaAgent": { "name": self.src_media_agent }
                        }]
                    }
                }
            }
        });
        Ok(task_request(policy_name, &self.copy_name, op_types::DDB_MOVE, options))
    }
}

pub fn mark_for_recovery_request(
    store_id: u64,
    sub_store_id: u64,
    media_agent: &str,
    path: &str,
) -> Result<Value, ValidationError> {
    require_non_empty("media agent", media_agent)?;
    require_non_empty("dedupe path", path)?;
    Ok(json!({
        "EVGui_IdxSIDBSubStoreOpReq": {
            "info": {
                "SIDBStoreId": store_id,
                "SubStoreId": sub_store_id,
                "opType": 1,
                "path": path,
                "mediaAgent": { "name": media_agent }
            }
        }
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconstructionMode {
    #[default]
    Partial,
    Full,
}

impl ReconstructionMode {
    pub fn flags(self) -> u32 {
        match self {
            ReconstructionMode::Partial => 0,
            ReconstructionMode::Full => 1,
        }
    }
}

pub fn reconstruction_request(
    policy_name: &str,
    copy_name: &str,
    store_id: u64,
    mode: ReconstructionMode,
    scalable_resources: bool,
) -> Result<Value, ValidationError> {
    require_non_empty("copy name", copy_name)?;
    Ok(json!({
        "TMMsg_DedupSyncTaskReq": {
            "flags": 0,
            "taskInfo": {
                "associations": [{ "copyName": copy_name, "storagePolicyName": policy_name }],
                "subTasks": [{
                    "options": {
                        "adminOpts": {
                            "dedupDBSyncOption": { "SIDBStoreId": store_id },
                            "reconstructDedupDBOption": {
                                "allowMaximum": 0,
                                "flags": mode.flags(),
                                "noOfStreams": 0,
                                "useScallableResourceManagement": scalable_resources,
                                "mediaAgent": { "mediaAgentName": ANY_MEDIA_AGENT }
                            }
                        }
                    },
                    "subTask": { "operationType": op_types::DDB_RECONSTRUCTION, "subTaskType": 1 }
                }],
                "task": { "initiatedFrom": 1, "taskType": 1, "taskFlags": { "disabled": 0 } }
            }
        }
    }))
}

pub fn start_over_request(policy_name: &str) -> Value {
    json!({
        "MediaManager_MMStartOverReq": {
            "bSealDDB": true,
            "storagePolicy": { "storagePolicyName": policy_name }
        }
    })
}

pub fn reassociate_request(current_policy: &str, new_policy: &str) -> Result<Value, ValidationError> {
    require_non_empty("destination policy name", new_policy)?;
    Ok(json!({
        "App_ReassociateStoragePolicyReq": {
            "forceNextBkpToFull": true,
            "newStoragePolicy": { "storagePolicyName": new_policy },
            "currentStoragePolicy": { "storagePolicyName": current_policy }
        }
    }))
}

/// Deletes one job from every listed copy of a policy.
pub fn delete_job_request(
    policy_name: &str,
    copy_names: &[String],
    job_id: u64,
    commcell_id: u32,
) -> Value {
    let jobs: Vec<Value> = copy_names
        .iter()
        .map(|copy| {
            json!({
                "appType": "",
                "commCellId": commcell_id,
                "jobId": job_id,
                "copyInfo": { "copyName": copy, "storagePolicyName": policy_name }
            })
        })
        .collect();
    json!({
        "App_JobOperationCopyReq": {
            "operationType": 2,
            "jobList": jobs,
            "commCellInfo": { "commCellId": commcell_id }
        }
    })
}

pub fn transactional_ddb_request(
    policy_name: &str,
    copy_name: &str,
    media_agent: &str,
    enabled: bool,
) -> Result<Value, ValidationError> {
    require_non_empty("copy name", copy_name)?;
    require_non_empty("media agent", media_agent)?;
    Ok(json!({
        "App_UpdateStoragePolicyCopyReq": {
            "storagePolicyCopyInfo": {
                "StoragePolicyCopy": { "copyName": copy_name, "storagePolicyName": policy_name },
                "DDBPartitionInfo": {
                    "maInfoList": [{ "mediaAgent": { "mediaAgentName": media_agent } }],
                    "sidbStoreInfo": { "sidbStoreFlags": { "enableTransactionalDDB": enabled } }
                }
            }
        }
    }))
}

// ============================================================================
// TASKS
// ============================================================================

/// Aux copy job options. Without a copy name the job runs for every copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxCopyOptions {
    pub copy_name: Option<String>,
    pub media_agent: Option<String>,
    pub scalable_resources: bool,
    /// Zero means "use the maximum".
    pub streams: u32,
    pub total_jobs_to_process: u32,
    pub ignore_verification_failed_jobs: bool,
    pub description: String,
}

impl Default for AuxCopyOptions {
    fn default() -> Self {
        AuxCopyOptions {
            copy_name: None,
            media_agent: None,
            scalable_resources: true,
            streams: 0,
            total_jobs_to_process: 1000,
            ignore_verification_failed_jobs: false,
            description: String::new(),
        }
    }
}

impl AuxCopyOptions {
    pub fn for_copy(copy_name: &str) -> Self {
        AuxCopyOptions {
            copy_name: Some(copy_name.to_string()),
            ..Self::default()
        }
    }

    pub fn build_request(&self, policy_name: &str) -> Result<Value, ValidationError> {
        let copy_name = match &self.copy_name {
            Some(name) => {
                require_non_empty("copy name", name)?;
                name.as_str()
            }
            None => "",
        };
        let mut job_option = json!({
            "maxNumberOfStreams": self.streams,
            "useMaximumStreams": self.streams == 0,
            "useScallableResourceManagement": self.scalable_resources,
            "totalJobsToProcess": self.total_jobs_to_process,
            "ignoreDataVerificationFailedJobs": self.ignore_verification_failed_jobs,
            "allCopies": self.copy_name.is_none()
        });
        if let (Some(_), Some(agent)) = (&self.copy_name, &self.media_agent) {
            if !agent.trim().is_empty() {
                job_option["mediaAgent"] = json!({ "mediaAgentName": agent });
            }
        }
        let options = json!({
            "backupOpts": { "mediaOpt": { "auxcopyJobOption": job_option } },
            "commonOpts": { "jobDescription": self.description }
        });
        Ok(task_request(policy_name, copy_name, op_types::AUX_COPY, options))
    }
}

/// DDB verification run for one copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdbVerification {
    pub copy_name: String,
    /// Backup level verified, e.g. `INCREMENTAL` or `FULL`.
    pub backup_level: String,
    /// e.g. `DDB_VERIFICATION`, `QUICK_DDB_VERIFICATION`, `DDB_DEFRAGMENTATION`.
    pub level: String,
    pub scalable_resources: bool,
    pub orphan_chunk_listing: bool,
}

impl DdbVerification {
    pub const DEFRAGMENTATION: &'static str = "DDB_DEFRAGMENTATION";

    pub fn build_request(&self, policy_name: &str) -> Result<Value, ValidationError> {
        require_non_empty("copy name", &self.copy_name)?;
        require_non_empty("backup level", &self.backup_level)?;
        require_non_empty("verification level", &self.level)?;
        let options = json!({
            "backupOpts": {
                "mediaOpt": {
                    "auxcopyJobOption": {
                        "maxNumberOfStreams": 0,
                        "allCopies": true,
                        "useMaximumStreams": true,
                        "useScallableResourceManagement": self.scalable_resources,
                        "mediaAgent": { "mediaAgentName": "" }
                    }
                }
            },
            "adminOpts": {
                "archiveCheckOption": {
                    "ddbVerificationLevel": self.level,
                    "jobsToVerify": 0,
                    "allCopies": true,
                    "backupLevel": self.backup_level,
                    "ocl": self.orphan_chunk_listing,
                    "runDefrag": self.level == Self::DEFRAGMENTATION
                }
            }
        });
        Ok(task_request(policy_name, &self.copy_name, op_types::VERIFICATION, options))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobsToVerify {
    #[default]
    New,
    VerificationExpired,
    All,
}

impl JobsToVerify {
    pub fn wire_name(self) -> &'static str {
        match self {
            JobsToVerify::New => "NEWLY_AVAILABLE",
            JobsToVerify::VerificationExpired => "VERIFICATION_EXP",
            JobsToVerify::All => "BOTH_NEWLY_AVAILABLE_AND_VERIFICATION_EXP",
        }
    }
}

impl std::str::FromStr for JobsToVerify {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NEW" => Ok(JobsToVerify::New),
            "VERF_EXPIRED" => Ok(JobsToVerify::VerificationExpired),
            "ALL" => Ok(JobsToVerify::All),
            _ => Err(ValidationError::UnknownOption {
                field: "jobs to verify",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataVerificationOptions {
    pub copy_name: String,
    pub media_agent: String,
    pub streams: u32,
    pub jobs_to_verify: JobsToVerify,
    pub scalable_resources: bool,
    pub description: String,
}

impl Default for DataVerificationOptions {
    fn default() -> Self {
        DataVerificationOptions {
            copy_name: String::new(),
            media_agent: String::new(),
            streams: 0,
            jobs_to_verify: JobsToVerify::New,
            scalable_resources: true,
            description: String::new(),
        }
    }
}

impl DataVerificationOptions {
    pub fn build_request(&self, policy_name: &str) -> Value {
        let options = json!({
            "backupOpts": {
                "mediaOpt": {
                    "auxcopyJobOption": {
                        "maxNumberOfStreams": self.streams,
                        "useMaximumStreams": self.streams == 0,
                        "useScallableResourceManagement": self.scalable_resources,
                        "mediaAgent": { "mediaAgentName": self.media_agent }
                    }
                }
            },
            "adminOpts": {
                "archiveCheckOption": { "jobsToVerify": self.jobs_to_verify.wire_name() }
            },
            "commonOpts": { "jobDescription": self.description }
        });
        task_request(policy_name, &self.copy_name, op_types::VERIFICATION, options)
    }
}

// ============================================================================
// COPY COMMANDS
// ============================================================================

pub fn seal_frequency_request(policy_id: PolicyId, copy_id: CopyId) -> Value {
    json!({
        "EVGui_StoragePolicySummaryReq": {
            "spId": policy_id.value(),
            "spCopyId": copy_id.value(),
            "reportType": 5
        }
    })
}

/// Data path edit on a copy: remove it, or make it the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPathChange {
    Remove,
    SetDefault,
}

pub fn datapath_request(
    change: DataPathChange,
    library: &str,
    media_agent: &str,
) -> Result<Value, ValidationError> {
    require_non_empty("library", library)?;
    require_non_empty("media agent", media_agent)?;
    let flag = match change {
        DataPathChange::Remove => "removeDataPath",
        DataPathChange::SetDefault => "setDefault",
    };
    Ok(json!({
        "storagePolicyCopyInfo": {
            "dataPathProperties": [{
                "operationFlags": { flag: true },
                "mediaAgent": { "mediaAgentName": media_agent },
                "library": { "libraryName": library }
            }]
        }
    }))
}

/// Filters for the jobs-on-copy report script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobsOnCopyFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub backup_type: Option<String>,
    pub retained_by: Option<u32>,
    pub include_to_be_copied: bool,
    pub partial_jobs_only: bool,
}

impl JobsOnCopyFilter {
    pub fn command(&self, policy_name: &str, copy_name: &str) -> String {
        let mut command = format!(
            "qoperation execscript -sn QS_JobsinSPCopy -si @i_policyName='{}' -si @i_copyName='{}'",
            policy_name, copy_name
        );
        if let Some(from) = self.from {
            command.push_str(&format!(" -si @i_fromTime='{}'", from.format("%Y-%m-%d")));
        }
        if let Some(to) = self.to {
            command.push_str(&format!(" -si @i_toTime='{}'", to.format("%Y-%m-%d")));
        }
        if let Some(kind) = self.backup_type.as_deref().filter(|k| !k.trim().is_empty()) {
            command.push_str(&format!(" -si @i_backupType='{}'", kind.trim().to_lowercase()));
        }
        if let Some(retained_by) = self.retained_by.filter(|r| *r != 0) {
            command.push_str(&format!(" -si @i_retention='{}'", retained_by));
        }
        if self.include_to_be_copied {
            command.push_str(" -si @i_includeToBeCopiedJobs='1'");
        }
        if self.partial_jobs_only {
            command.push_str(" -si @i_includePartialJobsOnly='1'");
        }
        command
    }
}
