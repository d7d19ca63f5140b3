//! # Copy Creation Requests
//!
//! Each copy flavour the service supports is created through the same
//! endpoint with a different body. [`CopySpec`] is the closed set of those
//! flavours; [`CopySpec::build`] validates the spec and renders the body.
//! Defaults (retention, dedupe flags) differ per flavour and follow what the
//! service seeds for each copy type.

use chrono::{NaiveDate, Weekday};
use serde_json::{json, Value};

use crate::error::{require_non_empty, ValidationError};
use crate::names::{EntityRef, PolicyId};
use crate::wire::bit;

/// Identity of the policy a copy is being created under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequestContext {
    pub policy_id: PolicyId,
    pub policy_name: String,
}

impl CopyRequestContext {
    pub fn new(policy_id: PolicyId, policy_name: &str) -> Self {
        CopyRequestContext {
            policy_id,
            policy_name: policy_name.to_string(),
        }
    }

    fn policy_ref(&self) -> Value {
        json!({
            "storagePolicyId": self.policy_id.value(),
            "storagePolicyName": self.policy_name
        })
    }
}

// ============================================================================
// SPECS
// ============================================================================

/// Tape drive pool and spare media group for a tape-backed copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapePools {
    pub library_id: u64,
    pub drive_pool_id: u64,
    pub drive_pool: String,
    pub spare_pool_id: u64,
    pub spare_pool: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryCopySpec {
    pub library: EntityRef,
    pub media_agent: EntityRef,
    pub tape: Option<TapePools>,
    pub snap_copy: bool,
}

impl SecondaryCopySpec {
    pub fn disk(library: impl Into<EntityRef>, media_agent: impl Into<EntityRef>) -> Self {
        SecondaryCopySpec {
            library: library.into(),
            media_agent: media_agent.into(),
            tape: None,
            snap_copy: false,
        }
    }

    #[must_use]
    pub fn with_tape(mut self, pools: TapePools) -> Self {
        self.tape = Some(pools);
        self
    }

    #[must_use]
    pub fn as_snap_copy(mut self) -> Self {
        self.snap_copy = true;
        self
    }
}

/// Copy whose storage comes from a global policy. The caller states whether
/// that policy is a dedupe pool and whether it is a global aux-copy policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalDependentCopySpec {
    pub global_policy: String,
    pub global_dedupe: bool,
    pub aux_copy_policy: bool,
    pub retention_days: u32,
}

impl GlobalDependentCopySpec {
    pub fn new(global_policy: &str) -> Self {
        GlobalDependentCopySpec {
            global_policy: global_policy.to_string(),
            global_dedupe: true,
            aux_copy_policy: false,
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapCopySpec {
    pub library: String,
    pub media_agent: String,
    pub source_copy: String,
    pub mirror: bool,
    pub snap: bool,
    pub replica: bool,
    pub provisioning: Option<(String, String)>,
    pub cloud_target: bool,
    pub job_based_retention: bool,
    pub selective_rule: Option<SelectiveFrequency>,
}

impl SnapCopySpec {
    pub fn new(library: &str, media_agent: &str, source_copy: &str) -> Self {
        SnapCopySpec {
            library: library.to_string(),
            media_agent: media_agent.to_string(),
            source_copy: source_copy.to_string(),
            mirror: false,
            snap: true,
            replica: false,
            provisioning: None,
            cloud_target: false,
            job_based_retention: false,
            selective_rule: None,
        }
    }

    /// Provisioning policy and the resource pool it draws from.
    #[must_use]
    pub fn with_provisioning(mut self, policy: &str, resource_pool: &str) -> Self {
        self.provisioning = Some((policy.to_string(), resource_pool.to_string()));
        self
    }
}

/// Which backups a selective copy picks within each frequency window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullSelection {
    #[default]
    FirstFull,
    LastFull,
    LastFullWait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectiveFrequency {
    All,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    HalfYearly,
    Yearly,
    Advanced,
}

impl SelectiveFrequency {
    pub fn code(self) -> u32 {
        match self {
            SelectiveFrequency::All => 2,
            SelectiveFrequency::Hourly => 262_144,
            SelectiveFrequency::Daily => 524_288,
            SelectiveFrequency::Weekly => 4,
            SelectiveFrequency::Monthly => 8,
            SelectiveFrequency::Quarterly => 16,
            SelectiveFrequency::HalfYearly => 32,
            SelectiveFrequency::Yearly => 64,
            SelectiveFrequency::Advanced => 16_777_216,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SelectiveFrequency::All => "all",
            SelectiveFrequency::Hourly => "hourly",
            SelectiveFrequency::Daily => "daily",
            SelectiveFrequency::Weekly => "weekly",
            SelectiveFrequency::Monthly => "monthly",
            SelectiveFrequency::Quarterly => "quarterly",
            SelectiveFrequency::HalfYearly => "halfyearly",
            SelectiveFrequency::Yearly => "yearly",
            SelectiveFrequency::Advanced => "advanced",
        }
    }
}

/// Start of a selective copy's window. Time applies to hourly and daily
/// copies, weekday to weekly, day of month to monthly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStart {
    Time { hours: u8, minutes: u8, seconds: u8, pm: bool },
    Weekday(Weekday),
    MonthDay(u8),
}

impl DayStart {
    fn label(&self) -> &'static str {
        match self {
            DayStart::Time { .. } => "time of day",
            DayStart::Weekday(_) => "weekday",
            DayStart::MonthDay(_) => "day of month",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectiveCopySpec {
    pub library: EntityRef,
    pub media_agent: EntityRef,
    pub frequency: SelectiveFrequency,
    pub selection: FullSelection,
    pub backups_from: NaiveDate,
    pub day_start: Option<DayStart>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupeCopySpec {
    pub library: EntityRef,
    pub media_agent: EntityRef,
    pub ddb_path: String,
    pub ddb_media_agent: String,
    /// `None` leaves the choice to the service.
    pub dash_full: Option<bool>,
    pub source_side_disk_cache: Option<bool>,
    pub software_compression: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopySpec {
    Secondary(SecondaryCopySpec),
    GlobalDependent(GlobalDependentCopySpec),
    Snap(SnapCopySpec),
    Selective(SelectiveCopySpec),
    Deduplicated(DedupeCopySpec),
}

// ============================================================================
// BUILD
// ============================================================================

const DISK_FREE_THRESHOLD_MB: u32 = 5120;
const DISK_FREE_WARNING_THRESHOLD_MB: u32 = 10240;
/// Tri-state wire value meaning "service default".
const SERVICE_DEFAULT: i64 = 2;

fn tri_state(value: Option<bool>) -> i64 {
    value.map(bit).unwrap_or(SERVICE_DEFAULT)
}

impl CopySpec {
    pub fn build(&self, copy_name: &str, ctx: &CopyRequestContext) -> Result<Value, ValidationError> {
        require_non_empty("copy name", copy_name)?;
        let copy_info = match self {
            CopySpec::Secondary(spec) => secondary_info(spec, ctx)?,
            CopySpec::GlobalDependent(spec) => global_dependent_info(spec, ctx)?,
            CopySpec::Snap(spec) => snap_info(spec, ctx)?,
            CopySpec::Selective(spec) => selective_info(spec, ctx)?,
            CopySpec::Deduplicated(spec) => dedupe_info(copy_name, spec, ctx)?,
        };
        Ok(json!({ "copyName": copy_name, "storagePolicyCopyInfo": copy_info }))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CopySpec::Secondary(_) => "secondary",
            CopySpec::GlobalDependent(_) => "global dependent",
            CopySpec::Snap(_) => "snap",
            CopySpec::Selective(_) => "selective",
            CopySpec::Deduplicated(_) => "deduplicated",
        }
    }
}

fn data_path(library: &EntityRef, media_agent: &EntityRef) -> Result<(Value, Value), ValidationError> {
    let library = library.resolve("library")?;
    let media_agent = media_agent.resolve("media agent")?;
    Ok((
        library.to_json("libraryId", "libraryName"),
        media_agent.to_json("mediaAgentId", "mediaAgentName"),
    ))
}

fn secondary_info(spec: &SecondaryCopySpec, ctx: &CopyRequestContext) -> Result<Value, ValidationError> {
    let (library, media_agent) = data_path(&spec.library, &spec.media_agent)?;
    let mut info = json!({
        "copyType": 0,
        "isDefault": 0,
        "isMirrorCopy": 0,
        "isSnapCopy": bit(spec.snap_copy),
        "numberOfStreamsToCombine": 1,
        "StoragePolicyCopy": ctx.policy_ref(),
        "library": library,
        "mediaAgent": media_agent,
        "retentionRules": {
            "retainArchiverDataForDays": -1,
            "retainBackupDataForCycles": 1,
            "retainBackupDataForDays": 30
        }
    });

    if let Some(tape) = &spec.tape {
        require_non_empty("drive pool", &tape.drive_pool)?;
        require_non_empty("spare pool", &tape.spare_pool)?;
        let library_name = info["library"]["libraryName"].clone();
        info["library"]["libraryId"] = json!(tape.library_id);
        info["drivePool"] = json!({
            "drivePoolId": tape.drive_pool_id,
            "drivePoolName": tape.drive_pool,
            "libraryName": library_name
        });
        info["spareMediaGroup"] = json!({
            "spareMediaGroupId": tape.spare_pool_id,
            "spareMediaGroupName": tape.spare_pool,
            "libraryName": library_name
        });
    }
    Ok(info)
}

fn global_dependent_info(
    spec: &GlobalDependentCopySpec,
    ctx: &CopyRequestContext,
) -> Result<Value, ValidationError> {
    require_non_empty("global policy name", &spec.global_policy)?;
    let dedupe = bit(spec.global_dedupe);
    let mut info = json!({
        "copyType": 1,
        "isDefault": 0,
        "isMirrorCopy": 0,
        "isSnapCopy": 0,
        "numberOfStreamsToCombine": 1,
        "StoragePolicyCopy": { "storagePolicyName": ctx.policy_name },
        "retentionRules": {
            "retainArchiverDataForDays": -1,
            "retainBackupDataForCycles": 1,
            "retainBackupDataForDays": spec.retention_days
        },
        "dedupeFlags": {
            "enableDeduplication": dedupe,
            "useGlobalDedupStore": dedupe
        }
    });

    let global = json!({ "storagePolicyName": spec.global_policy });
    if spec.aux_copy_policy {
        info["extendedFlags"] = json!({ "useGlobalAuxCopyPolicy": 1 });
        info["globalAuxCopy"] = global;
    } else {
        info["extendedFlags"] = json!({ "useGlobalStoragePolicy": 1 });
        info["useGlobalPolicy"] = global;
    }
    Ok(info)
}

fn snap_info(spec: &SnapCopySpec, ctx: &CopyRequestContext) -> Result<Value, ValidationError> {
    require_non_empty("library", &spec.library)?;
    require_non_empty("media agent", &spec.media_agent)?;
    require_non_empty("source copy", &spec.source_copy)?;

    let (provisioning_policy, resource_pool) = match &spec.provisioning {
        Some((policy, pool)) => (policy.as_str(), pool.as_str()),
        None => ("", ""),
    };
    let replica = bit(spec.replica);

    let mut info = json!({
        "copyType": 0,
        "active": 1,
        "isDefault": 0,
        "isMirrorCopy": bit(spec.mirror),
        "isSnapCopy": bit(spec.snap),
        "provisioningPolicyName": provisioning_policy,
        "StoragePolicyCopy": ctx.policy_ref(),
        "extendedFlags": {
            "arrayReplicaCopy": replica,
            "isNetAppSnapCloudTargetCopy": bit(spec.cloud_target),
            "useOfflineArrayReplication": replica
        },
        "library": { "libraryName": spec.library },
        "mediaAgent": { "mediaAgentName": spec.media_agent },
        "spareMediaGroup": { "libraryName": spec.library },
        "retentionRules": {
            "jobs": 8,
            "retainArchiverDataForDays": -1,
            "retainBackupDataForCycles": 5,
            "retainBackupDataForDays": 1,
            "retentionFlags": { "jobBasedRetention": bit(spec.job_based_retention) }
        },
        "sourceCopy": {
            "copyName": spec.source_copy,
            "storagePolicyName": ctx.policy_name
        },
        "resourcePoolsList": [{ "operation": 1, "resourcePoolName": resource_pool }]
    });

    if let Some(frequency) = spec.selective_rule {
        info["copyType"] = json!(2);
        info["selectiveCopyRules"] = json!({ "selectiveRule": frequency.code() });
    }
    Ok(info)
}

fn selective_info(spec: &SelectiveCopySpec, ctx: &CopyRequestContext) -> Result<Value, ValidationError> {
    let (library, media_agent) = data_path(&spec.library, &spec.media_agent)?;

    let mut rules = json!({ "selectiveRule": spec.frequency.code() });
    match (spec.frequency, spec.day_start) {
        (SelectiveFrequency::Weekly, None) => {
            rules["weekDayStartsOn"] = json!(Weekday::Fri.num_days_from_sunday());
        }
        (SelectiveFrequency::Weekly, Some(DayStart::Weekday(day))) => {
            rules["weekDayStartsOn"] = json!(day.num_days_from_sunday());
        }
        (SelectiveFrequency::Monthly, None) => {
            rules["monthStartsOn"] = json!(1);
        }
        (SelectiveFrequency::Monthly, Some(DayStart::MonthDay(day))) => {
            if !(1..=31).contains(&day) {
                return Err(ValidationError::OutOfRange {
                    field: "month start day",
                    value: i64::from(day),
                });
            }
            rules["monthStartsOn"] = json!(day);
        }
        (
            SelectiveFrequency::Daily | SelectiveFrequency::Hourly,
            Some(DayStart::Time { hours, minutes, seconds, pm }),
        ) => {
            if hours > 12 || minutes > 59 || seconds > 59 {
                return Err(ValidationError::OutOfRange {
                    field: "day start time",
                    value: i64::from(hours) * 3600 + i64::from(minutes) * 60 + i64::from(seconds),
                });
            }
            rules["dayStartsAt"] = json!({
                "amOrPm": if pm { "PM" } else { "AM" },
                "dayStartsHoursMinutes": { "hours": hours, "minutes": minutes, "seconds": seconds }
            });
        }
        (_, None) => {}
        (frequency, Some(start)) => {
            return Err(ValidationError::SelectiveDayStartMismatch {
                option: start.label(),
                frequency: frequency.label(),
            });
        }
    }

    let mut info = json!({
        "copyType": 2,
        "isDefault": 0,
        "isMirrorCopy": 0,
        "isSnapCopy": 0,
        "numberOfStreamsToCombine": 1,
        "StoragePolicyCopy": ctx.policy_ref(),
        "library": library,
        "mediaAgent": media_agent,
        "retentionRules": {
            "retainArchiverDataForDays": -1,
            "retainBackupDataForCycles": 100,
            "retainBackupDataForDays": 150
        },
        "startTime": { "timeValue": spec.backups_from.format("%Y-%m-%d").to_string() },
        "selectiveCopyRules": rules
    });

    match spec.selection {
        FullSelection::FirstFull => {}
        FullSelection::LastFull => info["copyFlags"] = json!({ "lastFull": 1 }),
        FullSelection::LastFullWait => info["copyFlags"] = json!({ "lastFull": 1, "lastFullWait": 1 }),
    }
    Ok(info)
}

fn dedupe_info(
    copy_name: &str,
    spec: &DedupeCopySpec,
    ctx: &CopyRequestContext,
) -> Result<Value, ValidationError> {
    let (library, media_agent) = data_path(&spec.library, &spec.media_agent)?;
    require_non_empty("DDB path", &spec.ddb_path)?;
    require_non_empty("DDB media agent", &spec.ddb_media_agent)?;

    Ok(json!({
        "copyType": 0,
        "isDefault": 0,
        "isMirrorCopy": 0,
        "isSnapCopy": 0,
        "numberOfStreamsToCombine": 1,
        "StoragePolicyCopy": ctx.policy_ref(),
        "library": library,
        "mediaAgent": media_agent,
        "copyFlags": { "auxCopyReencryptData": 0 },
        "dedupeFlags": {
            "enableDeduplication": 1,
            "enableDASHFull": tri_state(spec.dash_full),
            "enableSourceSideDiskCache": tri_state(spec.source_side_disk_cache)
        },
        "retentionRules": {
            "retainArchiverDataForDays": -1,
            "retainBackupDataForCycles": 1,
            "retainBackupDataForDays": 30
        },
        "DDBPartitionInfo": {
            "maInfoList": [{
                "mediaAgent": { "mediaAgentName": spec.ddb_media_agent },
                "subStoreList": [{
                    "diskFreeThresholdMB": DISK_FREE_THRESHOLD_MB,
                    "diskFreeWarningThreshholdMB": DISK_FREE_WARNING_THRESHOLD_MB,
                    "accessPath": { "path": spec.ddb_path }
                }]
            }],
            "sidbStoreInfo": {
                "operation": 1,
                "copyName": copy_name,
                "sidbStoreFlags": { "enableSoftwareCompression": tri_state(spec.software_compression) }
            }
        }
    }))
}
