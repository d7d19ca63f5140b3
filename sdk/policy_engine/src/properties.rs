//! # Copy Property Document
//!
//! Typed view of the document the service returns for `GET` on a copy and
//! expects back, whole, on `PUT`. Only the fields the SDK reads or writes are
//! modelled; everything else is carried in each struct's `extra` map so a
//! full-snapshot push never drops data the service sent.
//!
//! Flags use the service's 0/1 integer encoding and stay `Option` so an absent
//! field is not turned into an explicit zero on the way back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::names::{CopyId, PolicyId};
use crate::wire::is_set;

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyProperties {
    #[serde(rename = "StoragePolicyCopy", default)]
    pub identity: CopyIdentity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_precedence: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<i64>,

    #[serde(default, skip_serializing_if = "RetentionRules::is_empty")]
    pub retention_rules: RetentionRules,

    #[serde(default, skip_serializing_if = "DedupeFlags::is_empty")]
    pub dedupe_flags: DedupeFlags,

    #[serde(default, skip_serializing_if = "CopyFlags::is_empty")]
    pub copy_flags: CopyFlags,

    #[serde(default, skip_serializing_if = "ExtendedFlags::is_empty")]
    pub extended_flags: ExtendedFlags,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_encryption: Option<DataEncryption>,

    #[serde(default, skip_serializing_if = "MediaProperties::is_empty")]
    pub media_properties: MediaProperties,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_copy: Option<CopyReference>,

    #[serde(
        rename = "throttleNetworkBandWidthMBHR",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub network_throttle_bandwidth: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_number_of_partitions_for_jobs_to_run: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_agent: Option<MediaAgentInfo>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_id: Option<CopyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_policy_id: Option<PolicyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_policy_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// RETENTION
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain_backup_data_for_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain_backup_data_for_cycles: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain_archiver_data_for_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<i64>,
    #[serde(default, skip_serializing_if = "RetentionFlags::is_empty")]
    pub retention_flags: RetentionFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_retention_rule_one: Option<ExtendedRetentionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_retention_rule_two: Option<ExtendedRetentionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_retention_rule_three: Option<ExtendedRetentionRule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RetentionRules {
    pub fn is_empty(&self) -> bool {
        *self == RetentionRules::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_based_retention: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_managed_disk_space: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RetentionFlags {
    pub fn is_empty(&self) -> bool {
        *self == RetentionFlags::default()
    }
}

/// One extended retention slot as stored on the wire. `rule` is the bit value
/// of an [`crate::retention::ExtendedRetentionKind`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtendedRetentionRule {
    pub is_enabled: i64,
    pub rule: u32,
    pub end_days: i64,
    pub grace_days: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// FLAG BLOCKS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupeFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_deduplication: Option<i64>,
    #[serde(rename = "enableDASHFull", default, skip_serializing_if = "Option::is_none")]
    pub enable_dash_full: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_source_side_disk_cache: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_client_side_dedup: Option<i64>,
    #[serde(rename = "useDDBPrimingOption", default, skip_serializing_if = "Option::is_none")]
    pub use_ddb_priming_option: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_jobs_to_run_without_all_partitions: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_global_dedup_store: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DedupeFlags {
    pub fn is_empty(&self) -> bool {
        *self == DedupeFlags::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_encryption_mode_as_in_source: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_copy_reencrypt_data: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_plain_text: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypt_on_network_using_selected_cipher: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_parallel_copy: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_aux_copy: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worm_copy: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_media_refresh: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CopyFlags {
    pub fn is_empty(&self) -> bool {
        *self == CopyFlags::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypt_on_dependent_primary: Option<i64>,
    #[serde(rename = "overRideGACPRetention", default, skip_serializing_if = "Option::is_none")]
    pub override_pool_retention: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_on_clients: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_optimized_aux_copy: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExtendedFlags {
    pub fn is_empty(&self) -> bool {
        *self == ExtendedFlags::default()
    }
}

// ============================================================================
// ENCRYPTION, MEDIA, REFERENCES
// ============================================================================

/// The `dataEncryption` block. An empty block (all `None`) serializes as `{}`,
/// which the service reads as "no encryption".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataEncryption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypt_data: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_provider_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub rotate_master_key: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplexing_factor: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_refresh_properties: Option<MediaRefreshProperties>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MediaProperties {
    pub fn is_empty(&self) -> bool {
        *self == MediaProperties::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRefreshProperties {
    #[serde(default)]
    pub percentage: u32,
    #[serde(default)]
    pub months_before_media_aged: MonthCount,
    #[serde(default)]
    pub months_after_media_written: MonthCount,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCount {
    #[serde(default)]
    pub months: u32,
}

/// Reference to another copy of the same policy (`sourceCopy`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_id: Option<CopyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAgentInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_agent_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// SIMPLE ACCESSORS
// ============================================================================

impl CopyProperties {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn is_active(&self) -> bool {
        is_set(self.active)
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = Some(i64::from(active));
    }

    pub fn is_compliance_lock_enabled(&self) -> bool {
        is_set(self.copy_flags.worm_copy)
    }

    /// Stages the compliance lock. There is no staged counterpart for
    /// clearing it: the service only accepts that through a dedicated call.
    pub fn enable_compliance_lock(&mut self) {
        self.copy_flags.worm_copy = Some(1);
    }

    pub fn is_parallel_copy(&self) -> bool {
        is_set(self.copy_flags.enable_parallel_copy)
    }

    pub fn set_parallel_copy(&mut self, enabled: bool) {
        self.copy_flags.enable_parallel_copy = Some(i64::from(enabled));
    }

    pub fn is_inline_copy(&self) -> bool {
        is_set(self.copy_flags.inline_aux_copy)
    }

    pub fn set_inline_copy(&mut self, enabled: bool) {
        self.copy_flags.inline_aux_copy = Some(i64::from(enabled));
    }

    pub fn is_space_optimized_aux_copy(&self) -> bool {
        is_set(self.extended_flags.space_optimized_aux_copy)
    }

    pub fn set_space_optimized_aux_copy(&mut self, enabled: bool) {
        self.extended_flags.space_optimized_aux_copy = Some(i64::from(enabled));
    }

    pub fn overrides_pool_retention(&self) -> bool {
        is_set(self.extended_flags.override_pool_retention)
    }

    pub fn set_override_pool_retention(&mut self, enabled: bool) {
        self.extended_flags.override_pool_retention = Some(i64::from(enabled));
    }

    pub fn software_compression(&self) -> bool {
        is_set(self.extended_flags.compression_on_clients)
    }

    pub fn set_software_compression(&mut self, enabled: bool) {
        self.extended_flags.compression_on_clients = Some(i64::from(enabled));
    }

    pub fn network_throttle_bandwidth(&self) -> Option<i64> {
        self.network_throttle_bandwidth
    }

    /// Bandwidth cap in MB per hour. Zero lifts the cap.
    pub fn set_network_throttle_bandwidth(&mut self, mb_per_hour: u32) {
        self.network_throttle_bandwidth = Some(i64::from(mb_per_hour));
    }

    pub fn multiplexing_factor(&self) -> Option<u32> {
        self.media_properties.multiplexing_factor
    }

    pub fn set_multiplexing_factor(&mut self, factor: u32) {
        self.media_properties.multiplexing_factor = Some(factor);
    }

    pub fn source_copy_name(&self) -> Option<&str> {
        self.source_copy.as_ref().and_then(|s| s.copy_name.as_deref())
    }

    pub fn set_source_copy(&mut self, copy_id: CopyId, copy_name: &str) {
        let source = self.source_copy.get_or_insert_with(CopyReference::default);
        source.copy_id = Some(copy_id);
        source.copy_name = Some(copy_name.to_string());
    }

    pub fn media_agent_name(&self) -> Option<&str> {
        self.media_agent
            .as_ref()
            .and_then(|m| m.media_agent_name.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "StoragePolicyCopy": {"copyId": 21, "copyName": "copy2", "storagePolicyId": 5, "_type_": 18},
            "copyPrecedence": 2,
            "active": 1,
            "retentionRules": {
                "retainBackupDataForDays": 30,
                "retainBackupDataForCycles": 1,
                "retainArchiverDataForDays": -1,
                "retentionFlags": {"jobBasedRetention": 0, "enableDataAging": 1},
                "extendedRetentionRuleOne": {"isEnabled": 1, "rule": 8, "endDays": 90, "graceDays": 0}
            },
            "dedupeFlags": {"enableDeduplication": 1, "enableDASHFull": 1, "useDDBPrimingOption": 0},
            "copyFlags": {"wormCopy": 0, "auxCopyReencryptData": 0},
            "extendedFlags": {"overRideGACPRetention": 1},
            "mediaProperties": {"multiplexingFactor": 2, "spareMediaGroup": 9},
            "throttleNetworkBandWidthMBHR": 500,
            "mediaAgent": {"mediaAgentName": "ma1", "mediaAgentId": 4},
            "dataPathConfiguration": {"roundRobin": 1}
        })
    }

    #[test]
    fn test_parse_known_fields() {
        let props = CopyProperties::from_value(document()).unwrap();
        assert_eq!(props.identity.copy_id, Some(CopyId::new(21)));
        assert_eq!(props.copy_precedence, Some(2));
        assert!(props.is_active());
        assert_eq!(props.retention_rules.retain_backup_data_for_days, Some(30));
        assert_eq!(props.dedupe_flags.enable_dash_full, Some(1));
        assert!(props.overrides_pool_retention());
        assert_eq!(props.multiplexing_factor(), Some(2));
        assert_eq!(props.network_throttle_bandwidth(), Some(500));
        assert_eq!(props.media_agent_name(), Some("ma1"));
        assert!(!props.is_compliance_lock_enabled());
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let original = document();
        let props = CopyProperties::from_value(original.clone()).unwrap();
        let back = props.to_value().unwrap();

        assert_eq!(back["dataPathConfiguration"], json!({"roundRobin": 1}));
        assert_eq!(back["StoragePolicyCopy"]["_type_"], json!(18));
        assert_eq!(back["retentionRules"]["retentionFlags"]["enableDataAging"], json!(1));
        assert_eq!(back["mediaProperties"]["spareMediaGroup"], json!(9));
        assert_eq!(back["mediaAgent"]["mediaAgentId"], json!(4));
        assert_eq!(back, original);
    }

    #[test]
    fn test_absent_blocks_stay_absent() {
        let props = CopyProperties::from_value(json!({"StoragePolicyCopy": {"copyId": 1}})).unwrap();
        let back = props.to_value().unwrap();
        assert!(back.get("dedupeFlags").is_none());
        assert!(back.get("dataEncryption").is_none());
        assert!(back.get("retentionRules").is_none());
    }

    #[test]
    fn test_simple_toggles() {
        let mut props = CopyProperties::default();
        props.set_parallel_copy(true);
        props.set_inline_copy(true);
        props.set_space_optimized_aux_copy(true);
        props.set_software_compression(false);
        props.set_network_throttle_bandwidth(250);
        props.set_source_copy(CopyId::new(3), "Primary");
        props.enable_compliance_lock();

        assert!(props.is_parallel_copy());
        assert!(props.is_inline_copy());
        assert!(props.is_space_optimized_aux_copy());
        assert!(!props.software_compression());
        assert_eq!(props.network_throttle_bandwidth(), Some(250));
        assert_eq!(props.source_copy_name(), Some("Primary"));
        assert!(props.is_compliance_lock_enabled());

        let value = props.to_value().unwrap();
        assert_eq!(value["sourceCopy"], json!({"copyId": 3, "copyName": "Primary"}));
        assert_eq!(value["copyFlags"]["wormCopy"], json!(1));
    }
}
