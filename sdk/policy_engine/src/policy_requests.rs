//! # Policy Creation Requests
//!
//! Request bodies for creating standard (disk), global and tape-backed
//! storage policies. Each builder validates its input and resolves entity
//! references before producing JSON, so a rejected spec never reaches the
//! network.

use serde_json::{json, Map, Value};

use crate::error::{require_non_empty, ValidationError};
use crate::names::EntityRef;

/// Default retention, in days, for a standard policy's primary copy.
pub const DEFAULT_RETENTION_DAYS: u32 = 5;
/// Default retention, in days, for a tape-backed policy.
pub const DEFAULT_TAPE_RETENTION_DAYS: u32 = 15;
/// Copy name the service expects for the primary copy of a global policy.
pub const GLOBAL_PRIMARY_COPY: &str = "Primary_Global";

const SNAP_LIBRARY_PLACEHOLDER: &str = "Use primary copy's library and mediaAgent";

const DISK_FREE_THRESHOLD_MB: u32 = 5120;
const DISK_FREE_WARNING_THRESHOLD_MB: u32 = 10240;

/// Dedup store for a standard policy. Without a media agent the store is
/// hosted on the data path's media agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupStoreSpec {
    pub path: String,
    pub media_agent: Option<EntityRef>,
}

/// Where a new standard policy writes its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDataPath {
    /// Own library and media agent, optionally with a dedup store.
    Library {
        library: EntityRef,
        media_agent: EntityRef,
        dedup_store: Option<DedupStoreSpec>,
    },
    /// Dependent on a global policy that hosts a dedup pool. A WORM-locked
    /// pool forbids overriding its retention.
    GlobalDedupe { global_policy: String, worm_locked: bool },
    /// Dependent on a global policy without deduplication.
    Global { global_policy: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardPolicySpec {
    pub data_path: PolicyDataPath,
    pub retention_days: u32,
    pub number_of_streams: Option<u32>,
    pub incremental_policy: Option<String>,
    pub ocum_server: Option<String>,
    pub disaster_recovery: bool,
}

impl StandardPolicySpec {
    pub fn new(data_path: PolicyDataPath) -> Self {
        StandardPolicySpec {
            data_path,
            retention_days: DEFAULT_RETENTION_DAYS,
            number_of_streams: None,
            incremental_policy: None,
            ocum_server: None,
            disaster_recovery: false,
        }
    }

    pub fn on_library(library: impl Into<EntityRef>, media_agent: impl Into<EntityRef>) -> Self {
        Self::new(PolicyDataPath::Library {
            library: library.into(),
            media_agent: media_agent.into(),
            dedup_store: None,
        })
    }

    /// Adds a dedup store; ignored for data paths dependent on a global policy.
    #[must_use]
    pub fn with_dedup_store(mut self, path: &str, media_agent: Option<EntityRef>) -> Self {
        if let PolicyDataPath::Library { dedup_store, .. } = &mut self.data_path {
            *dedup_store = Some(DedupStoreSpec {
                path: path.to_string(),
                media_agent,
            });
        }
        self
    }

    #[must_use]
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    #[must_use]
    pub fn with_streams(mut self, streams: u32) -> Self {
        self.number_of_streams = Some(streams);
        self
    }

    #[must_use]
    pub fn with_incremental_policy(mut self, name: &str) -> Self {
        self.incremental_policy = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn with_ocum_server(mut self, server: &str) -> Self {
        self.ocum_server = Some(server.to_string());
        self
    }

    #[must_use]
    pub fn disaster_recovery(mut self) -> Self {
        self.disaster_recovery = true;
        self
    }

    pub fn build_request(&self, policy_name: &str) -> Result<Value, ValidationError> {
        require_non_empty("storage policy name", policy_name)?;
        let retention = json!({ "retainBackupDataForDays": self.retention_days });

        let mut request = match &self.data_path {
            PolicyDataPath::Library {
                library,
                media_agent,
                dedup_store,
            } => {
                let library = library.resolve("library")?;
                let media_agent = media_agent.resolve("media agent")?;
                let mut copy_info = json!({
                    "library": library.to_json("libraryId", "libraryName"),
                    "mediaAgent": media_agent.to_json("mediaAgentId", "mediaAgentName"),
                    "retentionRules": retention,
                });
                if let Some(store) = dedup_store {
                    require_non_empty("dedup path", &store.path)?;
                    let store_agent = match &store.media_agent {
                        Some(agent) => agent.resolve("dedup media agent")?,
                        None => media_agent.clone(),
                    };
                    copy_info["dedupeFlags"] = json!({ "enableDeduplication": 1 });
                    copy_info["DDBPartitionInfo"] = json!({
                        "maInfoList": [{
                            "mediaAgent": { "mediaAgentName": store_agent.label() },
                            "subStoreList": [{ "accessPath": { "path": store.path } }]
                        }]
                    });
                }
                json!({
                    "storagePolicyName": policy_name,
                    "type": if self.disaster_recovery { 2 } else { 1 },
                    "storagePolicyCopyInfo": copy_info,
                })
            }
            PolicyDataPath::GlobalDedupe {
                global_policy,
                worm_locked,
            } => {
                require_non_empty("global policy name", global_policy)?;
                json!({
                    "storagePolicyName": policy_name,
                    "storagePolicyCopyInfo": {
                        "useGlobalPolicy": { "storagePolicyName": global_policy },
                        "retentionRules": retention,
                        "dedupeFlags": {
                            "useGlobalDedupStore": 1,
                            "enableClientSideDedup": 1,
                            "enableDASHFull": 1,
                            "enableDeduplication": 1
                        },
                        "extendedFlags": {
                            "overRideGACPRetention": if *worm_locked { "SET_FALSE" } else { "SET_TRUE" }
                        }
                    }
                })
            }
            PolicyDataPath::Global { global_policy } => {
                require_non_empty("global policy name", global_policy)?;
                json!({
                    "storagePolicyName": policy_name,
                    "storagePolicyCopyInfo": {
                        "dedupeFlags": { "enableDASHFull": 1 },
                        "retentionRules": retention,
                        "extendedFlags": { "useGlobalStoragePolicy": 1 },
                        "useGlobalPolicy": { "storagePolicyName": global_policy }
                    }
                })
            }
        };

        if let Some(streams) = self.number_of_streams {
            request["numberOfStreams"] = json!(streams);
        }
        if let Some(server) = &self.ocum_server {
            apply_ocum_server(&mut request, server)?;
        }
        if let Some(incremental) = &self.incremental_policy {
            require_non_empty("incremental policy name", incremental)?;
            request["incrementalStoragePolicy"] = json!({ "storagePolicyName": incremental });
        }
        Ok(request)
    }
}

fn apply_ocum_server(request: &mut Value, server: &str) -> Result<(), ValidationError> {
    require_non_empty("OCUM server", server)?;
    request["dfmServer"] = json!({ "name": server, "id": 0 });
    let copy_info = &mut request["storagePolicyCopyInfo"];
    copy_info["snapLibrary"] = json!({ "libraryName": SNAP_LIBRARY_PLACEHOLDER });
    copy_info["storagePolicyFlags"] = json!({ "enableSnapshot": 1 });
    Ok(())
}

// ============================================================================
// GLOBAL POLICY
// ============================================================================

/// Dedup store hosted by a global policy; both parts are required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalDedupStore {
    pub path: String,
    pub media_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalPolicySpec {
    pub library: String,
    pub media_agent: String,
    pub dedup_store: Option<GlobalDedupStore>,
}

impl GlobalPolicySpec {
    pub fn new(library: &str, media_agent: &str) -> Self {
        GlobalPolicySpec {
            library: library.to_string(),
            media_agent: media_agent.to_string(),
            dedup_store: None,
        }
    }

    #[must_use]
    pub fn with_dedup_store(mut self, path: &str, media_agent: &str) -> Self {
        self.dedup_store = Some(GlobalDedupStore {
            path: path.to_string(),
            media_agent: media_agent.to_string(),
        });
        self
    }

    pub fn build_request(&self, policy_name: &str) -> Result<Value, ValidationError> {
        require_non_empty("global policy name", policy_name)?;
        require_non_empty("library", &self.library)?;
        require_non_empty("media agent", &self.media_agent)?;

        let mut copy_info = Map::new();
        copy_info.insert("library".into(), json!({ "libraryName": self.library }));
        copy_info.insert("mediaAgent".into(), json!({ "mediaAgentName": self.media_agent }));
        copy_info.insert(
            "retentionRules".into(),
            json!({
                "retainArchiverDataForDays": -1,
                "retainBackupDataForCycles": -1,
                "retainBackupDataForDays": -1
            }),
        );

        match &self.dedup_store {
            Some(store) => {
                require_non_empty("dedup path", &store.path)?;
                require_non_empty("dedup media agent", &store.media_agent)?;
                copy_info.insert(
                    "dedupeFlags".into(),
                    json!({ "enableDASHFull": 1, "hostGlobalDedupStore": 1, "enableDeduplication": 1 }),
                );
                copy_info.insert(
                    "storagePolicyFlags".into(),
                    json!({ "blockLevelDedup": 1, "enableGlobalDeduplication": 1 }),
                );
                copy_info.insert(
                    "DDBPartitionInfo".into(),
                    json!({
                        "maInfoList": [{
                            "mediaAgent": { "mediaAgentName": store.media_agent },
                            "subStoreList": [{
                                "diskFreeWarningThreshholdMB": DISK_FREE_WARNING_THRESHOLD_MB,
                                "diskFreeThresholdMB": DISK_FREE_THRESHOLD_MB,
                                "accessPath": { "path": store.path }
                            }]
                        }]
                    }),
                );
            }
            None => {
                copy_info.insert("storagePolicyFlags".into(), json!({ "globalStoragePolicy": 1 }));
                copy_info.insert("extendedFlags".into(), json!({ "globalStoragePolicy": 1 }));
            }
        }

        Ok(json!({
            "storagePolicyName": policy_name,
            "copyName": GLOBAL_PRIMARY_COPY,
            "storagePolicyCopyInfo": Value::Object(copy_info),
        }))
    }
}

// ============================================================================
// TAPE POLICY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapePolicySpec {
    pub library: String,
    pub media_agent: String,
    pub drive_pool: String,
    pub scratch_pool: String,
    pub retention_days: u32,
    pub ocum_server: Option<String>,
}

impl TapePolicySpec {
    pub fn new(library: &str, media_agent: &str, drive_pool: &str, scratch_pool: &str) -> Self {
        TapePolicySpec {
            library: library.to_string(),
            media_agent: media_agent.to_string(),
            drive_pool: drive_pool.to_string(),
            scratch_pool: scratch_pool.to_string(),
            retention_days: DEFAULT_TAPE_RETENTION_DAYS,
            ocum_server: None,
        }
    }

    #[must_use]
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    #[must_use]
    pub fn with_ocum_server(mut self, server: &str) -> Self {
        self.ocum_server = Some(server.to_string());
        self
    }

    pub fn build_request(&self, policy_name: &str) -> Result<Value, ValidationError> {
        require_non_empty("storage policy name", policy_name)?;
        require_non_empty("library", &self.library)?;
        require_non_empty("media agent", &self.media_agent)?;
        require_non_empty("drive pool", &self.drive_pool)?;
        require_non_empty("scratch pool", &self.scratch_pool)?;

        let mut request = json!({
            "storagePolicyName": policy_name,
            "drivePool": self.drive_pool,
            "scratchpool": self.scratch_pool,
            "storagePolicyCopyInfo": {
                "retentionRules": { "retainBackupDataForDays": self.retention_days },
                "library": { "libraryName": self.library },
                "mediaAgent": { "mediaAgentName": self.media_agent }
            }
        });
        if let Some(server) = &self.ocum_server {
            apply_ocum_server(&mut request, server)?;
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_policy_with_ids() {
        let request = StandardPolicySpec::on_library(3u64, 9u64)
            .with_retention_days(10)
            .build_request("gold")
            .unwrap();
        assert_eq!(
            request,
            json!({
                "storagePolicyName": "gold",
                "type": 1,
                "storagePolicyCopyInfo": {
                    "library": { "libraryId": 3 },
                    "mediaAgent": { "mediaAgentId": 9 },
                    "retentionRules": { "retainBackupDataForDays": 10 }
                }
            })
        );
    }

    #[test]
    fn test_dedup_store_defaults_to_data_media_agent() {
        let request = StandardPolicySpec::on_library("lib1", "ma1")
            .with_dedup_store("/ddb", None)
            .build_request("gold")
            .unwrap();
        let copy_info = &request["storagePolicyCopyInfo"];
        assert_eq!(copy_info["dedupeFlags"]["enableDeduplication"], 1);
        assert_eq!(
            copy_info["DDBPartitionInfo"]["maInfoList"][0]["mediaAgent"]["mediaAgentName"],
            "ma1"
        );
        assert_eq!(
            copy_info["DDBPartitionInfo"]["maInfoList"][0]["subStoreList"][0]["accessPath"]["path"],
            "/ddb"
        );
    }

    #[test]
    fn test_dr_policy_type_and_extras() {
        let request = StandardPolicySpec::on_library("lib1", "ma1")
            .disaster_recovery()
            .with_streams(4)
            .with_incremental_policy("inc_sp")
            .with_ocum_server("ocum1")
            .build_request("dr")
            .unwrap();
        assert_eq!(request["type"], 2);
        assert_eq!(request["numberOfStreams"], 4);
        assert_eq!(request["incrementalStoragePolicy"]["storagePolicyName"], "inc_sp");
        assert_eq!(request["dfmServer"], json!({ "name": "ocum1", "id": 0 }));
        assert_eq!(
            request["storagePolicyCopyInfo"]["storagePolicyFlags"]["enableSnapshot"],
            1
        );
    }

    #[test]
    fn test_global_dedupe_dependent() {
        let spec = StandardPolicySpec::new(PolicyDataPath::GlobalDedupe {
            global_policy: "gdsp".into(),
            worm_locked: true,
        });
        let request = spec.build_request("dep").unwrap();
        assert!(request.get("type").is_none());
        let copy_info = &request["storagePolicyCopyInfo"];
        assert_eq!(copy_info["useGlobalPolicy"]["storagePolicyName"], "gdsp");
        assert_eq!(copy_info["dedupeFlags"]["useGlobalDedupStore"], 1);
        assert_eq!(copy_info["extendedFlags"]["overRideGACPRetention"], "SET_FALSE");
        assert_eq!(copy_info["retentionRules"]["retainBackupDataForDays"], 5);
    }

    #[test]
    fn test_global_non_dedupe_dependent() {
        let spec = StandardPolicySpec::new(PolicyDataPath::Global {
            global_policy: "gsp".into(),
        });
        let request = spec.build_request("dep").unwrap();
        assert_eq!(
            request["storagePolicyCopyInfo"]["extendedFlags"],
            json!({ "useGlobalStoragePolicy": 1 })
        );
    }

    #[test]
    fn test_blank_inputs_rejected() {
        assert!(StandardPolicySpec::on_library("lib1", "ma1").build_request(" ").is_err());
        assert!(StandardPolicySpec::on_library("", "ma1").build_request("gold").is_err());
        assert!(StandardPolicySpec::on_library("lib1", "ma1")
            .with_dedup_store("", None)
            .build_request("gold")
            .is_err());
    }

    #[test]
    fn test_global_policy_shapes() {
        let plain = GlobalPolicySpec::new("lib1", "ma1").build_request("g1").unwrap();
        assert_eq!(plain["copyName"], GLOBAL_PRIMARY_COPY);
        assert_eq!(plain["storagePolicyCopyInfo"]["extendedFlags"]["globalStoragePolicy"], 1);
        assert_eq!(plain["storagePolicyCopyInfo"]["retentionRules"]["retainBackupDataForDays"], -1);

        let dedup = GlobalPolicySpec::new("lib1", "ma1")
            .with_dedup_store("/gddb", "ma2")
            .build_request("g2")
            .unwrap();
        let copy_info = &dedup["storagePolicyCopyInfo"];
        assert_eq!(copy_info["dedupeFlags"]["hostGlobalDedupStore"], 1);
        assert_eq!(copy_info["storagePolicyFlags"]["enableGlobalDeduplication"], 1);
        let store = &copy_info["DDBPartitionInfo"]["maInfoList"][0];
        assert_eq!(store["mediaAgent"]["mediaAgentName"], "ma2");
        assert_eq!(store["subStoreList"][0]["diskFreeThresholdMB"], 5120);
        assert!(copy_info.get("extendedFlags").is_none());
    }

    #[test]
    fn test_tape_policy() {
        let request = TapePolicySpec::new("tlib", "ma1", "dp1", "scratch1")
            .build_request("tape_sp")
            .unwrap();
        assert_eq!(request["drivePool"], "dp1");
        assert_eq!(request["scratchpool"], "scratch1");
        assert_eq!(request["storagePolicyCopyInfo"]["retentionRules"]["retainBackupDataForDays"], 15);
        assert!(request.get("dfmServer").is_none());

        assert!(TapePolicySpec::new("tlib", "ma1", "", "scratch1").build_request("t").is_err());
    }
}
