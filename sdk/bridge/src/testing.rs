//! In-memory stand-in for the backup service.
//!
//! Keeps policies and full copy documents, applies writes so read-after-write
//! checks see real state, and records every request for assertions.

use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;
use serde_json::{json, Value};

use policy_engine::wire::as_u64;

use crate::endpoints;
use crate::error::RemoteError;
use crate::transport::{ApiRequest, ApiResponse, Method, Transport};

pub(crate) const GOLD_ID: u64 = 11;
pub(crate) const DEPENDENT_ID: u64 = 12;

struct FakePolicy {
    name: String,
    description: String,
    streams: u64,
    copies: Vec<Value>,
}

#[derive(Default)]
struct State {
    policies: BTreeMap<u64, FakePolicy>,
    next_policy_id: u64,
    next_copy_id: u64,
    requests: Vec<ApiRequest>,
    scripted: VecDeque<(String, ApiResponse)>,
    ignore_worm: bool,
}

pub(crate) struct FakeService {
    state: Mutex<State>,
}

fn copy_doc(policy_id: u64, policy_name: &str, copy_id: u64, name: &str, precedence: u64) -> Value {
    json!({
        "StoragePolicyCopy": {
            "copyId": copy_id,
            "copyName": name,
            "storagePolicyId": policy_id,
            "storagePolicyName": policy_name
        },
        "copyPrecedence": precedence,
        "copyType": 0,
        "isDefault": 0,
        "isSnapCopy": 0,
        "active": 1,
        "library": { "libraryName": "lib1" },
        "mediaAgent": { "mediaAgentName": "ma1" },
        "retentionRules": {
            "retainBackupDataForDays": 30,
            "retainBackupDataForCycles": 1,
            "retainArchiverDataForDays": -1,
            "retentionFlags": { "jobBasedRetention": 0 }
        },
        "dedupeFlags": { "enableDeduplication": 0 },
        "copyFlags": { "wormCopy": 0 },
        "extendedFlags": {},
        "mediaProperties": { "multiplexingFactor": 1 },
        "unmodelledSetting": { "keep": "me" }
    })
}

impl FakeService {
    pub(crate) fn empty() -> Self {
        FakeService {
            state: Mutex::new(State {
                next_policy_id: 100,
                next_copy_id: 500,
                ..State::default()
            }),
        }
    }

    /// Policy `gold` (primary, `copy2` and two snap copies) and policy
    /// `dependent` whose primary writes into a global dedup store.
    pub(crate) fn seeded() -> Self {
        let service = Self::empty();
        {
            let mut state = service.state.lock();

            let mut primary = copy_doc(GOLD_ID, "gold", 21, "Primary", 1);
            primary["isDefault"] = json!(1);
            primary["retentionRules"]["retainBackupDataForDays"] = json!(14);
            primary["retentionRules"]["retainBackupDataForCycles"] = json!(2);
            primary["retentionRules"]["retainArchiverDataForDays"] = json!(90);
            primary["dedupeFlags"] = json!({
                "enableDeduplication": 1,
                "enableDASHFull": 1,
                "enableSourceSideDiskCache": 1,
                "useGlobalDedupStore": 0
            });
            let copy2 = copy_doc(GOLD_ID, "gold", 22, "copy2", 2);
            let mut snap1 = copy_doc(GOLD_ID, "gold", 23, "snap1", 3);
            snap1["isSnapCopy"] = json!(1);
            let mut snap2 = copy_doc(GOLD_ID, "gold", 24, "snap2", 4);
            snap2["isSnapCopy"] = json!(1);
            state.policies.insert(
                GOLD_ID,
                FakePolicy {
                    name: "gold".to_string(),
                    description: "tier one".to_string(),
                    streams: 50,
                    copies: vec![primary, copy2, snap1, snap2],
                },
            );

            let mut dependent_primary = copy_doc(DEPENDENT_ID, "dependent", 31, "Primary", 1);
            dependent_primary["isDefault"] = json!(1);
            dependent_primary["dedupeFlags"] = json!({
                "enableDeduplication": 1,
                "useGlobalDedupStore": 1
            });
            state.policies.insert(
                DEPENDENT_ID,
                FakePolicy {
                    name: "dependent".to_string(),
                    description: String::new(),
                    streams: 50,
                    copies: vec![dependent_primary],
                },
            );
        }
        service
    }

    /// Queues a canned response for the next request to `path`.
    pub(crate) fn respond_once(&self, path: &str, status: u16, text: &str) {
        self.state
            .lock()
            .scripted
            .push_back((path.to_string(), ApiResponse::new(status, text)));
    }

    /// When set, writes to the compliance lock flag are silently dropped.
    pub(crate) fn ignore_worm_changes(&self, ignore: bool) {
        self.state.lock().ignore_worm = ignore;
    }

    pub(crate) fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().requests.clone()
    }

    pub(crate) fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    pub(crate) fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    /// Stored document of one copy.
    pub(crate) fn stored_copy(&self, policy_id: u64, copy_name: &str) -> Option<Value> {
        let state = self.state.lock();
        state
            .policies
            .get(&policy_id)?
            .copies
            .iter()
            .find(|c| c["StoragePolicyCopy"]["copyName"].as_str() == Some(copy_name))
            .cloned()
    }

    pub(crate) fn stored_streams(&self, policy_id: u64) -> Option<u64> {
        self.state.lock().policies.get(&policy_id).map(|p| p.streams)
    }

    fn handle(&self, request: ApiRequest) -> ApiResponse {
        let mut state = self.state.lock();
        state.requests.push(request.clone());

        if let Some(pos) = state.scripted.iter().position(|(p, _)| *p == request.path) {
            if let Some((_, response)) = state.scripted.remove(pos) {
                return response;
            }
        }

        let segments: Vec<&str> = request.path.split('/').collect();
        match (request.method, segments.as_slice()) {
            (Method::Get, [p]) if *p == endpoints::POLICIES => {
                let policies: Vec<Value> = state
                    .policies
                    .iter()
                    .map(|(id, p)| json!({ "storagePolicyName": p.name, "storagePolicyId": id }))
                    .collect();
                ok(json!({ "policies": policies }))
            }
            (Method::Post, [p]) if *p == endpoints::POLICIES => state.create_policy(&request),
            (Method::Get, ["V2", "StoragePolicy", id]) => state.policy_properties(id, &request),
            (Method::Put, ["V2", "StoragePolicy", id]) => {
                let streams = request
                    .body
                    .as_ref()
                    .and_then(|b| b.get("numberOfStreams"))
                    .and_then(as_u64);
                match (parse_id(id).and_then(|id| state.policies.get_mut(&id)), streams) {
                    (Some(policy), Some(streams)) => {
                        policy.streams = streams;
                        ok(json!({ "error": { "errorCode": 0 } }))
                    }
                    _ => ok(json!({ "error": { "errorCode": 1, "errorMessage": "bad policy edit" } })),
                }
            }
            (Method::Delete, ["V2", "StoragePolicy", id]) => {
                match parse_id(id).and_then(|id| state.policies.remove(&id)) {
                    Some(_) => ApiResponse::new(200, "Storage policy deleted"),
                    None => ok(json!({ "error": { "errorCode": 2, "errorMessage": "no such policy" } })),
                }
            }
            (Method::Get, ["V2", "StoragePolicy", p, "Copy", c]) => match state.find_copy(p, c) {
                Some(doc) => ok(json!({ "copy": doc.clone() })),
                None => ApiResponse::new(404, "copy not found"),
            },
            (Method::Put, ["V2", "StoragePolicy", p, "Copy", c]) => state.update_copy(p, c, &request),
            (Method::Post, ["V2", "StoragePolicy", p, "Copy", c, "DisableComplianceLock"]) => {
                let ignore = state.ignore_worm;
                match state.find_copy_mut(p, c) {
                    Some(doc) => {
                        if !ignore {
                            doc["copyFlags"]["wormCopy"] = json!(0);
                        }
                        ok(json!({ "genericError": { "errorCode": 0 } }))
                    }
                    None => ApiResponse::new(404, ""),
                }
            }
            (Method::Post, _) if request.path == endpoints::CREATE_COPY => state.create_copy(&request),
            (Method::Post, _) if request.path == endpoints::DELETE_COPY => state.delete_copy(&request),
            (Method::Post, [p]) if *p == endpoints::EXECUTE_QSCRIPT => {
                ApiResponse::new(200, "Operation completed successfully")
            }
            (Method::Post, [p]) if *p == endpoints::EXECUTE_QCOMMAND => qcommand(&request),
            (Method::Post, [p]) if *p == endpoints::CREATE_TASK => ok(json!({ "jobIds": ["9001"] })),
            (Method::Post, _) if request.path == endpoints::JOB_OPERATIONS => {
                ok(json!({ "errorCode": 0 }))
            }
            _ => ApiResponse::new(404, format!("no route for {}", request.path)),
        }
    }
}

impl Transport for FakeService {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, RemoteError> {
        Ok(self.handle(request))
    }
}

fn ok(body: Value) -> ApiResponse {
    ApiResponse::ok_json(&body)
}

fn parse_id(segment: &str) -> Option<u64> {
    segment.parse().ok()
}

fn qcommand(request: &ApiRequest) -> ApiResponse {
    if request.query_value("command").is_some() {
        return ok(json!({
            "ExecScriptOutput": {
                "FieldValue": [
                    { "@JobID": "701", "@BackupLevel": "Full" },
                    { "@JobID": "702", "@BackupLevel": "Incremental" }
                ]
            }
        }));
    }
    let body = request.body.clone().unwrap_or(Value::Null);
    if body.get("EVGui_StoragePolicySummaryReq").is_some() {
        return ok(json!({
            "options": {
                "dedupOptions": {
                    "storeCreationSize": 1024,
                    "storeCreationDays": 30,
                    "storeCreationMonths": 0
                }
            }
        }));
    }
    ok(json!({ "errorCode": 0 }))
}

impl State {
    fn create_policy(&mut self, request: &ApiRequest) -> ApiResponse {
        let body = request.body.clone().unwrap_or(Value::Null);
        let Some(name) = body["storagePolicyName"].as_str().map(str::to_string) else {
            return ok(json!({ "error": { "errorCode": 1, "errorMessage": "name required" } }));
        };
        let id = self.next_policy_id;
        self.next_policy_id += 1;
        let copy_id = self.next_copy_id;
        self.next_copy_id += 1;

        let mut primary = copy_doc(id, &name, copy_id, "Primary", 1);
        primary["isDefault"] = json!(1);
        self.policies.insert(
            id,
            FakePolicy {
                name,
                description: String::new(),
                streams: body["numberOfStreams"].as_u64().unwrap_or(50),
                copies: vec![primary],
            },
        );
        ok(json!({ "error": { "errorCode": 0 } }))
    }

    fn policy_properties(&self, id: &str, request: &ApiRequest) -> ApiResponse {
        let Some(policy) = parse_id(id).and_then(|id| self.policies.get(&id)) else {
            return ApiResponse::new(404, "policy not found");
        };
        if request.query_value("propertyLevel") == Some(endpoints::ADVANCED_PROPERTY_LEVEL) {
            return ok(json!({
                "policies": [{ "description": policy.description, "numberOfStreams": policy.streams }]
            }));
        }
        ok(json!({ "copy": policy.copies }))
    }

    fn find_copy(&self, policy: &str, copy: &str) -> Option<&Value> {
        let copy_id = parse_id(copy)?;
        self.policies
            .get(&parse_id(policy)?)?
            .copies
            .iter()
            .find(|c| as_u64(&c["StoragePolicyCopy"]["copyId"]) == Some(copy_id))
    }

    fn find_copy_mut(&mut self, policy: &str, copy: &str) -> Option<&mut Value> {
        let copy_id = parse_id(copy)?;
        self.policies
            .get_mut(&parse_id(policy)?)?
            .copies
            .iter_mut()
            .find(|c| as_u64(&c["StoragePolicyCopy"]["copyId"]) == Some(copy_id))
    }

    fn update_copy(&mut self, policy: &str, copy: &str, request: &ApiRequest) -> ApiResponse {
        let ignore_worm = self.ignore_worm;
        let body = request.body.clone().unwrap_or(Value::Null);
        let Some(doc) = self.find_copy_mut(policy, copy) else {
            return ApiResponse::new(404, "copy not found");
        };
        let Some(info) = body.get("storagePolicyCopyInfo") else {
            return ok(json!({ "response": [{ "errorCode": 1, "errorString": "missing copy info" }] }));
        };
        if info.get("dataPathProperties").is_some() {
            return ok(json!({ "error": { "errorCode": 0 } }));
        }

        let previous_worm = doc["copyFlags"]["wormCopy"].clone();
        *doc = info.clone();
        if ignore_worm {
            doc["copyFlags"]["wormCopy"] = previous_worm;
        }
        ok(json!({ "response": [{ "errorCode": 0 }] }))
    }

    fn create_copy(&mut self, request: &ApiRequest) -> ApiResponse {
        let body = request.body.clone().unwrap_or(Value::Null);
        let info = &body["storagePolicyCopyInfo"];
        let Some(name) = body["copyName"].as_str() else {
            return ok(json!({ "error": { "errorCode": 1, "errorMessage": "copy name required" } }));
        };
        let policy_name = info["StoragePolicyCopy"]["storagePolicyName"].as_str().unwrap_or_default();
        let copy_id = self.next_copy_id;
        self.next_copy_id += 1;

        let Some((policy_id, policy)) = self
            .policies
            .iter_mut()
            .find(|(_, p)| p.name.eq_ignore_ascii_case(policy_name))
        else {
            return ok(json!({ "error": { "errorCode": 3, "errorMessage": "unknown policy" } }));
        };
        let precedence = policy.copies.len() as u64 + 1;
        let mut doc = copy_doc(*policy_id, &policy.name, copy_id, name, precedence);
        for key in ["isSnapCopy", "isMirrorCopy", "copyType", "retentionRules", "dedupeFlags"] {
            if let Some(value) = info.get(key) {
                doc[key] = value.clone();
            }
        }
        policy.copies.push(doc);
        ok(json!({ "error": { "errorCode": 0 } }))
    }

    fn delete_copy(&mut self, request: &ApiRequest) -> ApiResponse {
        let body = request.body.clone().unwrap_or(Value::Null);
        let target = &body["App_DeleteStoragePolicyCopyReq"]["archiveGroupCopy"];
        let (Some(policy_id), Some(copy_id)) = (
            target.get("storagePolicyId").and_then(as_u64),
            target.get("copyId").and_then(as_u64),
        ) else {
            return ok(json!({ "error": { "errorCode": 1, "errorMessage": "copy required" } }));
        };
        match self.policies.get_mut(&policy_id) {
            Some(policy) => {
                policy
                    .copies
                    .retain(|c| as_u64(&c["StoragePolicyCopy"]["copyId"]) != Some(copy_id));
                ok(json!({ "error": { "errorCode": 0 } }))
            }
            None => ok(json!({ "error": { "errorCode": 2, "errorMessage": "no such policy" } })),
        }
    }
}
