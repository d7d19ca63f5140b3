//! # Policy Registry
//!
//! Case-insensitive index of every storage policy the service knows about.
//! The index is filled by [`PolicyRegistry::refresh`] and re-fetched whole
//! after every create or delete; lookups never touch the network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::info;
use parking_lot::RwLock;
use serde_json::Value;

use policy_engine::wire::as_u64;
use policy_engine::{
    GlobalPolicySpec, NameKey, PolicyId, StandardPolicySpec, TapePolicySpec, ValidationError,
};

use crate::config::ClientConfig;
use crate::endpoints;
use crate::envelope::{decode, expect_deleted, expect_success};
use crate::error::SdkResult;
use crate::policy::Policy;
use crate::transport::{ApiRequest, Transport};

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Statistics about a registry refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshStats {
    /// Number of policies in the index after the refresh
    pub policies_loaded: usize,
    /// Duration of the refresh in milliseconds
    pub duration_ms: u64,
    /// Completion time, milliseconds since the epoch
    pub timestamp: u64,
}

/// One indexed policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEntry {
    pub id: PolicyId,
    /// Name as the service spells it.
    pub name: String,
}

pub struct PolicyRegistry<T: Transport> {
    transport: Arc<T>,
    config: Arc<ClientConfig>,
    policies: RwLock<HashMap<NameKey, PolicyEntry>>,
}

impl<T: Transport> PolicyRegistry<T> {
    /// Creates a registry with an empty index. Call [`Self::refresh`] before
    /// looking anything up.
    pub fn new(transport: Arc<T>, config: Arc<ClientConfig>) -> Self {
        Self {
            transport,
            config,
            policies: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry and loads the index.
    pub async fn connect(transport: T, config: ClientConfig) -> SdkResult<Self> {
        let registry = Self::new(Arc::new(transport), Arc::new(config));
        registry.refresh().await?;
        Ok(registry)
    }

    pub async fn refresh(&self) -> SdkResult<RefreshStats> {
        let start = now_ms();
        let request = ApiRequest::get(endpoints::POLICIES).with_query("getAll", "TRUE");
        let response = self.transport.execute(request).await?;
        let body = decode("list storage policies", &response)?;

        let index: HashMap<NameKey, PolicyEntry> = body
            .get("policies")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(parse_entry).collect())
            .unwrap_or_default();
        let policies_loaded = index.len();
        *self.policies.write() = index;

        let stats = RefreshStats {
            policies_loaded,
            duration_ms: now_ms().saturating_sub(start),
            timestamp: now_ms(),
        };
        info!(
            "Policy registry refreshed: {} policies in {}ms",
            stats.policies_loaded, stats.duration_ms
        );
        Ok(stats)
    }

    /// Cached, case-insensitive. Never calls the service.
    pub fn has_policy(&self, name: &str) -> bool {
        self.policies.read().contains_key(&NameKey::new(name))
    }

    pub fn policy_id(&self, name: &str) -> Option<PolicyId> {
        self.policies.read().get(&NameKey::new(name)).map(|e| e.id)
    }

    /// Snapshot of the index ordered by name.
    pub fn all_policies(&self) -> Vec<PolicyEntry> {
        let mut entries: Vec<PolicyEntry> = self.policies.read().values().cloned().collect();
        entries.sort_by(|a, b| NameKey::new(&a.name).cmp(&NameKey::new(&b.name)));
        entries
    }

    fn entry(&self, name: &str) -> Result<PolicyEntry, ValidationError> {
        self.policies
            .read()
            .get(&NameKey::new(name))
            .cloned()
            .ok_or_else(|| ValidationError::PolicyNotFound(name.to_string()))
    }

    /// Opens a policy handle, fetching its copies.
    pub async fn get(&self, name: &str) -> SdkResult<Policy<T>> {
        let entry = self.entry(name)?;
        Policy::load(
            self.transport.clone(),
            self.config.clone(),
            entry.id,
            &entry.name,
        )
        .await
    }

    /// Creates a disk policy, or one dependent on a global policy.
    pub async fn add(&self, name: &str, spec: &StandardPolicySpec) -> SdkResult<Policy<T>> {
        self.ensure_absent(name)?;
        let body = spec.build_request(name)?;
        self.create(name, body).await
    }

    /// Creates a global (shared) policy other policies can depend on.
    pub async fn add_global(&self, name: &str, spec: &GlobalPolicySpec) -> SdkResult<Policy<T>> {
        self.ensure_absent(name)?;
        let body = spec.build_request(name)?;
        self.create(name, body).await
    }

    pub async fn add_tape(&self, name: &str, spec: &TapePolicySpec) -> SdkResult<Policy<T>> {
        self.ensure_absent(name)?;
        let body = spec.build_request(name)?;
        self.create(name, body).await
    }

    fn ensure_absent(&self, name: &str) -> Result<(), ValidationError> {
        if self.has_policy(name) {
            return Err(ValidationError::PolicyAlreadyExists(name.to_string()));
        }
        Ok(())
    }

    async fn create(&self, name: &str, body: Value) -> SdkResult<Policy<T>> {
        let response = self
            .transport
            .execute(ApiRequest::post(endpoints::POLICIES, body))
            .await?;
        expect_success("create storage policy", &response)?;
        info!("Created storage policy {}", name);

        self.refresh().await?;
        self.get(name).await
    }

    pub async fn delete(&self, name: &str) -> SdkResult<()> {
        let entry = self.entry(name)?;
        let response = self
            .transport
            .execute(ApiRequest::delete(endpoints::policy(entry.id)))
            .await?;
        expect_deleted("delete storage policy", &response)?;
        info!("Deleted storage policy {}", entry.name);

        self.refresh().await?;
        Ok(())
    }
}

fn parse_entry(entry: &Value) -> Option<(NameKey, PolicyEntry)> {
    let name = entry.get("storagePolicyName")?.as_str()?;
    let id = as_u64(entry.get("storagePolicyId")?)?;
    Some((
        NameKey::new(name),
        PolicyEntry {
            id: PolicyId::new(id),
            name: name.to_string(),
        },
    ))
}
