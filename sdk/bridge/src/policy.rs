//! # Storage Policy
//!
//! Handle on one policy: its cached copy summaries, copy creation and
//! deletion, DDB maintenance, and job operations that span every copy.
//!
//! Copy summaries are fetched when the handle is opened and after every
//! operation that changes the copy set, so the read accessors are
//! synchronous. Advanced properties are fetched on first use.

use std::sync::Arc;

use log::info;
use parking_lot::RwLock;
use serde_json::{json, Value};

use policy_engine::task_requests::{
    add_ddb_partition_request, delete_job_request, mark_for_recovery_request,
    reassociate_request, reconstruction_request, seal_ddb_request, start_over_request,
    transactional_ddb_request, UNASSIGNED_POLICY,
};
use policy_engine::{
    AuxCopyOptions, CopyId, CopyIndex, CopyRequestContext, CopySpec, CopySummary,
    DataVerificationOptions, DdbMove, DdbVerification, DedupeCopySpec, EntityRef,
    GlobalDependentCopySpec, JobIds, PolicyId, ReconstructionMode, SecondaryCopySpec,
    SelectiveCopySpec, SnapCopySpec, ValidationError,
};

use crate::config::ClientConfig;
use crate::copy::StorageCopy;
use crate::endpoints;
use crate::envelope::{
    classify, decode, expect_accepted, expect_job, expect_no_failure, expect_optional_job,
    expect_success, expect_task, Envelope,
};
use crate::error::SdkResult;
use crate::job::{JobHandle, TaskOutcome};
use crate::transport::{ApiRequest, Transport};

pub struct Policy<T: Transport> {
    transport: Arc<T>,
    config: Arc<ClientConfig>,
    id: PolicyId,
    name: String,
    copies: RwLock<CopyIndex>,
    advanced: RwLock<Option<Value>>,
}

impl<T: Transport> Policy<T> {
    pub(crate) async fn load(
        transport: Arc<T>,
        config: Arc<ClientConfig>,
        id: PolicyId,
        name: &str,
    ) -> SdkResult<Self> {
        let policy = Policy {
            transport,
            config,
            id,
            name: name.to_string(),
            copies: RwLock::new(CopyIndex::default()),
            advanced: RwLock::new(None),
        };
        policy.refresh().await?;
        Ok(policy)
    }

    pub fn id(&self) -> PolicyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reloads copy summaries and drops cached advanced properties.
    pub async fn refresh(&self) -> SdkResult<()> {
        let request = ApiRequest::get(endpoints::policy(self.id))
            .with_query("propertyLevel", endpoints::POLICY_PROPERTY_LEVEL);
        let response = self.transport.execute(request).await?;
        let body = decode("get storage policy properties", &response)?;

        *self.copies.write() = CopyIndex::from_properties(&body);
        *self.advanced.write() = None;
        Ok(())
    }

    // ========================================================================
    // COPY LOOKUP
    // ========================================================================

    /// Copy summaries ordered by precedence.
    pub fn copies(&self) -> Vec<CopySummary> {
        let mut out: Vec<CopySummary> = self.copies.read().iter().cloned().collect();
        out.sort_by_key(|c| (c.copy_precedence, c.copy_id));
        out
    }

    pub fn has_copy(&self, name: &str) -> bool {
        self.copies.read().contains(name)
    }

    pub fn copy_summary(&self, name: &str) -> Option<CopySummary> {
        self.copies.read().get(name).cloned()
    }

    pub fn get_copy_precedence(&self, name: &str) -> Result<u32, ValidationError> {
        self.copies.read().require(name).map(|c| c.copy_precedence)
    }

    /// Secondary copies by precedence: no primary, no snap copies.
    pub fn get_secondary_copies(&self) -> Vec<CopySummary> {
        self.copies.read().secondary().into_iter().cloned().collect()
    }

    pub fn aux_copies(&self) -> Vec<String> {
        self.copies.read().aux_copy_names()
    }

    pub fn snap_copy(&self) -> Option<String> {
        self.copies.read().snap_copy_name()
    }

    /// Library of the primary copy.
    pub fn library_name(&self) -> Option<String> {
        self.copies.read().primary().and_then(|c| c.library_name.clone())
    }

    /// Opens a copy, fetching its full property document.
    pub async fn get_copy(&self, name: &str) -> SdkResult<StorageCopy<T>> {
        let (summary, siblings) = {
            let copies = self.copies.read();
            (copies.require(name)?.clone(), copies.clone())
        };
        self.open_copy(summary, siblings).await
    }

    pub async fn get_primary_copy(&self) -> SdkResult<StorageCopy<T>> {
        let (summary, siblings) = {
            let copies = self.copies.read();
            let primary = copies
                .primary()
                .cloned()
                .ok_or_else(|| ValidationError::NoPrimaryCopy(self.name.clone()))?;
            (primary, copies.clone())
        };
        self.open_copy(summary, siblings).await
    }

    async fn open_copy(&self, summary: CopySummary, siblings: CopyIndex) -> SdkResult<StorageCopy<T>> {
        StorageCopy::load(
            self.transport.clone(),
            self.config.clone(),
            self.id,
            &self.name,
            summary,
            siblings,
        )
        .await
    }

    // ========================================================================
    // ADVANCED PROPERTIES
    // ========================================================================

    async fn advanced_properties(&self) -> SdkResult<Value> {
        let cached = self.advanced.read().clone();
        if let Some(cached) = cached {
            return Ok(cached);
        }
        let request = ApiRequest::get(endpoints::policy(self.id))
            .with_query("propertyLevel", endpoints::ADVANCED_PROPERTY_LEVEL);
        let response = self.transport.execute(request).await?;
        let body = decode("get advanced storage policy properties", &response)?;
        *self.advanced.write() = Some(body.clone());
        Ok(body)
    }

    pub async fn description(&self) -> SdkResult<String> {
        let advanced = self.advanced_properties().await?;
        Ok(advanced
            .pointer("/policies/0/description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Sets the maximum number of device streams for the policy.
    pub async fn edit_max_device_stream(&self, streams: u32) -> SdkResult<()> {
        let body = json!({ "numberOfStreams": streams });
        let response = self
            .transport
            .execute(ApiRequest::put(endpoints::policy(self.id), body))
            .await?;
        expect_no_failure("edit device streams", &response)?;
        *self.advanced.write() = None;
        info!("Set {} device streams on policy {}", streams, self.name);
        Ok(())
    }

    // ========================================================================
    // COPY CREATION
    // ========================================================================

    pub async fn create_secondary_copy(
        &self,
        copy_name: &str,
        spec: SecondaryCopySpec,
    ) -> SdkResult<StorageCopy<T>> {
        self.create_copy(copy_name, CopySpec::Secondary(spec)).await
    }

    pub async fn create_global_dependent_copy(
        &self,
        copy_name: &str,
        spec: GlobalDependentCopySpec,
    ) -> SdkResult<StorageCopy<T>> {
        self.create_copy(copy_name, CopySpec::GlobalDependent(spec)).await
    }

    /// Snap, mirror or replica copy.
    pub async fn create_snap_copy(&self, copy_name: &str, spec: SnapCopySpec) -> SdkResult<StorageCopy<T>> {
        self.create_copy(copy_name, CopySpec::Snap(spec)).await
    }

    pub async fn create_selective_copy(
        &self,
        copy_name: &str,
        spec: SelectiveCopySpec,
    ) -> SdkResult<StorageCopy<T>> {
        self.create_copy(copy_name, CopySpec::Selective(spec)).await
    }

    pub async fn create_dedupe_secondary_copy(
        &self,
        copy_name: &str,
        spec: DedupeCopySpec,
    ) -> SdkResult<StorageCopy<T>> {
        self.create_copy(copy_name, CopySpec::Deduplicated(spec)).await
    }

    async fn create_copy(&self, copy_name: &str, spec: CopySpec) -> SdkResult<StorageCopy<T>> {
        if self.has_copy(copy_name) {
            return Err(ValidationError::CopyAlreadyExists(copy_name.to_string()).into());
        }
        let ctx = CopyRequestContext::new(self.id, &self.name);
        let body = spec.build(copy_name, &ctx)?;

        let response = self
            .transport
            .execute(ApiRequest::post(endpoints::CREATE_COPY, body))
            .await?;
        expect_success("create storage policy copy", &response)?;
        info!("Created {} copy {} on policy {}", spec.kind(), copy_name, self.name);

        self.refresh().await?;
        self.get_copy(copy_name).await
    }

    /// Deletes a copy. The primary copy and the snap primary are refused.
    pub async fn delete_secondary_copy(&self, copy_name: &str) -> SdkResult<()> {
        let target = self.copies.read().check_deletable(copy_name)?.clone();
        let body = json!({
            "App_DeleteStoragePolicyCopyReq": {
                "archiveGroupCopy": {
                    "copyId": target.copy_id.value(),
                    "copyName": target.name,
                    "storagePolicyId": self.id.value(),
                    "storagePolicyName": self.name
                }
            }
        });
        let response = self
            .transport
            .execute(ApiRequest::post(endpoints::DELETE_COPY, body))
            .await?;
        expect_success("delete storage policy copy", &response)?;
        info!("Deleted copy {} from policy {}", target.name, self.name);

        self.refresh().await
    }

    // ========================================================================
    // DDB MAINTENANCE
    // ========================================================================

    async fn qcommand(&self, operation: &str, body: Value) -> SdkResult<Option<Value>> {
        let response = self
            .transport
            .execute(ApiRequest::post(endpoints::EXECUTE_QCOMMAND, body))
            .await?;
        Ok(expect_accepted(operation, &response)?)
    }

    async fn create_task(&self, operation: &str, body: Value) -> SdkResult<TaskOutcome> {
        let response = self
            .transport
            .execute(ApiRequest::post(endpoints::CREATE_TASK, body))
            .await?;
        let outcome = expect_task(operation, &response)?;
        info!("{} on policy {}: {:?}", operation, self.name, outcome);
        Ok(outcome)
    }

    /// Seals the DDB of a copy. The copy is not checked locally.
    pub async fn seal_ddb(&self, copy_name: &str) -> SdkResult<()> {
        self.qcommand("seal DDB", seal_ddb_request(&self.name, copy_name)?)
            .await?;
        info!("Sealed DDB of {}/{}", self.name, copy_name);
        Ok(())
    }

    pub async fn add_ddb_partition(
        &self,
        copy_id: CopyId,
        store_id: u64,
        path: &str,
        media_agent: impl Into<EntityRef>,
    ) -> SdkResult<()> {
        let body = add_ddb_partition_request(
            self.config.commcell_id,
            copy_id,
            store_id,
            path,
            &media_agent.into(),
        )?;
        self.qcommand("add DDB partition", body).await?;
        Ok(())
    }

    /// Starts a DDB move. With `config_only` only the database record
    /// changes; the files must already be at the destination.
    pub async fn move_dedupe_store(&self, request: &DdbMove) -> SdkResult<JobHandle> {
        let body = request.build_request(&self.name)?;
        let response = self
            .transport
            .execute(ApiRequest::post(endpoints::CREATE_TASK, body))
            .await?;
        let job = expect_job("move dedupe store", &response)?;
        info!("Started DDB move for {}/{}: {}", self.name, request.copy_name, job);
        Ok(job)
    }

    pub async fn mark_for_recovery(
        &self,
        store_id: u64,
        sub_store_id: u64,
        media_agent: &str,
        path: &str,
    ) -> SdkResult<()> {
        let body = mark_for_recovery_request(store_id, sub_store_id, media_agent, path)?;
        self.qcommand("mark DDB for recovery", body).await?;
        Ok(())
    }

    /// Starts a DDB reconstruction; returns the job when the service reports one.
    pub async fn run_recon(
        &self,
        copy_name: &str,
        store_id: u64,
        mode: ReconstructionMode,
        scalable_resources: bool,
    ) -> SdkResult<Option<JobHandle>> {
        let body = reconstruction_request(&self.name, copy_name, store_id, mode, scalable_resources)?;
        let response = self
            .transport
            .execute(ApiRequest::post(endpoints::EXECUTE_QCOMMAND, body))
            .await?;
        let body = expect_no_failure("DDB reconstruction", &response)?;
        Ok(match classify(&body) {
            Envelope::Jobs(ids) => Some(JobHandle::new(ids[0])),
            _ => None,
        })
    }

    /// Seals the policy's stores and starts over. Refused locally when the
    /// primary copy writes into a global dedup store.
    pub async fn start_over(&self) -> SdkResult<Option<JobHandle>> {
        let dependent = self
            .copies
            .read()
            .primary()
            .map_or(false, |c| c.uses_global_dedup_store);
        if dependent {
            return Err(ValidationError::DependentPolicyStartOver(self.name.clone()).into());
        }

        let response = self
            .transport
            .execute(ApiRequest::post(endpoints::EXECUTE_QCOMMAND, start_over_request(&self.name)))
            .await?;
        let job = expect_optional_job("start over", &response)?;
        info!("Started over policy {}", self.name);
        self.refresh().await?;
        Ok(job)
    }

    pub async fn update_transactional_ddb(
        &self,
        enabled: bool,
        copy_name: &str,
        media_agent: &str,
    ) -> SdkResult<()> {
        let body = transactional_ddb_request(&self.name, copy_name, media_agent, enabled)?;
        self.qcommand("update transactional DDB", body).await?;
        Ok(())
    }

    pub async fn run_ddb_verification(&self, verification: &DdbVerification) -> SdkResult<TaskOutcome> {
        let body = verification.build_request(&self.name)?;
        self.create_task("DDB verification", body).await
    }

    pub async fn run_data_verification(&self, options: &DataVerificationOptions) -> SdkResult<TaskOutcome> {
        self.create_task("data verification", options.build_request(&self.name))
            .await
    }

    pub async fn run_aux_copy(&self, options: &AuxCopyOptions) -> SdkResult<TaskOutcome> {
        let body = options.build_request(&self.name)?;
        self.create_task("aux copy", body).await
    }

    // ========================================================================
    // POLICY-WIDE JOB OPERATIONS
    // ========================================================================

    /// Deletes one job from every copy of the policy.
    pub async fn delete_job(&self, job_id: u64) -> SdkResult<()> {
        JobIds::new([job_id])?;
        let copy_names: Vec<String> = self.copies().into_iter().map(|c| c.name).collect();
        let body = delete_job_request(&self.name, &copy_names, job_id, self.config.commcell_id);
        self.qcommand("delete job", body).await?;
        info!("Deleted job {} from {} copies of {}", job_id, copy_names.len(), self.name);
        Ok(())
    }

    /// Moves every subclient to `destination`, or leaves them unassigned.
    pub async fn reassociate_all_subclients(&self, destination: Option<&str>) -> SdkResult<()> {
        let destination = destination.unwrap_or(UNASSIGNED_POLICY);
        let body = reassociate_request(&self.name, destination)?;
        let response = self
            .transport
            .execute(ApiRequest::post(endpoints::EXECUTE_QCOMMAND, body))
            .await?;
        expect_success("reassociate subclients", &response)?;
        info!("Reassociated subclients of {} to {}", self.name, destination);
        Ok(())
    }
}
