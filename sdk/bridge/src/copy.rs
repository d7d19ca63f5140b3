//! # Storage Policy Copy
//!
//! A [`StorageCopy`] holds the full property document of one copy. Changes
//! are staged on a clone of the document and sent back whole in a single
//! `PUT`; nothing is patched field by field. The document is re-read after
//! every successful commit, and the compliance lock and media refresh
//! setters check that re-read before reporting success.
//!
//! Mutation takes `&mut self`: one handle, one writer. Two handles on the
//! same copy do not coordinate and the last commit wins.

use std::sync::Arc;

use log::{info, warn};
use serde_json::{json, Value};

use policy_engine::task_requests::{datapath_request, seal_frequency_request, DataPathChange};
use policy_engine::wire::as_u64;
use policy_engine::{
    CopyId, CopyIndex, CopyProperties, CopySummary, EncryptionSettings, ExtendedRetention,
    ExtendedRetentionKind, JobOperation, JobSelection, JobsOnCopyFilter, MediaRefreshSettings,
    PolicyId, ReencryptionSetting, RetentionUpdate, ValidationError,
};

use crate::config::ClientConfig;
use crate::endpoints;
use crate::envelope::{decode, expect_accepted, expect_compliance_disabled, expect_no_failure, surface};
use crate::error::{RemoteError, SdkResult};
use crate::job_marking::{JobMarker, JobMarkingReport, MarkingTarget};
use crate::transport::{ApiRequest, Transport};

/// DDB seal thresholds of a copy. Zero means the threshold is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealFrequency {
    /// Store size in GB
    pub size: u64,
    pub days: u64,
    pub months: u64,
}

pub struct StorageCopy<T: Transport> {
    transport: Arc<T>,
    config: Arc<ClientConfig>,
    policy_id: PolicyId,
    policy_name: String,
    summary: CopySummary,
    properties: CopyProperties,
    /// Other copies of the policy, for source-copy lookups.
    siblings: CopyIndex,
}

impl<T: Transport> StorageCopy<T> {
    pub(crate) async fn load(
        transport: Arc<T>,
        config: Arc<ClientConfig>,
        policy_id: PolicyId,
        policy_name: &str,
        summary: CopySummary,
        siblings: CopyIndex,
    ) -> SdkResult<Self> {
        let mut copy = StorageCopy {
            transport,
            config,
            policy_id,
            policy_name: policy_name.to_string(),
            summary,
            properties: CopyProperties::default(),
            siblings,
        };
        copy.refresh().await?;
        Ok(copy)
    }

    pub fn name(&self) -> &str {
        &self.summary.name
    }

    pub fn copy_id(&self) -> CopyId {
        self.summary.copy_id
    }

    pub fn policy_name(&self) -> &str {
        &self.policy_name
    }

    pub fn summary(&self) -> &CopySummary {
        &self.summary
    }

    /// Last document read from the service. Every facet getter lives here.
    pub fn properties(&self) -> &CopyProperties {
        &self.properties
    }

    pub fn copy_precedence(&self) -> u32 {
        self.summary.copy_precedence
    }

    pub fn is_compliance_lock_enabled(&self) -> bool {
        self.properties.is_compliance_lock_enabled()
    }

    pub fn is_media_refresh_enabled(&self) -> bool {
        self.properties.is_media_refresh_enabled()
    }

    pub fn extended_retention_rules(&self) -> [Option<ExtendedRetention>; 3] {
        self.properties.extended_retention_rules()
    }

    pub async fn refresh(&mut self) -> SdkResult<()> {
        let operation = "get copy properties";
        let response = self
            .transport
            .execute(ApiRequest::get(endpoints::copy(self.policy_id, self.copy_id())))
            .await?;
        let body = decode(operation, &response)?;
        let Some(doc) = body.get("copy") else {
            return Err(surface(RemoteError::Unexpected {
                operation: operation.to_string(),
                body: body.to_string(),
            })
            .into());
        };

        self.properties = CopyProperties::from_value(doc.clone()).map_err(|e| {
            surface(RemoteError::Undecodable {
                operation: operation.to_string(),
                message: e.to_string(),
            })
        })?;
        if let Some(summary) = CopySummary::from_wire(doc) {
            self.summary = summary;
        }
        Ok(())
    }

    // ========================================================================
    // STAGE AND COMMIT
    // ========================================================================

    /// A copy of the current document to edit before [`Self::commit`].
    pub fn stage(&self) -> CopyProperties {
        self.properties.clone()
    }

    /// Sends the whole staged document and re-reads the copy. On failure the
    /// held document is left as it was.
    pub async fn commit(&mut self, mut staged: CopyProperties) -> SdkResult<()> {
        staged.identity.storage_policy_name = Some(self.policy_name.clone());
        let body = json!({ "storagePolicyCopyInfo": staged.to_value()? });

        let response = self
            .transport
            .execute(ApiRequest::put(endpoints::copy(self.policy_id, self.copy_id()), body))
            .await?;
        expect_no_failure("update copy properties", &response)?;
        info!("Committed properties of {}/{}", self.policy_name, self.name());

        self.refresh().await
    }

    /// Stages `edit` and commits it in one request. A validation error from
    /// `edit` means nothing was sent.
    pub async fn update<F>(&mut self, edit: F) -> SdkResult<()>
    where
        F: FnOnce(&mut CopyProperties) -> Result<(), ValidationError>,
    {
        let mut staged = self.stage();
        edit(&mut staged)?;
        self.commit(staged).await
    }

    fn unverified(&self, operation: &str, detail: &str) -> RemoteError {
        surface(RemoteError::Unverified {
            operation: operation.to_string(),
            detail: format!("{} on {}/{}", detail, self.policy_name, self.name()),
        })
    }

    // ========================================================================
    // RETENTION
    // ========================================================================

    pub async fn set_retention(&mut self, update: RetentionUpdate) -> SdkResult<()> {
        self.update(|p| {
            p.apply_retention(&update);
            Ok(())
        })
        .await
    }

    /// Writes extended retention slot 1, 2 or 3.
    pub async fn set_extended_retention(
        &mut self,
        slot: u8,
        enabled: bool,
        rule: ExtendedRetentionKind,
        end_days: i64,
        grace_days: i64,
    ) -> SdkResult<()> {
        self.update(|p| p.set_extended_retention(slot, enabled, rule, end_days, grace_days))
            .await
    }

    pub async fn set_managed_disk_space(&mut self, enabled: bool) -> SdkResult<()> {
        self.update(|p| {
            p.set_managed_disk_space(enabled);
            Ok(())
        })
        .await
    }

    /// Enables or disables media refresh and checks the service kept it.
    pub async fn set_media_refresh(&mut self, settings: MediaRefreshSettings) -> SdkResult<()> {
        self.update(|p| {
            p.apply_media_refresh(&settings);
            Ok(())
        })
        .await?;
        if self.properties.is_media_refresh_enabled() != settings.enabled {
            return Err(self.unverified("set media refresh", "media refresh flag unchanged").into());
        }
        Ok(())
    }

    // ========================================================================
    // ENCRYPTION
    // ========================================================================

    /// Applies an encryption mode. Cipher and key length pairs outside the
    /// documented table are logged and sent as given.
    pub async fn set_encryption(&mut self, settings: EncryptionSettings) -> SdkResult<()> {
        if !settings.is_supported() {
            warn!(
                "{} with a {}-bit key is not a documented combination; sending as given",
                settings.cipher, settings.key_length
            );
        }
        self.update(|p| {
            p.apply_encryption(&settings);
            Ok(())
        })
        .await
    }

    pub async fn set_copy_reencryption(&mut self, setting: ReencryptionSetting) -> SdkResult<()> {
        if let ReencryptionSetting::Reencrypt { cipher, key_length } = setting {
            if !cipher.supports(key_length) {
                warn!(
                    "{} with a {}-bit key is not a documented combination; sending as given",
                    cipher, key_length
                );
            }
        }
        self.update(|p| {
            p.apply_reencryption(&setting);
            Ok(())
        })
        .await
    }

    pub async fn set_key_management_server(&mut self, kms_name: &str) -> SdkResult<()> {
        self.update(|p| p.set_key_management_server(kms_name)).await
    }

    pub async fn rotate_encryption_master_key(&mut self) -> SdkResult<()> {
        self.update(|p| {
            p.rotate_master_key();
            Ok(())
        })
        .await
    }

    // ========================================================================
    // DEDUPLICATION
    // ========================================================================

    /// Turning DASH full off also turns the source-side disk cache off.
    pub async fn set_dash_full(&mut self, enabled: bool) -> SdkResult<()> {
        self.update(|p| p.set_dash_full(enabled)).await
    }

    pub async fn set_source_side_disk_cache(&mut self, enabled: bool) -> SdkResult<()> {
        self.update(|p| p.set_source_side_disk_cache(enabled)).await
    }

    pub async fn set_client_side_dedup(&mut self, enabled: bool) -> SdkResult<()> {
        self.update(|p| {
            p.set_client_side_dedup(enabled);
            Ok(())
        })
        .await
    }

    pub async fn set_store_priming(&mut self, enabled: bool) -> SdkResult<()> {
        self.update(|p| {
            p.set_store_priming(enabled);
            Ok(())
        })
        .await
    }

    pub async fn set_ddb_resiliency(&mut self, enabled: bool, min_partitions: u32) -> SdkResult<()> {
        self.update(|p| p.set_ddb_resiliency(enabled, min_partitions))
            .await
    }

    pub async fn set_software_compression(&mut self, enabled: bool) -> SdkResult<()> {
        self.update(|p| {
            p.set_software_compression(enabled);
            Ok(())
        })
        .await
    }

    // ========================================================================
    // COMPLIANCE LOCK
    // ========================================================================

    /// Sets the WORM flag through a normal commit, then checks it stuck.
    pub async fn enable_compliance_lock(&mut self) -> SdkResult<()> {
        self.update(|p| {
            p.enable_compliance_lock();
            Ok(())
        })
        .await?;
        if !self.properties.is_compliance_lock_enabled() {
            return Err(self
                .unverified("enable compliance lock", "compliance lock still disabled")
                .into());
        }
        Ok(())
    }

    /// Clears the WORM flag through its dedicated endpoint, then checks it
    /// cleared.
    pub async fn disable_compliance_lock(&mut self) -> SdkResult<()> {
        let operation = "disable compliance lock";
        let request = ApiRequest::post_empty(endpoints::disable_compliance_lock(
            self.policy_id,
            self.copy_id(),
        ));
        let response = self.transport.execute(request).await?;
        expect_compliance_disabled(operation, &response)?;

        self.refresh().await?;
        if self.properties.is_compliance_lock_enabled() {
            return Err(self.unverified(operation, "compliance lock still enabled").into());
        }
        info!("Disabled compliance lock on {}/{}", self.policy_name, self.name());
        Ok(())
    }

    // ========================================================================
    // COPY BEHAVIOUR
    // ========================================================================

    /// Points the copy at another copy of the same policy.
    pub async fn set_source_copy(&mut self, source: &str) -> SdkResult<()> {
        let source = self.siblings.require(source)?.clone();
        self.update(|p| {
            p.set_source_copy(source.copy_id, &source.name);
            Ok(())
        })
        .await
    }

    /// Changes the multiplexing factor only.
    pub async fn set_multiplexing_factor(&mut self, factor: u32) -> SdkResult<()> {
        self.update(|p| {
            p.set_multiplexing_factor(factor);
            Ok(())
        })
        .await
    }

    pub async fn set_network_throttle_bandwidth(&mut self, mb_per_hour: u32) -> SdkResult<()> {
        self.update(|p| {
            p.set_network_throttle_bandwidth(mb_per_hour);
            Ok(())
        })
        .await
    }

    pub async fn set_parallel_copy(&mut self, enabled: bool) -> SdkResult<()> {
        self.update(|p| {
            p.set_parallel_copy(enabled);
            Ok(())
        })
        .await
    }

    pub async fn set_inline_copy(&mut self, enabled: bool) -> SdkResult<()> {
        self.update(|p| {
            p.set_inline_copy(enabled);
            Ok(())
        })
        .await
    }

    pub async fn set_space_optimized_aux_copy(&mut self, enabled: bool) -> SdkResult<()> {
        self.update(|p| {
            p.set_space_optimized_aux_copy(enabled);
            Ok(())
        })
        .await
    }

    pub async fn set_override_pool_retention(&mut self, enabled: bool) -> SdkResult<()> {
        self.update(|p| {
            p.set_override_pool_retention(enabled);
            Ok(())
        })
        .await
    }

    pub async fn set_active(&mut self, active: bool) -> SdkResult<()> {
        self.update(|p| {
            p.set_active(active);
            Ok(())
        })
        .await
    }

    // ========================================================================
    // DATA PATHS AND REPORTS
    // ========================================================================

    async fn change_datapath(
        &mut self,
        change: DataPathChange,
        library: &str,
        media_agent: &str,
    ) -> SdkResult<()> {
        let body = datapath_request(change, library, media_agent)?;
        let response = self
            .transport
            .execute(ApiRequest::put(endpoints::copy(self.policy_id, self.copy_id()), body))
            .await?;
        expect_no_failure("update data path", &response)?;
        info!(
            "Data path {}/{} on {}/{}: {:?}",
            library,
            media_agent,
            self.policy_name,
            self.name(),
            change
        );
        self.refresh().await
    }

    pub async fn delete_datapath(&mut self, library: &str, media_agent: &str) -> SdkResult<()> {
        self.change_datapath(DataPathChange::Remove, library, media_agent)
            .await
    }

    pub async fn set_default_datapath(&mut self, library: &str, media_agent: &str) -> SdkResult<()> {
        self.change_datapath(DataPathChange::SetDefault, library, media_agent)
            .await
    }

    pub async fn store_seal_frequency(&self) -> SdkResult<SealFrequency> {
        let operation = "get store seal frequency";
        let body = seal_frequency_request(self.policy_id, self.copy_id());
        let response = self
            .transport
            .execute(ApiRequest::post(endpoints::EXECUTE_QCOMMAND, body))
            .await?;
        let body = decode(operation, &response)?;

        let options = body.pointer("/options/dedupOptions");
        let read = |key: &str| options.and_then(|o| o.get(key)).and_then(as_u64);
        match (
            read("storeCreationSize"),
            read("storeCreationDays"),
            read("storeCreationMonths"),
        ) {
            (Some(size), Some(days), Some(months)) => Ok(SealFrequency { size, days, months }),
            _ => Err(surface(RemoteError::Unexpected {
                operation: operation.to_string(),
                body: body.to_string(),
            })
            .into()),
        }
    }

    /// Rows of the jobs-on-copy report, one JSON object per job.
    pub async fn jobs_on_copy(&self, filter: &JobsOnCopyFilter) -> SdkResult<Vec<Value>> {
        let operation = "list jobs on copy";
        let command = filter.command(&self.policy_name, self.name());
        let request = ApiRequest::post_empty(endpoints::EXECUTE_QCOMMAND).with_query("command", &command);
        let response = self.transport.execute(request).await?;

        let body = expect_accepted(operation, &response)?.unwrap_or(Value::Null);
        let Some(output) = body.get("ExecScriptOutput") else {
            return Err(surface(RemoteError::Unexpected {
                operation: operation.to_string(),
                body: response.text,
            })
            .into());
        };
        Ok(match output.get("FieldValue") {
            Some(Value::Array(rows)) => rows.clone(),
            Some(row) if row.get("@JobID").is_some() => vec![row.clone()],
            _ => Vec::new(),
        })
    }

    // ========================================================================
    // JOB MARKING
    // ========================================================================

    async fn mark(
        &self,
        operation: JobOperation,
        jobs: impl Into<JobSelection>,
    ) -> SdkResult<JobMarkingReport> {
        let target = MarkingTarget {
            policy_id: self.policy_id,
            policy_name: self.policy_name.clone(),
            copy_id: self.copy_id(),
            copy_name: self.name().to_string(),
        };
        JobMarker::new(self.transport.clone(), self.config.clone())
            .mark(&target, operation, jobs.into())
            .await
    }

    pub async fn delete_jobs(&self, jobs: impl Into<JobSelection>) -> SdkResult<JobMarkingReport> {
        self.mark(JobOperation::Delete, jobs).await
    }

    pub async fn pick_for_copy(&self, jobs: impl Into<JobSelection>) -> SdkResult<JobMarkingReport> {
        self.mark(JobOperation::AllowCopy, jobs).await
    }

    pub async fn recopy_jobs(&self, jobs: impl Into<JobSelection>) -> SdkResult<JobMarkingReport> {
        self.mark(JobOperation::Recopy, jobs).await
    }

    pub async fn do_not_copy_jobs(&self, jobs: impl Into<JobSelection>) -> SdkResult<JobMarkingReport> {
        self.mark(JobOperation::PreventCopy, jobs).await
    }

    pub async fn mark_jobs_bad(&self, jobs: impl Into<JobSelection>) -> SdkResult<JobMarkingReport> {
        self.mark(JobOperation::MarkBad, jobs).await
    }

    pub async fn pick_jobs_for_data_verification(
        &self,
        jobs: impl Into<JobSelection>,
    ) -> SdkResult<JobMarkingReport> {
        self.mark(JobOperation::PickForVerification, jobs).await
    }

    pub async fn do_not_verify_data(&self, jobs: impl Into<JobSelection>) -> SdkResult<JobMarkingReport> {
        self.mark(JobOperation::DoNotVerify, jobs).await
    }

    pub async fn pick_jobs_for_backupcopy(
        &self,
        jobs: impl Into<JobSelection>,
    ) -> SdkResult<JobMarkingReport> {
        self.mark(JobOperation::PickForBackupCopy, jobs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
    use crate::policy::Policy;
    use crate::testing::{FakeService, GOLD_ID};
    use crate::transport::Method;
    use policy_engine::{Cipher, JobChannel, SecondaryCopySpec, RETAIN_UNCHANGED};

    async fn gold() -> (Arc<FakeService>, Policy<FakeService>) {
        let service = Arc::new(FakeService::seeded());
        let policy = Policy::load(
            service.clone(),
            Arc::new(ClientConfig::default()),
            PolicyId::new(GOLD_ID),
            "gold",
        )
        .await
        .unwrap();
        (service, policy)
    }

    async fn open(name: &str) -> (Arc<FakeService>, StorageCopy<FakeService>) {
        let (service, policy) = gold().await;
        let copy = policy.get_copy(name).await.unwrap();
        service.clear_requests();
        (service, copy)
    }

    fn stored(service: &FakeService, copy: &str) -> Value {
        service.stored_copy(GOLD_ID, copy).unwrap()
    }

    #[tokio::test]
    async fn test_new_copy_then_retention() {
        let (_, policy) = gold().await;
        policy
            .create_secondary_copy("copy3", SecondaryCopySpec::disk("lib1", "ma1"))
            .await
            .unwrap();
        assert!(policy.has_copy("COPY3"));

        let mut copy = policy.get_copy("COPY3").await.unwrap();
        let archive_before = copy.properties().archive_retention_days();
        copy.set_retention(RetentionUpdate::new(30, 1, RETAIN_UNCHANGED).with_jobs(0))
            .await
            .unwrap();

        let p = copy.properties();
        assert_eq!(p.retention_days(), Some(30));
        assert_eq!(p.retention_cycles(), Some(1));
        assert_eq!(p.archive_retention_days(), archive_before);
        assert!(!p.is_job_based_retention());
    }

    #[tokio::test]
    async fn test_sentinel_keeps_server_values() {
        let (service, mut copy) = open("Primary").await;
        copy.set_retention(RetentionUpdate::new(RETAIN_UNCHANGED, 4, RETAIN_UNCHANGED).with_jobs(6))
            .await
            .unwrap();

        let doc = stored(&service, "Primary");
        assert_eq!(doc["retentionRules"]["retainBackupDataForDays"], 14);
        assert_eq!(doc["retentionRules"]["retainBackupDataForCycles"], 4);
        assert_eq!(doc["retentionRules"]["retainArchiverDataForDays"], 90);
        assert!(copy.properties().is_job_based_retention());
    }

    #[tokio::test]
    async fn test_infinite_retention_overrides_days() {
        let (_, mut copy) = open("copy2").await;
        copy.set_retention(RetentionUpdate::new(45, -1, -1).with_infinite(true))
            .await
            .unwrap();
        assert_eq!(copy.properties().retention_days(), Some(-1));
    }

    #[tokio::test]
    async fn test_commit_sends_whole_document() {
        let (service, mut copy) = open("copy2").await;
        copy.set_parallel_copy(true).await.unwrap();

        let puts: Vec<_> = service
            .requests()
            .into_iter()
            .filter(|r| r.method == Method::Put)
            .collect();
        assert_eq!(puts.len(), 1);
        let info = &puts[0].body.as_ref().unwrap()["storagePolicyCopyInfo"];
        assert_eq!(info["StoragePolicyCopy"]["storagePolicyName"], "gold");
        assert_eq!(info["unmodelledSetting"]["keep"], "me");
        assert_eq!(info["retentionRules"]["retainBackupDataForDays"], 30);
        assert!(copy.properties().is_parallel_copy());
    }

    #[tokio::test]
    async fn test_update_batches_facets_into_one_put() {
        let (service, mut copy) = open("copy2").await;
        copy.update(|p| {
            p.set_inline_copy(true);
            p.set_network_throttle_bandwidth(500);
            p.set_extended_retention(2, true, ExtendedRetentionKind::Month, 365, 7)
        })
        .await
        .unwrap();

        assert_eq!(service.requests().iter().filter(|r| r.method == Method::Put).count(), 1);
        let rules = copy.extended_retention_rules();
        assert!(rules[0].is_none());
        let second = rules[1].unwrap();
        assert!(second.enabled);
        assert_eq!(second.rule(), Some(ExtendedRetentionKind::Month));
        assert_eq!(copy.properties().network_throttle_bandwidth(), Some(500));
    }

    #[tokio::test]
    async fn test_bad_slot_sends_nothing() {
        let (service, mut copy) = open("copy2").await;
        let err = copy
            .set_extended_retention(4, true, ExtendedRetentionKind::Year, 0, 0)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(service.request_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_error_keeps_document() {
        let (service, mut copy) = open("copy2").await;
        let path = endpoints::copy(PolicyId::new(GOLD_ID), copy.copy_id());
        service.respond_once(
            &path,
            200,
            r#"{"response": [{"errorCode": 9, "errorString": "copy is locked"}]}"#,
        );

        let err = copy.set_inline_copy(true).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "update copy properties failed with error code 9: copy is locked"
        );
        assert!(!copy.properties().is_inline_copy());
    }

    #[tokio::test]
    async fn test_ddb_resiliency() {
        let (service, mut copy) = open("Primary").await;
        let err = copy.set_ddb_resiliency(true, 0).await.unwrap_err();
        assert!(matches!(
            err,
            SdkError::Validation(ValidationError::InvalidMinimumPartitions(0))
        ));
        assert_eq!(service.request_count(), 0);

        copy.set_ddb_resiliency(true, 2).await.unwrap();
        assert!(copy.properties().ddb_resiliency());
        assert_eq!(copy.properties().minimum_partitions_for_jobs(), Some(2));
    }

    #[tokio::test]
    async fn test_dash_full_off_clears_disk_cache() {
        let (service, mut copy) = open("Primary").await;
        assert!(copy.properties().source_side_disk_cache());

        copy.set_dash_full(false).await.unwrap();
        assert!(!copy.properties().dash_full());
        assert!(!copy.properties().source_side_disk_cache());
        assert_eq!(
            stored(&service, "Primary")["dedupeFlags"]["enableSourceSideDiskCache"],
            0
        );
    }

    #[tokio::test]
    async fn test_dedupe_flags_need_deduplication() {
        let (service, mut copy) = open("copy2").await;
        assert!(copy.set_dash_full(true).await.unwrap_err().is_validation());
        assert!(copy.set_source_side_disk_cache(true).await.unwrap_err().is_validation());
        assert_eq!(service.request_count(), 0);

        copy.set_client_side_dedup(true).await.unwrap();
        copy.set_store_priming(true).await.unwrap();
        assert!(copy.properties().client_side_dedup());
        assert!(copy.properties().store_priming());
    }

    #[tokio::test]
    async fn test_compliance_lock_round_trip() {
        let (service, mut copy) = open("copy2").await;
        copy.enable_compliance_lock().await.unwrap();
        copy.enable_compliance_lock().await.unwrap();
        assert!(copy.is_compliance_lock_enabled());

        copy.disable_compliance_lock().await.unwrap();
        assert!(!copy.is_compliance_lock_enabled());

        let disable = service
            .requests()
            .into_iter()
            .find(|r| r.path.ends_with("DisableComplianceLock"))
            .unwrap();
        assert_eq!(disable.method, Method::Post);
        assert!(disable.body.is_none());
    }

    #[tokio::test]
    async fn test_compliance_lock_is_verified() {
        let (service, mut copy) = open("copy2").await;
        service.ignore_worm_changes(true);
        let err = copy.enable_compliance_lock().await.unwrap_err();
        assert!(matches!(err, SdkError::Remote(RemoteError::Unverified { .. })));

        service.ignore_worm_changes(false);
        copy.enable_compliance_lock().await.unwrap();
        service.ignore_worm_changes(true);
        let err = copy.disable_compliance_lock().await.unwrap_err();
        assert!(matches!(err, SdkError::Remote(RemoteError::Unverified { .. })));
    }

    #[tokio::test]
    async fn test_compliance_disable_error_message() {
        let (service, mut copy) = open("copy2").await;
        service.respond_once(
            &endpoints::disable_compliance_lock(PolicyId::new(GOLD_ID), copy.copy_id()),
            200,
            r#"{"genericError": {"errorCode": 1},
                "copies": [{"genericError": {"errorMessage": "retention not met"}}]}"#,
        );
        let err = copy.disable_compliance_lock().await.unwrap_err();
        assert!(err.to_string().contains("retention not met"));
    }

    #[tokio::test]
    async fn test_media_refresh_is_verified() {
        let (service, mut copy) = open("copy2").await;
        copy.set_media_refresh(MediaRefreshSettings::default()).await.unwrap();
        assert!(copy.is_media_refresh_enabled());
        let doc = stored(&service, "copy2");
        assert_eq!(doc["mediaProperties"]["mediaRefreshProperties"]["percentage"], 51);

        let path = endpoints::copy(PolicyId::new(GOLD_ID), copy.copy_id());
        service.respond_once(&path, 200, r#"{"response": [{"errorCode": 0}]}"#);
        let err = copy
            .set_media_refresh(MediaRefreshSettings::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::Remote(RemoteError::Unverified { .. })));
    }

    #[tokio::test]
    async fn test_unsupported_cipher_is_sent_as_given() {
        let (service, mut copy) = open("copy2").await;
        copy.set_encryption(EncryptionSettings::re_encrypt(Cipher::Gost, 128))
            .await
            .unwrap();
        let doc = stored(&service, "copy2");
        assert_eq!(doc["dataEncryption"]["encryptionType"], "GOST");
        assert_eq!(doc["dataEncryption"]["encryptionKeyLength"], 128);
        assert_eq!(doc["extendedFlags"]["encryptOnDependentPrimary"], 1);
    }

    #[tokio::test]
    async fn test_plain_text_clears_encryption() {
        let (service, mut copy) = open("copy2").await;
        copy.set_encryption(EncryptionSettings::network(Cipher::Aes, 256))
            .await
            .unwrap();
        copy.set_encryption(EncryptionSettings::plain_text()).await.unwrap();
        let doc = stored(&service, "copy2");
        assert!(doc["dataEncryption"].get("encryptionType").is_none());
    }

    #[tokio::test]
    async fn test_key_management() {
        let (_, mut copy) = open("copy2").await;
        copy.set_key_management_server("vault-kms").await.unwrap();
        assert_eq!(copy.properties().key_provider_name(), Some("vault-kms"));
        assert!(copy.set_key_management_server(" ").await.unwrap_err().is_validation());
        copy.rotate_encryption_master_key().await.unwrap();
        copy.set_copy_reencryption(ReencryptionSetting::Preserve).await.unwrap();
    }

    #[tokio::test]
    async fn test_source_copy_is_resolved_locally() {
        let (service, mut copy) = open("copy2").await;
        assert!(copy.set_source_copy("nowhere").await.unwrap_err().is_validation());
        assert_eq!(service.request_count(), 0);

        copy.set_source_copy("PRIMARY").await.unwrap();
        assert_eq!(copy.properties().source_copy_name(), Some("Primary"));
    }

    #[tokio::test]
    async fn test_multiplexing_factor_changes_only_that_field() {
        let (service, mut copy) = open("copy2").await;
        let before = stored(&service, "copy2");
        copy.set_multiplexing_factor(4).await.unwrap();

        let after = stored(&service, "copy2");
        assert_eq!(after["mediaProperties"]["multiplexingFactor"], 4);
        for key in ["retentionRules", "dedupeFlags", "copyFlags", "library", "unmodelledSetting"] {
            assert_eq!(after[key], before[key], "{} changed", key);
        }
    }

    #[tokio::test]
    async fn test_flag_setters() {
        let (_, mut copy) = open("copy2").await;
        copy.set_space_optimized_aux_copy(true).await.unwrap();
        copy.set_override_pool_retention(true).await.unwrap();
        copy.set_software_compression(true).await.unwrap();
        copy.set_managed_disk_space(true).await.unwrap();
        copy.set_active(false).await.unwrap();

        let p = copy.properties();
        assert!(p.is_space_optimized_aux_copy());
        assert!(p.overrides_pool_retention());
        assert!(p.software_compression());
        assert!(p.managed_disk_space());
        assert!(!p.is_active());
        assert!(!copy.summary().active);
    }

    #[tokio::test]
    async fn test_datapath_changes() {
        let (service, mut copy) = open("copy2").await;
        copy.delete_datapath("lib2", "ma2").await.unwrap();
        copy.set_default_datapath("lib1", "ma1").await.unwrap();

        let puts: Vec<_> = service
            .requests()
            .into_iter()
            .filter(|r| r.method == Method::Put)
            .collect();
        let first = &puts[0].body.as_ref().unwrap()["storagePolicyCopyInfo"]["dataPathProperties"][0];
        assert_eq!(first["operationFlags"]["removeDataPath"], true);
        assert_eq!(first["library"]["libraryName"], "lib2");
        assert!(copy.delete_datapath("", "ma2").await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_store_seal_frequency() {
        let (service, copy) = open("Primary").await;
        let frequency = copy.store_seal_frequency().await.unwrap();
        assert_eq!(frequency, SealFrequency { size: 1024, days: 30, months: 0 });

        service.respond_once(endpoints::EXECUTE_QCOMMAND, 200, r#"{"options": {}}"#);
        assert!(copy.store_seal_frequency().await.unwrap_err().is_remote());
    }

    #[tokio::test]
    async fn test_jobs_on_copy() {
        let (service, copy) = open("copy2").await;
        let rows = copy.jobs_on_copy(&JobsOnCopyFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["@JobID"], "701");

        service.respond_once(
            endpoints::EXECUTE_QCOMMAND,
            200,
            r#"{"ExecScriptOutput": {"FieldValue": {"@JobID": "703"}}}"#,
        );
        let rows = copy.jobs_on_copy(&JobsOnCopyFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);

        service.respond_once(endpoints::EXECUTE_QCOMMAND, 200, r#"{"errorCode": 0}"#);
        assert!(copy.jobs_on_copy(&JobsOnCopyFilter::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_job_marking_channels() {
        let (service, copy) = open("copy2").await;
        let report = copy.delete_jobs(vec![11u64, 12]).await.unwrap();
        assert_eq!(report.channel, JobChannel::Batch);

        let report = copy.pick_jobs_for_data_verification("11, 12").await.unwrap();
        assert_eq!(report.channel, JobChannel::Legacy);
        let script = &service.requests_to(endpoints::EXECUTE_QSCRIPT)[0];
        assert_eq!(
            script.query_value("command"),
            Some("-sn MarkJobsOnCopy -si gold -si copy2 -si pickForVerification -si 11,12")
        );

        copy.pick_for_copy(5u64).await.unwrap();
        copy.recopy_jobs(5u64).await.unwrap();
        copy.do_not_copy_jobs(5u64).await.unwrap();
        copy.mark_jobs_bad(5u64).await.unwrap();
        copy.do_not_verify_data(5u64).await.unwrap();
        copy.pick_jobs_for_backupcopy(5u64).await.unwrap();
        assert_eq!(service.requests_to(endpoints::JOB_OPERATIONS).len(), 4);
        assert_eq!(service.requests_to(endpoints::EXECUTE_QSCRIPT).len(), 4);
    }
}
