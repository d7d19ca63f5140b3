//! # Job Marking
//!
//! Applies one [`JobOperation`] to a set of job ids on one copy. Operations
//! with a batch form go out as a single request carrying the whole id list.
//! The rest go through the legacy script channel, which carries the ids in
//! the request URL and is split into batches that stay under the configured
//! length limit.
//!
//! Batches are independent: when batch `k` fails the error is returned and
//! batches `1..k` stay applied on the service.

use std::sync::Arc;

use log::{debug, info};
use serde_json::to_value;

use policy_engine::job_ops::{is_legacy_rejection, legacy_mark_command};
use policy_engine::{
    plan_legacy_batches, BatchJobRequest, CopyId, JobChannel, JobIds, JobOperation, JobSelection,
    PolicyId,
};

use crate::config::ClientConfig;
use crate::endpoints;
use crate::envelope::{expect_no_failure, surface};
use crate::error::{RemoteError, SdkResult};
use crate::transport::{ApiRequest, Transport};

/// Copy a marking applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkingTarget {
    pub policy_id: PolicyId,
    pub policy_name: String,
    pub copy_id: CopyId,
    pub copy_name: String,
}

/// Outcome of a completed marking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobMarkingReport {
    pub operation: JobOperation,
    pub channel: JobChannel,
    pub requests_sent: usize,
    pub job_ids: JobIds,
}

pub struct JobMarker<T: Transport> {
    transport: Arc<T>,
    config: Arc<ClientConfig>,
}

impl<T: Transport> JobMarker<T> {
    pub fn new(transport: Arc<T>, config: Arc<ClientConfig>) -> Self {
        Self { transport, config }
    }

    pub async fn mark(
        &self,
        target: &MarkingTarget,
        operation: JobOperation,
        selection: JobSelection,
    ) -> SdkResult<JobMarkingReport> {
        let ids = selection.normalize()?;
        let requests_sent = match operation.channel() {
            JobChannel::Batch => self.mark_batch(target, operation, &ids).await?,
            JobChannel::Legacy => self.mark_legacy(target, operation, &ids).await?,
        };

        info!(
            "Marked {} job(s) {} on {}/{} in {} request(s)",
            ids.len(),
            operation,
            target.policy_name,
            target.copy_name,
            requests_sent
        );
        Ok(JobMarkingReport {
            operation,
            channel: operation.channel(),
            requests_sent,
            job_ids: ids,
        })
    }

    async fn mark_batch(
        &self,
        target: &MarkingTarget,
        operation: JobOperation,
        ids: &JobIds,
    ) -> SdkResult<usize> {
        let op_name = operation.to_string();
        let body = BatchJobRequest::new(
            operation,
            ids,
            self.config.commcell_id,
            target.policy_id,
            target.copy_id,
        )
        .ok_or_else(|| RemoteError::Rejected {
            operation: op_name.clone(),
            message: "operation has no batch form".to_string(),
        })?;
        let body = to_value(&body)?;

        let response = self
            .transport
            .execute(ApiRequest::post(endpoints::JOB_OPERATIONS, body))
            .await?;
        expect_no_failure(&op_name, &response)?;
        Ok(1)
    }

    async fn mark_legacy(
        &self,
        target: &MarkingTarget,
        operation: JobOperation,
        ids: &JobIds,
    ) -> Result<usize, RemoteError> {
        let op_name = operation.to_string();
        let script_op = operation
            .script_operation()
            .ok_or_else(|| RemoteError::Rejected {
                operation: op_name.clone(),
                message: "operation has no script form".to_string(),
            })?;

        let batches = plan_legacy_batches(ids, self.config.legacy_batch_limit);
        for (index, batch) in batches.iter().enumerate() {
            debug!("{} batch {}/{}: {}", op_name, index + 1, batches.len(), batch);
            let command = legacy_mark_command(&target.policy_name, &target.copy_name, script_op, batch);
            let request = ApiRequest::post_empty(endpoints::EXECUTE_QSCRIPT).with_query("command", &command);
            let response = self.transport.execute(request).await?;

            if !response.success {
                return Err(surface(RemoteError::Status {
                    operation: op_name,
                    status: response.status,
                    body: response.text,
                }));
            }
            let text = response.text.trim();
            if text.is_empty() {
                return Err(surface(RemoteError::EmptyBody { operation: op_name }));
            }
            if is_legacy_rejection(text) {
                return Err(surface(RemoteError::Rejected {
                    operation: op_name,
                    message: text.to_string(),
                }));
            }
        }
        Ok(batches.len())
    }
}
