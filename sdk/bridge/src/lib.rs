//! # Storage Policy Bridge
//!
//! Client for storage policies and their copies on the backup service REST
//! API. [`PolicyRegistry`] lists and creates policies, [`Policy`] manages
//! copies and policy-wide maintenance, [`StorageCopy`] edits one copy's
//! property document and marks jobs on it.

// Core modules
pub mod config;
pub mod copy;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod job;
pub mod job_marking;
pub mod policy;
pub mod registry;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::{ClientConfig, ConfigError};
pub use copy::{SealFrequency, StorageCopy};
pub use error::{RemoteError, SdkError, SdkResult};
pub use job::{JobHandle, TaskOutcome};
pub use job_marking::{JobMarkingReport, MarkingTarget};
pub use policy::Policy;
pub use registry::{PolicyEntry, PolicyRegistry, RefreshStats};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};

pub use policy_engine;

/// Builds the HTTP transport from `config` and loads the policy list.
pub async fn connect(config: ClientConfig) -> SdkResult<PolicyRegistry<HttpTransport>> {
    let transport = HttpTransport::new(&config)?;
    PolicyRegistry::connect(transport, config).await
}
