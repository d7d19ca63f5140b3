//! # Storage Policy Engine
//!
//! Pure domain model for storage policies and their copies: case-insensitive
//! names, copy summaries, the typed copy property document and the rule facets
//! that mutate it (retention, encryption, dedupe), job-id batching, and the
//! request bodies sent to the backup service. Nothing in this crate performs I/O.

pub mod copy_requests;
pub mod copy_summary;
pub mod dedupe;
pub mod encryption;
pub mod error;
pub mod job_ops;
pub mod names;
pub mod policy_requests;
pub mod properties;
pub mod retention;
pub mod task_requests;
pub mod wire;

pub use copy_requests::{
    CopyRequestContext, CopySpec, DayStart, DedupeCopySpec, FullSelection, GlobalDependentCopySpec,
    SecondaryCopySpec, SelectiveCopySpec, SelectiveFrequency, SnapCopySpec, TapePools,
};
pub use copy_summary::{CopyIndex, CopySummary, CopyType};
pub use encryption::{Cipher, EncryptionMode, EncryptionSettings, ReencryptionSetting};
pub use error::ValidationError;
pub use job_ops::{
    plan_legacy_batches, BatchJobRequest, JobChannel, JobIds, JobOperation, JobSelection,
    LEGACY_BATCH_LIMIT,
};
pub use names::{CopyId, EntityRef, NameKey, PolicyId, ResolvedRef};
pub use policy_requests::{
    DedupStoreSpec, GlobalDedupStore, GlobalPolicySpec, PolicyDataPath, StandardPolicySpec,
    TapePolicySpec,
};
pub use properties::{
    CopyFlags, CopyIdentity, CopyProperties, CopyReference, DataEncryption, DedupeFlags,
    ExtendedFlags, ExtendedRetentionRule, MediaAgentInfo, MediaProperties, MediaRefreshProperties,
    MonthCount, RetentionFlags, RetentionRules,
};
pub use retention::{
    ExtendedRetention, ExtendedRetentionKind, MediaRefreshSettings, RetentionSlot, RetentionUpdate,
    RETAIN_UNCHANGED,
};
pub use task_requests::{
    AuxCopyOptions, DataVerificationOptions, DdbMove, DdbVerification, JobsOnCopyFilter,
    JobsToVerify, ReconstructionMode,
};
