// Deduplication flags of a copy.
//
// DASH full and the source-side disk cache only act on a deduplicated copy,
// and the disk cache is a DASH-full feature: turning DASH full off clears it.

use crate::error::ValidationError;
use crate::properties::CopyProperties;
use crate::wire::{bit, is_set};

impl CopyProperties {
    pub fn is_dedupe_enabled(&self) -> bool {
        is_set(self.dedupe_flags.enable_deduplication)
    }

    pub fn uses_global_dedup_store(&self) -> bool {
        is_set(self.dedupe_flags.use_global_dedup_store)
    }

    pub fn dash_full(&self) -> bool {
        is_set(self.dedupe_flags.enable_dash_full)
    }

    pub fn set_dash_full(&mut self, enabled: bool) -> Result<(), ValidationError> {
        if enabled && !self.is_dedupe_enabled() {
            return Err(ValidationError::DedupeDisabled { flag: "DASH full" });
        }
        if !enabled {
            self.dedupe_flags.enable_source_side_disk_cache = Some(0);
        }
        self.dedupe_flags.enable_dash_full = Some(bit(enabled));
        Ok(())
    }

    pub fn source_side_disk_cache(&self) -> bool {
        is_set(self.dedupe_flags.enable_source_side_disk_cache)
    }

    pub fn set_source_side_disk_cache(&mut self, enabled: bool) -> Result<(), ValidationError> {
        if enabled && !self.is_dedupe_enabled() {
            return Err(ValidationError::DedupeDisabled {
                flag: "source-side disk cache",
            });
        }
        self.dedupe_flags.enable_source_side_disk_cache = Some(bit(enabled));
        Ok(())
    }

    pub fn client_side_dedup(&self) -> bool {
        is_set(self.dedupe_flags.enable_client_side_dedup)
    }

    pub fn set_client_side_dedup(&mut self, enabled: bool) {
        self.dedupe_flags.enable_client_side_dedup = Some(bit(enabled));
    }

    pub fn store_priming(&self) -> bool {
        is_set(self.dedupe_flags.use_ddb_priming_option)
    }

    pub fn set_store_priming(&mut self, enabled: bool) {
        self.dedupe_flags.use_ddb_priming_option = Some(bit(enabled));
    }

    /// Whether jobs may run while some DDB partitions are offline.
    pub fn ddb_resiliency(&self) -> bool {
        is_set(self.dedupe_flags.allow_jobs_to_run_without_all_partitions)
    }

    pub fn minimum_partitions_for_jobs(&self) -> Option<u32> {
        self.minimum_number_of_partitions_for_jobs_to_run
    }

    /// Enables or disables DDB resiliency. Enabling needs at least one
    /// partition; the partition count is left alone when disabling.
    pub fn set_ddb_resiliency(
        &mut self,
        enabled: bool,
        min_partitions: u32,
    ) -> Result<(), ValidationError> {
        if enabled {
            if min_partitions < 1 {
                return Err(ValidationError::InvalidMinimumPartitions(min_partitions));
            }
            self.minimum_number_of_partitions_for_jobs_to_run = Some(min_partitions);
        }
        self.dedupe_flags.allow_jobs_to_run_without_all_partitions = Some(bit(enabled));
        Ok(())
    }
}
