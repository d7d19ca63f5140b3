//! # Copy Summaries
//!
//! The per-copy facts a policy caches from its property listing, and the
//! case-insensitive index used to answer "which copies does this policy have".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::names::{CopyId, NameKey};
use crate::wire::{as_flag, as_i64, as_u64};

/// Copy kind, derived from the copy type code plus the snap/mirror/replica flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CopyType {
    Synchronous,
    Selective,
    Snap,
    Mirror,
    Replica,
}

impl CopyType {
    pub fn classify(type_code: &Value, is_snap: bool, is_mirror: bool, is_replica: bool) -> Self {
        if is_snap {
            if is_mirror {
                return CopyType::Mirror;
            }
            if is_replica {
                return CopyType::Replica;
            }
            return CopyType::Snap;
        }
        let selective = match type_code {
            Value::String(s) => s.eq_ignore_ascii_case("selective"),
            other => as_i64(other) == Some(2),
        };
        if selective {
            CopyType::Selective
        } else {
            CopyType::Synchronous
        }
    }
}

/// Cached facts about one copy of a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopySummary {
    pub copy_id: CopyId,
    /// Name as the service spells it.
    pub name: String,
    pub copy_type: CopyType,
    pub copy_precedence: u32,
    pub is_default: bool,
    pub is_snap_copy: bool,
    pub active: bool,
    pub library_name: Option<String>,
    /// Set when the copy writes into a global (shared) dedup store.
    pub uses_global_dedup_store: bool,
}

impl CopySummary {
    /// Reads one entry of the policy's `copy` array. Entries without an id or
    /// a name are skipped by the caller.
    pub fn from_wire(entry: &Value) -> Option<Self> {
        let identity = entry.get("StoragePolicyCopy")?;
        let copy_id = as_u64(identity.get("copyId")?)?;
        let name = identity.get("copyName")?.as_str()?.to_string();

        let is_snap_copy = entry.get("isSnapCopy").map(as_flag).unwrap_or(false);
        let is_mirror = entry.get("isMirrorCopy").map(as_flag).unwrap_or(false);
        let is_replica = entry
            .pointer("/extendedFlags/arrayReplicaCopy")
            .map(as_flag)
            .unwrap_or(false);
        let copy_type = CopyType::classify(
            entry.get("copyType").unwrap_or(&Value::Null),
            is_snap_copy,
            is_mirror,
            is_replica,
        );

        Some(CopySummary {
            copy_id: CopyId::new(copy_id),
            name,
            copy_type,
            copy_precedence: entry
                .get("copyPrecedence")
                .and_then(as_u64)
                .and_then(|p| u32::try_from(p).ok())
                .unwrap_or(0),
            is_default: entry.get("isDefault").map(as_flag).unwrap_or(false),
            is_snap_copy,
            active: entry.get("active").map(as_flag).unwrap_or(false),
            library_name: entry
                .pointer("/library/libraryName")
                .and_then(Value::as_str)
                .map(str::to_string),
            uses_global_dedup_store: entry
                .pointer("/dedupeFlags/useGlobalDedupStore")
                .and_then(as_i64)
                == Some(1),
        })
    }
}

// ============================================================================
// COPY INDEX
// ============================================================================

/// Copies of one policy keyed by case-insensitive name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyIndex {
    copies: BTreeMap<NameKey, CopySummary>,
}

impl CopyIndex {
    /// Builds the index from a policy property document (`{"copy": [...]}`).
    pub fn from_properties(properties: &Value) -> Self {
        let copies = properties
            .get("copy")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(CopySummary::from_wire)
                    .map(|summary| (NameKey::new(&summary.name), summary))
                    .collect()
            })
            .unwrap_or_default();
        CopyIndex { copies }
    }

    pub fn from_summaries(summaries: impl IntoIterator<Item = CopySummary>) -> Self {
        CopyIndex {
            copies: summaries
                .into_iter()
                .map(|s| (NameKey::new(&s.name), s))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.copies.contains_key(&NameKey::new(name))
    }

    pub fn get(&self, name: &str) -> Option<&CopySummary> {
        self.copies.get(&NameKey::new(name))
    }

    /// Like [`CopyIndex::get`] but reports a missing copy as a validation error.
    pub fn require(&self, name: &str) -> Result<&CopySummary, ValidationError> {
        self.get(name)
            .ok_or_else(|| ValidationError::CopyNotFound(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CopySummary> {
        self.copies.values()
    }

    pub fn primary(&self) -> Option<&CopySummary> {
        self.copies.values().find(|c| c.is_default)
    }

    /// The first snap copy by precedence. The service treats it as the source
    /// of every other snap copy.
    pub fn snap_primary(&self) -> Option<&CopySummary> {
        self.copies
            .values()
            .filter(|c| c.is_snap_copy)
            .min_by_key(|c| (c.copy_precedence, c.copy_id))
    }

    /// Secondary copies ordered by precedence. Excludes the primary copy and
    /// every snap copy.
    pub fn secondary(&self) -> Vec<&CopySummary> {
        let mut out: Vec<&CopySummary> = self
            .copies
            .values()
            .filter(|c| !c.is_default && !c.is_snap_copy)
            .collect();
        out.sort_by_key(|c| (c.copy_precedence, c.copy_id));
        out
    }

    /// Names of non-snap, non-primary copies.
    pub fn aux_copy_names(&self) -> Vec<String> {
        self.secondary().into_iter().map(|c| c.name.clone()).collect()
    }

    /// Name of the snap copy with the highest precedence value, if any.
    pub fn snap_copy_name(&self) -> Option<String> {
        self.copies
            .values()
            .filter(|c| c.is_snap_copy)
            .max_by_key(|c| (c.copy_precedence, c.copy_id))
            .map(|c| c.name.clone())
    }

    /// Checks that `name` exists and may be deleted.
    pub fn check_deletable(&self, name: &str) -> Result<&CopySummary, ValidationError> {
        let summary = self.require(name)?;
        if summary.is_default {
            return Err(ValidationError::PrimaryCopyDeletion(summary.name.clone()));
        }
        if self.snap_primary().map(|s| s.copy_id) == Some(summary.copy_id) {
            return Err(ValidationError::SnapPrimaryDeletion(summary.name.clone()));
        }
        Ok(summary)
    }
}
