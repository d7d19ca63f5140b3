//! Identifiers and name keys.
//!
//! Policy and copy names are case-insensitive on the service. [`NameKey`] is
//! the single place that folds case, so caches keyed by it behave the same no
//! matter how a caller spells a name.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Case-insensitive key for policy and copy names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameKey(String);

impl NameKey {
    pub fn new(name: &str) -> Self {
        NameKey(name.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NameKey {
    fn from(s: &str) -> Self {
        NameKey::new(s)
    }
}

impl From<String> for NameKey {
    fn from(s: String) -> Self {
        NameKey::new(&s)
    }
}

impl std::fmt::Display for NameKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned storage policy id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyId(u64);

impl PolicyId {
    pub fn new(id: u64) -> Self {
        PolicyId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for PolicyId {
    fn from(id: u64) -> Self {
        PolicyId(id)
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned copy id, unique within the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CopyId(u64);

impl CopyId {
    pub fn new(id: u64) -> Self {
        CopyId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CopyId {
    fn from(id: u64) -> Self {
        CopyId(id)
    }
}

impl std::fmt::Display for CopyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ENTITY REFERENCES
// ============================================================================

/// A library, media agent or pool as accepted at the API boundary: by name,
/// by id, or already resolved to both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Name(String),
    Id(u64),
    Resolved { id: u64, name: String },
}

impl EntityRef {
    /// Resolves the reference once, rejecting blank names.
    pub fn resolve(&self, field: &'static str) -> Result<ResolvedRef, ValidationError> {
        match self {
            EntityRef::Name(name) => {
                if name.trim().is_empty() {
                    return Err(ValidationError::empty(field));
                }
                Ok(ResolvedRef {
                    id: None,
                    name: Some(name.trim().to_string()),
                })
            }
            EntityRef::Id(id) => Ok(ResolvedRef {
                id: Some(*id),
                name: None,
            }),
            EntityRef::Resolved { id, name } => {
                if name.trim().is_empty() {
                    return Err(ValidationError::empty(field));
                }
                Ok(ResolvedRef {
                    id: Some(*id),
                    name: Some(name.trim().to_string()),
                })
            }
        }
    }
}

impl From<&str> for EntityRef {
    fn from(s: &str) -> Self {
        EntityRef::Name(s.to_string())
    }
}

impl From<String> for EntityRef {
    fn from(s: String) -> Self {
        EntityRef::Name(s)
    }
}

impl From<u64> for EntityRef {
    fn from(id: u64) -> Self {
        EntityRef::Id(id)
    }
}

/// A validated entity reference. At least one of `id` and `name` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRef {
    id: Option<u64>,
    name: Option<String>,
}

impl ResolvedRef {
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Renders the reference under the given id and name keys, e.g.
    /// `{"libraryId": 3}` or `{"mediaAgentName": "ma1"}`.
    pub fn to_json(&self, id_key: &str, name_key: &str) -> Value {
        let mut out = Map::new();
        if let Some(id) = self.id {
            out.insert(id_key.to_string(), Value::from(id));
        }
        if let Some(name) = &self.name {
            out.insert(name_key.to_string(), Value::from(name.clone()));
        }
        Value::Object(out)
    }

    /// Display form used in legacy name-only payloads.
    pub fn label(&self) -> String {
        match (&self.name, self.id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => id.to_string(),
            (None, None) => String::new(),
        }
    }
}
