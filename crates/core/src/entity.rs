use serde::{Deserialize, Serialize};

use crate::{AppResult, NonEmptyString};

/// Minimal identity of a remote record: its entity type and integer id.
///
/// Two flavors flow through query-field resolution: the parent entity (the
/// record whose field is being computed) and the logged-in user. Both are
/// optional at the call sites, so absence is modeled there, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    entity_type: NonEmptyString,
    id: i64,
}

impl EntityRef {
    /// Creates an entity reference with a validated entity type.
    pub fn new(entity_type: impl Into<String>, id: i64) -> AppResult<Self> {
        Ok(Self {
            entity_type: NonEmptyString::new(entity_type)?,
            id,
        })
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        self.entity_type.as_str()
    }

    /// Returns the record id.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.id
    }
}
