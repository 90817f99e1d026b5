//! # Report Types
//!
//! Serializable views of entities, printed by the CLI in `--json-mode`.

use icd_core::{Entity, IcdError};
use serde::{Deserialize, Serialize};

// =============================================================================
// ENTITY REFERENCES
// =============================================================================

/// Short form of an entity, used in lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    /// Empty for blocks outside code-range mode.
    pub code: String,
    pub title: String,
}

impl EntityRef {
    /// Build the short form, resolving the entity if needed.
    pub fn from_entity(entity: &Entity<'_>) -> Result<Self, IcdError> {
        Ok(Self {
            id: entity.id().to_string(),
            code: entity.code()?,
            title: entity.title()?,
        })
    }

    /// Build short forms for a list of entities.
    pub fn from_entities(entities: &[Entity<'_>]) -> Result<Vec<Self>, IcdError> {
        entities.iter().map(Self::from_entity).collect()
    }

    /// One line for text output: `CODE  Title  (id)`.
    #[must_use]
    pub fn line(&self) -> String {
        if self.code.is_empty() {
            format!("{}  ({})", self.title, self.id)
        } else {
            format!("{}  {}  ({})", self.code, self.title, self.id)
        }
    }
}

// =============================================================================
// FULL ENTITY
// =============================================================================

/// Every scalar of an entity plus its immediate neighbourhood as ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReport {
    pub id: String,
    pub uri: String,
    pub code: String,
    pub title: String,
    pub class_kind: String,
    pub is_residual: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub definition: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub long_definition: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fully_specified_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub diagnostic_criteria: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub coding_note: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub block_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code_range: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub children_elsewhere: Vec<String>,
    pub index_terms: Vec<String>,
    pub inclusions: Vec<String>,
    pub exclusions: Vec<String>,
    pub browser_url: String,
}

impl EntityReport {
    /// Gather the report. Only the entity itself is fetched.
    pub fn from_entity(entity: &Entity<'_>) -> Result<Self, IcdError> {
        Ok(Self {
            id: entity.id().to_string(),
            uri: entity.uri(),
            code: entity.code()?,
            title: entity.title()?,
            class_kind: entity.class_kind()?.to_string(),
            is_residual: entity.is_residual(),
            definition: entity.definition()?,
            long_definition: entity.long_definition()?,
            fully_specified_name: entity.fully_specified_name()?,
            diagnostic_criteria: entity.diagnostic_criteria()?,
            coding_note: entity.coding_note(false)?,
            block_id: entity.block_id()?,
            code_range: entity.code_range()?,
            parent: entity.parent()?.map(|p| p.id().to_string()),
            children: ids(&entity.children(false)?),
            children_elsewhere: ids(&entity.children_elsewhere()?),
            index_terms: entity.index_terms()?,
            inclusions: entity.inclusions()?,
            exclusions: ids(&entity.exclusions(false)?),
            browser_url: entity.browser_url()?,
        })
    }
}

fn ids(entities: &[Entity<'_>]) -> Vec<String> {
    entities.iter().map(|e| e.id().to_string()).collect()
}

// =============================================================================
// COMMAND REPORTS
// =============================================================================

/// A relation listing: children, descendants, ancestors or exclusions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationReport {
    pub entity: EntityRef,
    pub relation: String,
    pub count: usize,
    pub entities: Vec<EntityRef>,
}

impl RelationReport {
    pub fn new(entity: EntityRef, relation: impl Into<String>, entities: Vec<EntityRef>) -> Self {
        Self {
            entity,
            relation: relation.into(),
            count: entities.len(),
            entities,
        }
    }
}

/// A coding note, local or inherited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodingNoteReport {
    pub entity: EntityRef,
    pub include_from_upper_levels: bool,
    pub coding_note: String,
}

/// Result of a validity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    /// `code` or `id`.
    pub kind: String,
    pub value: String,
    pub valid: bool,
}

/// The release a session runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReport {
    pub release: String,
    pub language: String,
    pub use_code_ranges_as_codes: bool,
}
