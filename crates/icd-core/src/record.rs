//! # Record Module
//!
//! Validation of raw ICD-API payloads into `Record`s.
//!
//! - Optional text fields collapse to `""`, optional lists to `[]`
//! - Required fields (`@id`, `classKind`, `browserUrl`, `parent` for
//!   non-chapters) raise `IcdError::DataIntegrity` when absent
//! - Relationship URIs are reduced to `Reference`s carrying the derived id

use crate::{ClassKind, EntityId, IcdError};
use serde::Deserialize;
use serde_json::Value;

// =============================================================================
// WIRE SHAPES
// =============================================================================

/// Language-tagged text, e.g. `{"@language": "en", "@value": "Cholera"}`.
#[derive(Debug, Deserialize)]
struct LangText {
    #[serde(rename = "@value", default)]
    value: String,
}

/// An entry carrying only a label (index terms, inclusions).
#[derive(Debug, Deserialize)]
struct Labelled {
    label: Option<LangText>,
}

/// An entry pointing into the linearization (exclusions, children elsewhere).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinearizationEntry {
    label: Option<LangText>,
    linearization_reference: Option<String>,
}

/// The payload exactly as the ICD-API returns it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(rename = "@id")]
    id: Option<String>,
    code: Option<String>,
    title: Option<LangText>,
    definition: Option<LangText>,
    long_definition: Option<LangText>,
    fully_specified_name: Option<LangText>,
    diagnostic_criteria: Option<LangText>,
    coding_note: Option<LangText>,
    block_id: Option<String>,
    code_range: Option<String>,
    class_kind: Option<String>,
    #[serde(default)]
    child: Vec<String>,
    #[serde(default)]
    foundation_child_elsewhere: Vec<LinearizationEntry>,
    #[serde(default)]
    parent: Vec<String>,
    #[serde(default)]
    index_term: Vec<Labelled>,
    #[serde(default)]
    inclusion: Vec<Labelled>,
    #[serde(default)]
    exclusion: Vec<LinearizationEntry>,
    #[serde(default)]
    related_entities_in_maternal_chapter: Vec<String>,
    #[serde(default)]
    related_entities_in_perinatal_chapter: Vec<String>,
    browser_url: Option<String>,
}

// =============================================================================
// VALIDATED RECORD
// =============================================================================

/// A reference to another entity, discovered inside a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Id derived from the referenced URI.
    pub id: EntityId,
    /// The referenced URI as it appeared in the payload.
    pub uri: String,
    /// Label shipped alongside the reference, if any.
    pub label: Option<String>,
}

impl Reference {
    /// Build a reference from a URI, failing loudly if no id can be derived.
    pub fn from_uri(uri: &str, label: Option<String>) -> Result<Self, IcdError> {
        let id = EntityId::from_uri(uri).ok_or_else(|| {
            IcdError::DataIntegrity(format!("cannot derive an entity id from \"{uri}\""))
        })?;
        Ok(Self {
            id,
            uri: uri.to_string(),
            label,
        })
    }
}

/// A validated entity record, ready to be registered in the graph.
///
/// String values for fields missing from the payload are empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: EntityId,
    pub uri: String,
    pub code: String,
    pub title: String,
    pub definition: String,
    pub long_definition: String,
    pub fully_specified_name: String,
    pub diagnostic_criteria: String,
    pub coding_note: String,
    pub block_id: String,
    pub code_range: String,
    pub class_kind: ClassKind,
    pub children: Vec<Reference>,
    pub children_elsewhere: Vec<Reference>,
    /// Always `None` for chapters.
    pub parent: Option<Reference>,
    pub index_terms: Vec<String>,
    pub inclusions: Vec<String>,
    pub exclusions: Vec<Reference>,
    pub maternal_chapter_relations: Vec<Reference>,
    pub perinatal_chapter_relations: Vec<Reference>,
    pub browser_url: String,
}

impl Record {
    /// Validate a raw payload.
    ///
    /// # Errors
    ///
    /// Returns `IcdError::DataIntegrity` if the payload is not an entity
    /// object or misses a required field.
    pub fn from_value(value: Value) -> Result<Self, IcdError> {
        let raw: RawRecord = serde_json::from_value(value)
            .map_err(|e| IcdError::DataIntegrity(format!("malformed record: {e}")))?;

        let uri = raw
            .id
            .ok_or_else(|| IcdError::DataIntegrity("record has no @id".to_string()))?;
        let id = EntityId::from_uri(&uri).ok_or_else(|| {
            IcdError::DataIntegrity(format!("cannot derive an entity id from \"{uri}\""))
        })?;
        let class_kind: ClassKind = raw
            .class_kind
            .ok_or_else(|| IcdError::DataIntegrity(format!("record {id} has no classKind")))?
            .parse()?;
        let browser_url = raw
            .browser_url
            .ok_or_else(|| IcdError::DataIntegrity(format!("record {id} has no browserUrl")))?;

        // Chapters hang off the linearization root, which is not an entity.
        let parent = match class_kind {
            ClassKind::Chapter => None,
            _ => {
                let first = raw.parent.first().ok_or_else(|| {
                    IcdError::DataIntegrity(format!("{class_kind} {id} has no parent"))
                })?;
                Some(Reference::from_uri(first, None)?)
            }
        };

        Ok(Self {
            code: raw.code.unwrap_or_default(),
            title: text(raw.title),
            definition: text(raw.definition),
            long_definition: text(raw.long_definition),
            fully_specified_name: text(raw.fully_specified_name),
            diagnostic_criteria: text(raw.diagnostic_criteria),
            coding_note: text(raw.coding_note),
            block_id: raw.block_id.unwrap_or_default(),
            code_range: raw.code_range.unwrap_or_default(),
            class_kind,
            children: uris(&raw.child)?,
            children_elsewhere: linearization_refs(raw.foundation_child_elsewhere)?,
            parent,
            index_terms: labels(raw.index_term),
            inclusions: labels(raw.inclusion),
            exclusions: linearization_refs(raw.exclusion)?,
            maternal_chapter_relations: uris(&raw.related_entities_in_maternal_chapter)?,
            perinatal_chapter_relations: uris(&raw.related_entities_in_perinatal_chapter)?,
            browser_url,
            id,
            uri,
        })
    }
}

fn text(field: Option<LangText>) -> String {
    field.map(|t| t.value).unwrap_or_default()
}

fn labels(entries: Vec<Labelled>) -> Vec<String> {
    entries
        .into_iter()
        .filter_map(|entry| entry.label.map(|l| l.value))
        .collect()
}

fn uris(entries: &[String]) -> Result<Vec<Reference>, IcdError> {
    entries
        .iter()
        .map(|uri| Reference::from_uri(uri, None))
        .collect()
}

/// Entries without a linearization reference point outside the MMS and are dropped.
fn linearization_refs(entries: Vec<LinearizationEntry>) -> Result<Vec<Reference>, IcdError> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let uri = entry.linearization_reference?;
            Some(Reference::from_uri(&uri, entry.label.map(|l| l.value)))
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
