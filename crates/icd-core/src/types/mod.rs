//! # Core Type Definitions
//!
//! This module contains the core types shared by every layer of the graph:
//! - Entity identifiers (`EntityId`)
//! - Classification levels (`ClassKind`)
//! - Error types (`IcdError`)
//!
//! ## Ordering Guarantees
//!
//! Identifiers implement `Ord` so the registry caches can stay in `BTreeMap`
//! and iterate in a stable order across runs.

use crate::primitives::{ENTITY_SEGMENT, MMS_SEGMENT, RESIDUAL_MARKERS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// ENTITY IDENTIFIER
// =============================================================================

/// Stable identifier of an entity inside the MMS linearization.
///
/// This is the part of the entity URI that follows `/mms/`, e.g.
/// `1646490591/other` for `http://id.who.int/icd/release/11/2024-01/mms/1646490591/other`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    /// Create a new identifier from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Derive the identifier from an entity URI.
    ///
    /// Linearization URIs carry the id after `/mms/`; foundation URIs (used by
    /// the cross-chapter relation lists) carry it after `/entity/`.
    /// Returns `None` when the URI has neither segment or the id is empty.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        let (_, tail) = uri
            .split_once(MMS_SEGMENT)
            .or_else(|| uri.split_once(ENTITY_SEGMENT))?;
        if tail.is_empty() {
            return None;
        }
        Some(Self(tail.to_string()))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Residual categories ("other specified" / "unspecified") are encoded in the id.
    #[must_use]
    pub fn is_residual(&self) -> bool {
        RESIDUAL_MARKERS
            .iter()
            .any(|marker| self.0.contains(marker))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CLASS KIND
// =============================================================================

/// Level of an entity in the classification hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    Chapter,
    Block,
    Category,
    Window,
}

impl ClassKind {
    /// The wire name of this class kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chapter => "chapter",
            Self::Block => "block",
            Self::Category => "category",
            Self::Window => "window",
        }
    }
}

impl FromStr for ClassKind {
    type Err = IcdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chapter" => Ok(Self::Chapter),
            "block" => Ok(Self::Block),
            "category" => Ok(Self::Category),
            "window" => Ok(Self::Window),
            other => Err(IcdError::DataIntegrity(format!(
                "unknown classKind \"{other}\""
            ))),
        }
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while exploring the classification.
///
/// - `NotFound` is recoverable and surfaced to the caller as-is
/// - `Connection` comes from the data source and is never retried here
/// - `DataIntegrity` means a payload broke the record contract
#[derive(Debug, Error)]
pub enum IcdError {
    /// The requested code, id or release does not exist for the language.
    #[error("{0}")]
    NotFound(String),

    /// The data source could not be reached or answered unexpectedly.
    #[error("Connection failure: {0}")]
    Connection(String),

    /// A record is missing a required field or carries an invalid value.
    #[error("Data integrity fault: {0}")]
    DataIntegrity(String),

    /// The configured release does not exist for the configured language.
    #[error("Release \"{release}\" was not found for language \"{language}\"")]
    ReleaseNotFound { release: String, language: String },

    /// Settings could not be read or are incomplete.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IcdError {
    /// Check whether this is the recoverable "does not exist" signal.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================
