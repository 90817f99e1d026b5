//! # Data Source
//!
//! The lookup contract between the graph and whatever serves ICD-11 records.
//!
//! The graph never talks to the network itself. Every record enters through a
//! `DataSource`, which either returns the raw payload or signals
//! `IcdError::NotFound` / `IcdError::Connection`.
//!
//! `InMemorySource` is a self-contained implementation backed by a map of
//! payloads. It counts lookups so callers can observe fetch behaviour.

use crate::{EntityId, IcdError};
use serde_json::Value;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

// =============================================================================
// DATASOURCE TRAIT
// =============================================================================

/// Source of raw entity payloads for one linearization.
///
/// Every method may fail with `IcdError::Connection` at any point.
pub trait DataSource {
    /// Return the payload of the entity with the given code.
    ///
    /// Fails with `IcdError::NotFound` if no entity has that code.
    fn lookup_code(&self, code: &str, release: &str, language: &str) -> Result<Value, IcdError>;

    /// Return the payload of the entity with the given id.
    ///
    /// Fails with `IcdError::NotFound` if no entity has that id.
    fn lookup_id(&self, id: &str, release: &str, language: &str) -> Result<Value, IcdError>;

    /// Return the name of the latest release available in the language.
    fn latest_release(&self, language: &str) -> Result<String, IcdError>;

    /// Check whether the release exists in the language.
    fn check_release(&self, release: &str, language: &str) -> Result<bool, IcdError>;
}

impl<T: DataSource + ?Sized> DataSource for Rc<T> {
    fn lookup_code(&self, code: &str, release: &str, language: &str) -> Result<Value, IcdError> {
        (**self).lookup_code(code, release, language)
    }

    fn lookup_id(&self, id: &str, release: &str, language: &str) -> Result<Value, IcdError> {
        (**self).lookup_id(id, release, language)
    }

    fn latest_release(&self, language: &str) -> Result<String, IcdError> {
        (**self).latest_release(language)
    }

    fn check_release(&self, release: &str, language: &str) -> Result<bool, IcdError> {
        (**self).check_release(release, language)
    }
}

impl<T: DataSource + ?Sized> DataSource for Box<T> {
    fn lookup_code(&self, code: &str, release: &str, language: &str) -> Result<Value, IcdError> {
        (**self).lookup_code(code, release, language)
    }

    fn lookup_id(&self, id: &str, release: &str, language: &str) -> Result<Value, IcdError> {
        (**self).lookup_id(id, release, language)
    }

    fn latest_release(&self, language: &str) -> Result<String, IcdError> {
        (**self).latest_release(language)
    }

    fn check_release(&self, release: &str, language: &str) -> Result<bool, IcdError> {
        (**self).check_release(release, language)
    }
}

// =============================================================================
// IN-MEMORY SOURCE
// =============================================================================

/// A `DataSource` serving payloads from memory.
///
/// Releases are registered per language; the last one registered for a
/// language is its latest. Payloads are served for every known release.
#[derive(Debug, Default)]
pub struct InMemorySource {
    /// Payload storage: id -> raw record
    records: BTreeMap<EntityId, Value>,

    /// Code index: code -> id
    codes: BTreeMap<String, EntityId>,

    /// Known releases: language -> releases, oldest first
    releases: BTreeMap<String, Vec<String>>,

    code_lookups: Cell<usize>,
    id_lookups: Cell<usize>,

    /// When set, every call fails with `IcdError::Connection`.
    offline: Cell<bool>,
}

impl InMemorySource {
    /// Create an empty source with no releases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a release for a language.
    #[must_use]
    pub fn with_release(mut self, language: &str, release: &str) -> Self {
        self.releases
            .entry(language.to_string())
            .or_default()
            .push(release.to_string());
        self
    }

    /// Store a payload, indexing it by the id in its `@id` and by its `code`.
    ///
    /// # Errors
    ///
    /// Returns `IcdError::DataIntegrity` if the payload has no usable `@id`.
    pub fn insert(&mut self, record: Value) -> Result<EntityId, IcdError> {
        let id = record
            .get("@id")
            .and_then(Value::as_str)
            .and_then(EntityId::from_uri)
            .ok_or_else(|| IcdError::DataIntegrity("payload has no usable @id".to_string()))?;
        if let Some(code) = record.get("code").and_then(Value::as_str)
            && !code.is_empty()
        {
            self.codes.insert(code.to_string(), id.clone());
        }
        self.records.insert(id.clone(), record);
        Ok(id)
    }

    /// Number of `lookup_code` calls served so far.
    #[must_use]
    pub fn code_lookups(&self) -> usize {
        self.code_lookups.get()
    }

    /// Number of `lookup_id` calls served so far.
    #[must_use]
    pub fn id_lookups(&self) -> usize {
        self.id_lookups.get()
    }

    /// Simulate losing (or regaining) the connection.
    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    fn ensure_online(&self) -> Result<(), IcdError> {
        if self.offline.get() {
            return Err(IcdError::Connection("in-memory source is offline".to_string()));
        }
        Ok(())
    }

    fn ensure_release(&self, release: &str, language: &str) -> Result<(), IcdError> {
        if self.check_release(release, language)? {
            Ok(())
        } else {
            Err(IcdError::NotFound(format!(
                "Release {release} was not found in language {language}."
            )))
        }
    }
}

impl DataSource for InMemorySource {
    fn lookup_code(&self, code: &str, release: &str, language: &str) -> Result<Value, IcdError> {
        self.ensure_online()?;
        self.code_lookups.set(self.code_lookups.get().saturating_add(1));
        self.ensure_release(release, language)?;
        self.codes
            .get(code)
            .and_then(|id| self.records.get(id))
            .cloned()
            .ok_or_else(|| {
                IcdError::NotFound(format!(
                    "No ICD-11 entity with code {code} was found for release {release} in language {language}."
                ))
            })
    }

    fn lookup_id(&self, id: &str, release: &str, language: &str) -> Result<Value, IcdError> {
        self.ensure_online()?;
        self.id_lookups.set(self.id_lookups.get().saturating_add(1));
        self.ensure_release(release, language)?;
        self.records
            .get(&EntityId::new(id))
            .cloned()
            .ok_or_else(|| {
                IcdError::NotFound(format!(
                    "No ICD-11 entity with id {id} was found for release {release} in language {language}."
                ))
            })
    }

    fn latest_release(&self, language: &str) -> Result<String, IcdError> {
        self.ensure_online()?;
        self.releases
            .get(language)
            .and_then(|releases| releases.last())
            .cloned()
            .ok_or_else(|| {
                IcdError::NotFound(format!("Could not find any release for language {language}."))
            })
    }

    fn check_release(&self, release: &str, language: &str) -> Result<bool, IcdError> {
        self.ensure_online()?;
        Ok(self
            .releases
            .get(language)
            .is_some_and(|releases| releases.iter().any(|r| r == release)))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> InMemorySource {
        let mut source = InMemorySource::new()
            .with_release("en", "2023-01")
            .with_release("en", "2024-01");
        source
            .insert(json!({
                "@id": "http://id.who.int/icd/release/11/2024-01/mms/218513628",
                "code": "9B71.1",
                "classKind": "category"
            }))
            .expect("insert");
        source
    }

    #[test]
    fn latest_release_is_last_registered() {
        assert_eq!(source().latest_release("en").expect("latest"), "2024-01");
    }

    #[test]
    fn unknown_language_has_no_release() {
        let result = source().latest_release("onion");
        assert!(matches!(result, Err(IcdError::NotFound(_))));
    }

    #[test]
    fn check_release() {
        let source = source();
        assert!(source.check_release("2023-01", "en").expect("check"));
        assert!(!source.check_release("3124-01", "en").expect("check"));
    }

    #[test]
    fn lookups_by_code_and_id() {
        let source = source();
        let by_code = source.lookup_code("9B71.1", "2024-01", "en").expect("code");
        let by_id = source.lookup_id("218513628", "2024-01", "en").expect("id");
        assert_eq!(by_code, by_id);
        assert_eq!(source.code_lookups(), 1);
        assert_eq!(source.id_lookups(), 1);
    }

    #[test]
    fn missing_entities_are_not_found() {
        let source = source();
        assert!(matches!(
            source.lookup_code("banana", "2024-01", "en"),
            Err(IcdError::NotFound(_))
        ));
        assert!(matches!(
            source.lookup_id("5", "2024-01", "en"),
            Err(IcdError::NotFound(_))
        ));
    }

    #[test]
    fn offline_source_fails_with_connection() {
        let source = source();
        source.set_offline(true);
        assert!(matches!(
            source.lookup_id("218513628", "2024-01", "en"),
            Err(IcdError::Connection(_))
        ));
        source.set_offline(false);
        assert!(source.lookup_id("218513628", "2024-01", "en").is_ok());
    }

    #[test]
    fn shared_source_through_rc() {
        let source = Rc::new(source());
        let shared: Box<dyn DataSource> = Box::new(Rc::clone(&source));
        shared.lookup_id("218513628", "2024-01", "en").expect("id");
        assert_eq!(source.id_lookups(), 1);
    }
}
