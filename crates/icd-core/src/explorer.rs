//! # Explorer Module
//!
//! The per-release, per-language entry point to the graph.
//!
//! The Explorer owns the `Registry` and the `DataSource`. It resolves codes
//! and ids to `Entity` handles, fetching and registering records on cache
//! misses, and materializes stubs on behalf of the handles.
//!
//! ## Threading
//!
//! The registry lives in a `RefCell`: one Explorer is driven by one thread.
//! Callers that need several threads should create one Explorer per thread.

use crate::entity::Entity;
use crate::graph::{Node, Registry, ResolvedEntity};
use crate::primitives::{CODE_RANGE_SEPARATOR, MAX_ANCESTOR_DEPTH};
use crate::record::Record;
use crate::source::DataSource;
use crate::{EntityId, IcdError};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Parameters fixed for the lifetime of an Explorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerConfig {
    /// Language of the returned texts, e.g. `en`.
    pub language: String,
    /// Release name, e.g. `2024-01`; `None` means the latest release.
    pub release: Option<String>,
    /// Address blocks by their code range (e.g. `1A00-1A09`).
    pub use_code_ranges_as_codes: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            release: None,
            use_code_ranges_as_codes: false,
        }
    }
}

impl ExplorerConfig {
    /// Create a configuration for the latest release in the language.
    #[must_use]
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Self::default()
        }
    }

    /// Pin a release instead of using the latest one.
    #[must_use]
    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    /// Enable or disable code-range addressing of blocks.
    #[must_use]
    pub fn with_code_ranges_as_codes(mut self, enabled: bool) -> Self {
        self.use_code_ranges_as_codes = enabled;
        self
    }
}

// =============================================================================
// EXPLORER
// =============================================================================

/// An exploration session over one release in one language.
pub struct Explorer {
    source: Box<dyn DataSource>,
    language: String,
    release: String,
    registry: RefCell<Registry>,
}

impl fmt::Debug for Explorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Explorer")
            .field("language", &self.language)
            .field("release", &self.release)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Explorer {
    /// Create an Explorer, validating the release or resolving the latest one.
    ///
    /// # Errors
    ///
    /// Returns `IcdError::ReleaseNotFound` if the configured release does not
    /// exist for the language, or whatever the data source raises.
    pub fn new(source: impl DataSource + 'static, config: ExplorerConfig) -> Result<Self, IcdError> {
        let ExplorerConfig {
            language,
            release,
            use_code_ranges_as_codes,
        } = config;

        let release = match release {
            Some(release) => {
                if !source.check_release(&release, &language)? {
                    return Err(IcdError::ReleaseNotFound { release, language });
                }
                release
            }
            None => source.latest_release(&language)?,
        };
        tracing::debug!(%release, %language, use_code_ranges_as_codes, "explorer ready");

        Ok(Self {
            source: Box::new(source),
            language,
            release,
            registry: RefCell::new(Registry::new(use_code_ranges_as_codes)),
        })
    }

    /// The language of this session.
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// The release of this session (resolved if "latest" was requested).
    #[must_use]
    pub fn release(&self) -> &str {
        &self.release
    }

    /// Whether blocks are addressed by their code range.
    #[must_use]
    pub fn uses_code_ranges_as_codes(&self) -> bool {
        self.registry.borrow().uses_code_ranges_as_codes()
    }

    /// Number of cached nodes, stubs included.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.registry.borrow().node_count()
    }

    /// Number of cached nodes that have been materialized.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.registry.borrow().resolved_count()
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Check whether the code exists, fetching and caching it if needed.
    ///
    /// # Errors
    ///
    /// Only connection and integrity failures; "not found" becomes `false`.
    pub fn is_valid_code(&self, code: &str) -> Result<bool, IcdError> {
        if self.cached_code(code).is_some() {
            return Ok(true);
        }
        let result = if self.is_code_range(code) {
            self.code_range_entity(code).map(|_| ())
        } else {
            self.fetch_code(code).map(|_| ())
        };
        not_found_as_false(result)
    }

    /// Check whether the id exists, fetching and caching it if needed.
    ///
    /// # Errors
    ///
    /// Only connection and integrity failures; "not found" becomes `false`.
    pub fn is_valid_id(&self, id: &str) -> Result<bool, IcdError> {
        if self.registry.borrow().contains(&EntityId::new(id)) {
            return Ok(true);
        }
        not_found_as_false(self.fetch_id(id).map(|_| ()))
    }

    /// Get the entity with the given code.
    ///
    /// # Errors
    ///
    /// Returns `IcdError::NotFound` if the code does not exist in this release.
    pub fn entity_from_code(&self, code: &str) -> Result<Entity<'_>, IcdError> {
        if let Some(id) = self.cached_code(code) {
            tracing::trace!(code, %id, "code cache hit");
            return Ok(self.handle(id));
        }
        if self.is_code_range(code) {
            return self.code_range_entity(code);
        }
        let id = self.fetch_code(code)?;
        Ok(self.handle(id))
    }

    /// Get the entity with the given id.
    ///
    /// A cached stub is returned as-is; it resolves on first use.
    ///
    /// # Errors
    ///
    /// Returns `IcdError::NotFound` if the id does not exist in this release.
    pub fn entity_from_id(&self, id: &str) -> Result<Entity<'_>, IcdError> {
        let id = EntityId::new(id);
        if self.registry.borrow().contains(&id) {
            tracing::trace!(%id, "id cache hit");
            return Ok(self.handle(id));
        }
        let id = self.fetch_id(id.as_str())?;
        Ok(self.handle(id))
    }

    // =========================================================================
    // CODE RANGES
    // =========================================================================

    fn is_code_range(&self, code: &str) -> bool {
        self.uses_code_ranges_as_codes() && code.contains(CODE_RANGE_SEPARATOR)
    }

    /// Resolve a code range through the ancestors of its first code.
    fn code_range_entity(&self, range: &str) -> Result<Entity<'_>, IcdError> {
        let not_found = || {
            IcdError::NotFound(format!(
                "Code range \"{range}\" was not found for release \"{}\" in language \"{}\".",
                self.release, self.language
            ))
        };

        let head = range
            .split_once(CODE_RANGE_SEPARATOR)
            .map_or(range, |(head, _)| head);
        if head.is_empty() || !self.is_valid_code(head)? {
            return Err(not_found());
        }

        let mut current = self.entity_from_code(head)?.parent()?;
        let mut steps = 0usize;
        while let Some(entity) = current {
            if entity.code()? == range {
                return Ok(entity);
            }
            steps = steps.saturating_add(1);
            if steps >= MAX_ANCESTOR_DEPTH {
                break;
            }
            current = entity.parent()?;
        }
        Err(not_found())
    }

    // =========================================================================
    // FETCH & REGISTER
    // =========================================================================

    fn cached_code(&self, code: &str) -> Option<EntityId> {
        self.registry.borrow().id_for_code(code).cloned()
    }

    fn fetch_code(&self, code: &str) -> Result<EntityId, IcdError> {
        tracing::debug!(code, release = %self.release, "fetching entity by code");
        let raw = self
            .source
            .lookup_code(code, &self.release, &self.language)?;
        self.register(raw)
    }

    fn fetch_id(&self, id: &str) -> Result<EntityId, IcdError> {
        tracing::debug!(id, release = %self.release, "fetching entity by id");
        let raw = self.source.lookup_id(id, &self.release, &self.language)?;
        self.register(raw)
    }

    fn register(&self, raw: Value) -> Result<EntityId, IcdError> {
        let record = Record::from_value(raw)?;
        Ok(self.registry.borrow_mut().register_or_get(&record))
    }

    // =========================================================================
    // NODE ACCESS (for Entity handles)
    // =========================================================================

    pub(crate) fn handle(&self, id: EntityId) -> Entity<'_> {
        Entity::new(self, id)
    }

    pub(crate) fn handles(&self, ids: Vec<EntityId>) -> Vec<Entity<'_>> {
        ids.into_iter().map(|id| self.handle(id)).collect()
    }

    /// Read from a node without resolving it.
    pub(crate) fn peek<T>(&self, id: &EntityId, f: impl FnOnce(&Node) -> T) -> Option<T> {
        self.registry.borrow().get(id).map(f)
    }

    /// Materialize a stub: fetch it by id and register the record.
    ///
    /// No-op if the id is already resolved. On failure the stub stays as it
    /// was and the next call tries again.
    pub(crate) fn materialize(&self, id: &EntityId) -> Result<(), IcdError> {
        if self.registry.borrow().is_resolved(id) {
            return Ok(());
        }
        tracing::debug!(%id, "resolving stub");
        let registered = self.fetch_id(id.as_str())?;
        if registered != *id {
            return Err(IcdError::DataIntegrity(format!(
                "lookup of id {id} returned entity {registered}"
            )));
        }
        Ok(())
    }

    /// Read from the resolved form of a node, materializing it first if needed.
    pub(crate) fn with_resolved<T>(
        &self,
        id: &EntityId,
        f: impl FnOnce(&ResolvedEntity) -> T,
    ) -> Result<T, IcdError> {
        self.materialize(id)?;
        let registry = self.registry.borrow();
        registry
            .resolved(id)
            .map(f)
            .ok_or_else(|| IcdError::DataIntegrity(format!("entity {id} did not resolve")))
    }

    /// The parent id, taken from local knowledge when possible.
    pub(crate) fn parent_id(&self, id: &EntityId) -> Result<Option<EntityId>, IcdError> {
        let known = self
            .peek(id, |node| node.known_parent().map(|p| p.cloned()))
            .flatten();
        match known {
            Some(parent) => Ok(parent),
            None => self.with_resolved(id, |entity| entity.parent.clone()),
        }
    }
}

fn not_found_as_false(result: Result<(), IcdError>) -> Result<bool, IcdError> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

// =============================================================================
// TESTS
// =============================================================================
