//! # icd-core
//!
//! A lazy, caching graph over the ICD-11 Mortality and Morbidity Statistics
//! (MMS) linearization.
//!
//! Entities are fetched on demand through a `DataSource` and cached in a
//! per-session `Registry`. Entities discovered only by reference (children,
//! parents, exclusions) enter the graph as `Deferred` stubs and are
//! materialized the first time one of their unfetched attributes is read.
//!
//! ## Architectural Constraints
//!
//! - At most one node per entity id per Explorer
//! - Relationships are stored as ids into the registry, never as owned nodes
//! - The core has NO network dependencies; transport lives behind `DataSource`
//! - Every failure is an `IcdError`; nothing panics on bad payloads

// =============================================================================
// MODULES
// =============================================================================

pub mod entity;
pub mod explorer;
pub mod graph;
pub mod primitives;
pub mod record;
pub mod source;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{ClassKind, EntityId, IcdError};

// =============================================================================
// RE-EXPORTS: Graph
// =============================================================================

pub use entity::Entity;
pub use explorer::{Explorer, ExplorerConfig};
pub use graph::{DeferredEntity, Node, Registry, ResolvedEntity};
pub use record::{Record, Reference};
pub use source::{DataSource, InMemorySource};
