//! # Graph Registry
//!
//! The entity arena for the ICD-11 graph.
//!
//! The `Registry` owns every node. Relationships between nodes are stored as
//! `EntityId`s into the arena, never as owning references, so promoting a
//! stub to a resolved node is a single table update visible to every holder
//! of that id. All maps are `BTreeMap` for deterministic iteration.

use crate::record::{Record, Reference};
use crate::{ClassKind, EntityId};
use std::collections::BTreeMap;

// =============================================================================
// NODES
// =============================================================================

/// An entity known only by reference, not fetched yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredEntity {
    pub id: EntityId,
    pub uri: String,
    /// Label shipped with the referencing record, if any.
    pub title: Option<String>,
    /// Set once, by the first record that lists this entity as a child.
    pub parent: Option<EntityId>,
}

/// A fully materialized entity.
///
/// String values for fields missing from the record are empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
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
    pub children: Vec<EntityId>,
    pub children_elsewhere: Vec<EntityId>,
    pub parent: Option<EntityId>,
    pub index_terms: Vec<String>,
    pub inclusions: Vec<String>,
    pub exclusions: Vec<EntityId>,
    pub maternal_chapter_relations: Vec<EntityId>,
    pub perinatal_chapter_relations: Vec<EntityId>,
    pub browser_url: String,
}

/// A slot in the arena: either a stub or the materialized entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Deferred(DeferredEntity),
    Resolved(Box<ResolvedEntity>),
}

impl Node {
    /// The id of this node, available in both states.
    #[must_use]
    pub fn id(&self) -> &EntityId {
        match self {
            Self::Deferred(stub) => &stub.id,
            Self::Resolved(entity) => &entity.id,
        }
    }

    /// The URI of this node, available in both states.
    #[must_use]
    pub fn uri(&self) -> &str {
        match self {
            Self::Deferred(stub) => &stub.uri,
            Self::Resolved(entity) => &entity.uri,
        }
    }

    /// Check if this node has been materialized.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// The title if it is known without a fetch.
    #[must_use]
    pub fn known_title(&self) -> Option<&str> {
        match self {
            Self::Deferred(stub) => stub.title.as_deref(),
            Self::Resolved(entity) => Some(&entity.title),
        }
    }

    /// The parent if it is known without a fetch.
    ///
    /// `Some(None)` means the node is known to have no parent (a chapter);
    /// `None` means the parent can only be learned by resolving.
    #[must_use]
    pub fn known_parent(&self) -> Option<Option<&EntityId>> {
        match self {
            Self::Deferred(stub) => stub.parent.as_ref().map(Some),
            Self::Resolved(entity) => Some(entity.parent.as_ref()),
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// The identity map of the graph: at most one node per id.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    /// Node storage: EntityId -> Node
    nodes: BTreeMap<EntityId, Node>,

    /// Secondary index: code -> EntityId
    code_index: BTreeMap<String, EntityId>,

    /// Blocks are indexed by their code range instead of their (empty) code.
    use_code_ranges_as_codes: bool,
}

impl Registry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new(use_code_ranges_as_codes: bool) -> Self {
        Self {
            use_code_ranges_as_codes,
            ..Self::default()
        }
    }

    /// Turn a record into a graph node, registering any newly discovered neighbours.
    ///
    /// Neighbours that are not cached yet become `Deferred` stubs, registered
    /// before the node itself so that later references observe them. Child
    /// stubs created here get this node as their parent.
    ///
    /// Registering an id that is already resolved returns it untouched.
    pub fn register_or_get(&mut self, record: &Record) -> EntityId {
        if self.is_resolved(&record.id) {
            tracing::trace!(id = %record.id, "record already resolved");
            return record.id.clone();
        }

        let mut new_children = Vec::new();
        let children: Vec<EntityId> = record
            .children
            .iter()
            .map(|reference| {
                let (id, created) = self.reference_or_stub(reference);
                if created {
                    new_children.push(id.clone());
                }
                id
            })
            .collect();
        let children_elsewhere = self.references(&record.children_elsewhere);
        let record_parent = record
            .parent
            .as_ref()
            .map(|reference| self.reference_or_stub(reference).0);
        let exclusions = self.references(&record.exclusions);
        let maternal_chapter_relations = self.references(&record.maternal_chapter_relations);
        let perinatal_chapter_relations = self.references(&record.perinatal_chapter_relations);

        // First writer wins: a stub that already learned its parent keeps it.
        let parent = match record.class_kind {
            ClassKind::Chapter => None,
            _ => match self.nodes.get(&record.id) {
                Some(Node::Deferred(DeferredEntity {
                    parent: Some(known),
                    ..
                })) => Some(known.clone()),
                _ => record_parent,
            },
        };

        let code = if self.use_code_ranges_as_codes && record.class_kind == ClassKind::Block {
            record.code_range.clone()
        } else {
            record.code.clone()
        };

        let entity = ResolvedEntity {
            id: record.id.clone(),
            uri: record.uri.clone(),
            code,
            title: record.title.clone(),
            definition: record.definition.clone(),
            long_definition: record.long_definition.clone(),
            fully_specified_name: record.fully_specified_name.clone(),
            diagnostic_criteria: record.diagnostic_criteria.clone(),
            coding_note: record.coding_note.clone(),
            block_id: record.block_id.clone(),
            code_range: record.code_range.clone(),
            class_kind: record.class_kind,
            children,
            children_elsewhere,
            parent,
            index_terms: record.index_terms.clone(),
            inclusions: record.inclusions.clone(),
            exclusions,
            maternal_chapter_relations,
            perinatal_chapter_relations,
            browser_url: record.browser_url.clone(),
        };

        if !entity.code.is_empty() {
            self.code_index
                .insert(entity.code.clone(), entity.id.clone());
        }
        tracing::debug!(
            id = %entity.id,
            code = %entity.code,
            kind = %entity.class_kind,
            new_stubs = new_children.len(),
            "registered entity"
        );
        self.nodes
            .insert(entity.id.clone(), Node::Resolved(Box::new(entity)));

        for child in &new_children {
            if let Some(Node::Deferred(stub)) = self.nodes.get_mut(child)
                && stub.parent.is_none()
            {
                stub.parent = Some(record.id.clone());
            }
        }

        record.id.clone()
    }

    /// Get a node by id.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Get a resolved node by id, `None` for stubs and unknown ids.
    #[must_use]
    pub fn resolved(&self, id: &EntityId) -> Option<&ResolvedEntity> {
        match self.nodes.get(id)? {
            Node::Resolved(entity) => Some(entity),
            Node::Deferred(_) => None,
        }
    }

    /// Lookup an id through the code index.
    #[must_use]
    pub fn id_for_code(&self, code: &str) -> Option<&EntityId> {
        self.code_index.get(code)
    }

    /// Check if a node (stub or resolved) exists for the id.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Check if the id has been materialized.
    #[must_use]
    pub fn is_resolved(&self, id: &EntityId) -> bool {
        self.nodes.get(id).is_some_and(Node::is_resolved)
    }

    /// Total number of nodes, stubs included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of materialized nodes.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_resolved()).count()
    }

    /// Number of indexed codes.
    #[must_use]
    pub fn code_count(&self) -> usize {
        self.code_index.len()
    }

    /// Whether blocks are indexed by code range.
    #[must_use]
    pub fn uses_code_ranges_as_codes(&self) -> bool {
        self.use_code_ranges_as_codes
    }

    fn references(&mut self, references: &[Reference]) -> Vec<EntityId> {
        references
            .iter()
            .map(|reference| self.reference_or_stub(reference).0)
            .collect()
    }

    /// Reuse the cached node for a reference or register a stub for it.
    ///
    /// Returns the id and whether a stub was created.
    fn reference_or_stub(&mut self, reference: &Reference) -> (EntityId, bool) {
        if let Some(node) = self.nodes.get_mut(&reference.id) {
            if let (Node::Deferred(stub), Some(label)) = (node, &reference.label)
                && stub.title.is_none()
            {
                stub.title = Some(label.clone());
            }
            return (reference.id.clone(), false);
        }

        tracing::trace!(id = %reference.id, "registering stub");
        self.nodes.insert(
            reference.id.clone(),
            Node::Deferred(DeferredEntity {
                id: reference.id.clone(),
                uri: reference.uri.clone(),
                title: reference.label.clone(),
                parent: None,
            }),
        );
        (reference.id.clone(), true)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "http://id.who.int/icd/release/11/2024-01/mms/";

    fn record(value: serde_json::Value) -> Record {
        Record::from_value(value).expect("record")
    }

    fn chapter() -> Record {
        record(json!({
            "@id": format!("{BASE}100"),
            "code": "01",
            "title": {"@value": "Certain infectious diseases"},
            "classKind": "chapter",
            "child": [format!("{BASE}200"), format!("{BASE}300")],
            "browserUrl": "https://icd.who.int/browse/2024-01/mms/en#100"
        }))
    }

    fn block() -> Record {
        record(json!({
            "@id": format!("{BASE}200"),
            "codeRange": "1A00-1A09",
            "blockId": "BlockL1-1A0",
            "title": {"@value": "Intestinal infectious diseases"},
            "classKind": "block",
            "parent": [format!("{BASE}100")],
            "child": [format!("{BASE}400")],
            "browserUrl": "https://icd.who.int/browse/2024-01/mms/en#200"
        }))
    }

    #[test]
    fn children_become_stubs_with_parent() {
        let mut registry = Registry::new(false);
        let id = registry.register_or_get(&chapter());

        assert_eq!(id, EntityId::new("100"));
        assert_eq!(registry.node_count(), 3);
        assert_eq!(registry.resolved_count(), 1);

        let stub = match registry.get(&EntityId::new("200")) {
            Some(Node::Deferred(stub)) => Some(stub),
            _ => None,
        }
        .expect("child should still be a stub");
        assert_eq!(stub.parent, Some(EntityId::new("100")));
        assert_eq!(stub.uri, format!("{BASE}200"));
    }

    #[test]
    fn chapter_has_no_parent() {
        let mut registry = Registry::new(false);
        let id = registry.register_or_get(&chapter());
        let entity = registry.resolved(&id).expect("resolved");
        assert!(entity.parent.is_none());
    }

    #[test]
    fn promotion_replaces_stub() {
        let mut registry = Registry::new(false);
        registry.register_or_get(&chapter());
        let id = registry.register_or_get(&block());

        assert!(registry.is_resolved(&id));
        // 100, 200, 300 and the block's child 400
        assert_eq!(registry.node_count(), 4);
        let entity = registry.resolved(&id).expect("resolved");
        assert_eq!(entity.parent, Some(EntityId::new("100")));
        assert_eq!(entity.title, "Intestinal infectious diseases");
    }

    #[test]
    fn stub_parent_survives_promotion() {
        let mut registry = Registry::new(false);
        registry.register_or_get(&chapter());

        // Same block, but the payload names a different first parent.
        let id = registry.register_or_get(&record(json!({
            "@id": format!("{BASE}200"),
            "codeRange": "1A00-1A09",
            "classKind": "block",
            "parent": [format!("{BASE}999")],
            "browserUrl": "https://icd.who.int/browse/2024-01/mms/en#200"
        })));

        let entity = registry.resolved(&id).expect("resolved");
        assert_eq!(entity.parent, Some(EntityId::new("100")));
    }

    #[test]
    fn register_twice_is_noop() {
        let mut registry = Registry::new(false);
        let first = registry.register_or_get(&chapter());
        let snapshot = registry.clone();
        let second = registry.register_or_get(&chapter());

        assert_eq!(first, second);
        assert_eq!(registry.node_count(), snapshot.node_count());
        assert_eq!(registry.get(&first), snapshot.get(&first));
    }

    #[test]
    fn code_index_skips_empty_codes() {
        let mut registry = Registry::new(false);
        registry.register_or_get(&chapter());
        registry.register_or_get(&block());

        assert_eq!(registry.code_count(), 1);
        assert_eq!(registry.id_for_code("01"), Some(&EntityId::new("100")));
        assert!(registry.id_for_code("1A00-1A09").is_none());
    }

    #[test]
    fn code_range_mode_indexes_blocks_by_range() {
        let mut registry = Registry::new(true);
        registry.register_or_get(&chapter());
        let id = registry.register_or_get(&block());

        assert_eq!(registry.id_for_code("1A00-1A09"), Some(&id));
        assert_eq!(registry.resolved(&id).map(|e| e.code.as_str()), Some("1A00-1A09"));
        // Chapters keep their own code.
        assert_eq!(registry.id_for_code("01"), Some(&EntityId::new("100")));
    }

    #[test]
    fn existing_nodes_are_reused() {
        let mut registry = Registry::new(false);
        registry.register_or_get(&chapter());
        let exclusion_holder = record(json!({
            "@id": format!("{BASE}400"),
            "code": "1A00",
            "classKind": "category",
            "parent": [format!("{BASE}200")],
            "exclusion": [{"label": {"@value": "Other chapter"}, "linearizationReference": format!("{BASE}300")}],
            "browserUrl": "https://icd.who.int/browse/2024-01/mms/en#400"
        }));
        registry.register_or_get(&exclusion_holder);

        // 400 only referenced nodes that already existed.
        assert_eq!(registry.node_count(), 4);
        // The stub picked up the exclusion label as its title.
        assert_eq!(
            registry
                .get(&EntityId::new("300"))
                .and_then(Node::known_title),
            Some("Other chapter")
        );
    }

    #[test]
    fn known_parent_distinguishes_chapter_from_unknown() {
        let mut registry = Registry::new(false);
        let chapter_id = registry.register_or_get(&chapter());
        let orphan = record(json!({
            "@id": format!("{BASE}500"),
            "classKind": "category",
            "parent": [format!("{BASE}600")],
            "exclusion": [{"linearizationReference": format!("{BASE}700")}],
            "browserUrl": "https://icd.who.int/browse/2024-01/mms/en#500"
        }));
        registry.register_or_get(&orphan);

        let chapter_node = registry.get(&chapter_id).expect("chapter");
        assert_eq!(chapter_node.known_parent(), Some(None));
        // Exclusion stubs never learn a parent from the referencing record.
        let stub = registry.get(&EntityId::new("700")).expect("stub");
        assert_eq!(stub.known_parent(), None);
    }
}
