//! # Entity Handles
//!
//! `Entity` is a thin handle (explorer + id) onto a node of the graph.
//!
//! Handles never own node data. Every accessor reads through the Explorer's
//! registry, so a stub promoted to a resolved node is seen by every handle at
//! once. Accessors that need data the stub does not carry materialize the
//! node first; that is the only place a handle touches the data source.
//!
//! All list accessors return owned snapshots.

use crate::explorer::Explorer;
use crate::graph::ResolvedEntity;
use crate::primitives::{CODING_NOTE_SEPARATOR, MAX_ANCESTOR_DEPTH};
use crate::{ClassKind, EntityId, IcdError};
use std::collections::BTreeSet;
use std::fmt;

/// A node of the ICD-11 graph, resolved or not.
#[derive(Clone)]
pub struct Entity<'a> {
    explorer: &'a Explorer,
    id: EntityId,
}

impl PartialEq for Entity<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.explorer, other.explorer) && self.id == other.id
    }
}

impl Eq for Entity<'_> {}

impl fmt::Debug for Entity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl<'a> Entity<'a> {
    pub(crate) fn new(explorer: &'a Explorer, id: EntityId) -> Self {
        Self { explorer, id }
    }

    // =========================================================================
    // LOCAL ACCESSORS (never fetch)
    // =========================================================================

    /// The stable id of this entity.
    #[must_use]
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// The canonical URI of this entity.
    #[must_use]
    pub fn uri(&self) -> String {
        self.explorer
            .peek(&self.id, |node| node.uri().to_string())
            .unwrap_or_default()
    }

    /// Whether this is an "other specified" or "unspecified" residual category.
    #[must_use]
    pub fn is_residual(&self) -> bool {
        self.id.is_residual()
    }

    /// Whether the full record has been fetched.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.explorer
            .peek(&self.id, |node| node.is_resolved())
            .unwrap_or(false)
    }

    /// Fetch the full record now, if it is not cached yet.
    pub fn resolve(&self) -> Result<(), IcdError> {
        self.explorer.materialize(&self.id)
    }

    // =========================================================================
    // SCALAR ACCESSORS
    // =========================================================================

    /// The classification code; the code range for blocks in code-range mode.
    pub fn code(&self) -> Result<String, IcdError> {
        self.read(|e| e.code.clone())
    }

    /// The title, served from the referencing record's label when known.
    ///
    /// An exclusion or elsewhere label can differ from the record's own
    /// title, so a stub may report a different title once it is resolved.
    pub fn title(&self) -> Result<String, IcdError> {
        let known = self
            .explorer
            .peek(&self.id, |node| node.known_title().map(str::to_string))
            .flatten();
        match known {
            Some(title) => Ok(title),
            None => self.read(|e| e.title.clone()),
        }
    }

    pub fn definition(&self) -> Result<String, IcdError> {
        self.read(|e| e.definition.clone())
    }

    pub fn long_definition(&self) -> Result<String, IcdError> {
        self.read(|e| e.long_definition.clone())
    }

    pub fn fully_specified_name(&self) -> Result<String, IcdError> {
        self.read(|e| e.fully_specified_name.clone())
    }

    pub fn diagnostic_criteria(&self) -> Result<String, IcdError> {
        self.read(|e| e.diagnostic_criteria.clone())
    }

    pub fn block_id(&self) -> Result<String, IcdError> {
        self.read(|e| e.block_id.clone())
    }

    pub fn code_range(&self) -> Result<String, IcdError> {
        self.read(|e| e.code_range.clone())
    }

    pub fn class_kind(&self) -> Result<ClassKind, IcdError> {
        self.read(|e| e.class_kind)
    }

    pub fn index_terms(&self) -> Result<Vec<String>, IcdError> {
        self.read(|e| e.index_terms.clone())
    }

    pub fn inclusions(&self) -> Result<Vec<String>, IcdError> {
        self.read(|e| e.inclusions.clone())
    }

    /// Link to this entity in the ICD-11 browser.
    pub fn browser_url(&self) -> Result<String, IcdError> {
        self.read(|e| e.browser_url.clone())
    }

    /// The coding note, optionally merged with those of all ancestors.
    ///
    /// Merged notes run from the chapter down to this entity, one per line.
    /// Empty notes are skipped, so the result never starts with a separator.
    pub fn coding_note(&self, include_from_upper_levels: bool) -> Result<String, IcdError> {
        if !include_from_upper_levels {
            return self.read(|e| e.coding_note.clone());
        }
        let mut merged = String::new();
        for entity in self.lineage()?.iter().rev() {
            let note = entity.read(|e| e.coding_note.clone())?;
            if note.is_empty() {
                continue;
            }
            if !merged.is_empty() {
                merged.push_str(CODING_NOTE_SEPARATOR);
            }
            merged.push_str(&note);
        }
        Ok(merged)
    }

    // =========================================================================
    // RELATIONSHIPS
    // =========================================================================

    /// The parent, or `None` for chapters.
    pub fn parent(&self) -> Result<Option<Entity<'a>>, IcdError> {
        Ok(self
            .explorer
            .parent_id(&self.id)?
            .map(|id| self.explorer.handle(id)))
    }

    /// Direct children, optionally followed by the children listed elsewhere.
    pub fn children(&self, include_elsewhere: bool) -> Result<Vec<Entity<'a>>, IcdError> {
        let ids = self.read(|e| child_ids(e, include_elsewhere))?;
        Ok(self.explorer.handles(ids))
    }

    /// Children that live in another part of the classification.
    pub fn children_elsewhere(&self) -> Result<Vec<Entity<'a>>, IcdError> {
        let ids = self.read(|e| e.children_elsewhere.clone())?;
        Ok(self.explorer.handles(ids))
    }

    /// Every entity below this one, in pre-order, each listed once.
    ///
    /// Recomputed on each call. Children listed elsewhere (and their subtrees)
    /// are included on request.
    pub fn descendants(&self, include_elsewhere: bool) -> Result<Vec<Entity<'a>>, IcdError> {
        let mut visited = BTreeSet::from([self.id.clone()]);
        let mut descendants = Vec::new();
        let mut stack = self.read(|e| child_ids(e, include_elsewhere))?;
        stack.reverse();

        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let mut children = self
                .explorer
                .with_resolved(&id, |e| child_ids(e, include_elsewhere))?;
            children.reverse();
            stack.extend(children);
            descendants.push(self.explorer.handle(id));
        }
        Ok(descendants)
    }

    /// Every entity above this one, nearest first, up to the chapter.
    pub fn ancestors(&self) -> Result<Vec<Entity<'a>>, IcdError> {
        let mut visited = BTreeSet::from([self.id.clone()]);
        let mut ancestors = Vec::new();
        let mut current = self.explorer.parent_id(&self.id)?;

        while let Some(id) = current {
            if ancestors.len() >= MAX_ANCESTOR_DEPTH || !visited.insert(id.clone()) {
                tracing::warn!(start = %self.id, at = %id, "parent chain does not terminate");
                break;
            }
            current = self.explorer.parent_id(&id)?;
            ancestors.push(self.explorer.handle(id));
        }
        Ok(ancestors)
    }

    /// Excluded entities, optionally followed by those of every ancestor.
    ///
    /// Own exclusions come first, then the parent's, up to the chapter.
    pub fn exclusions(&self, include_from_upper_levels: bool) -> Result<Vec<Entity<'a>>, IcdError> {
        if !include_from_upper_levels {
            let ids = self.read(|e| e.exclusions.clone())?;
            return Ok(self.explorer.handles(ids));
        }
        let mut ids = Vec::new();
        for entity in self.lineage()? {
            ids.extend(entity.read(|e| e.exclusions.clone())?);
        }
        Ok(self.explorer.handles(ids))
    }

    /// Related entities in the chapter on pregnancy and childbirth.
    pub fn related_entities_in_maternal_chapter(&self) -> Result<Vec<Entity<'a>>, IcdError> {
        let ids = self.read(|e| e.maternal_chapter_relations.clone())?;
        Ok(self.explorer.handles(ids))
    }

    /// Related entities in the chapter on the perinatal period.
    pub fn related_entities_in_perinatal_chapter(&self) -> Result<Vec<Entity<'a>>, IcdError> {
        let ids = self.read(|e| e.perinatal_chapter_relations.clone())?;
        Ok(self.explorer.handles(ids))
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn read<T>(&self, f: impl FnOnce(&ResolvedEntity) -> T) -> Result<T, IcdError> {
        self.explorer.with_resolved(&self.id, f)
    }

    /// This entity followed by its ancestors.
    fn lineage(&self) -> Result<Vec<Entity<'a>>, IcdError> {
        let mut lineage = vec![self.clone()];
        lineage.extend(self.ancestors()?);
        Ok(lineage)
    }
}

fn child_ids(entity: &ResolvedEntity, include_elsewhere: bool) -> Vec<EntityId> {
    let mut ids = entity.children.clone();
    if include_elsewhere {
        ids.extend(entity.children_elsewhere.iter().cloned());
    }
    ids
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::ExplorerConfig;
    use crate::source::InMemorySource;
    use serde_json::{Value, json};
    use std::rc::Rc;

    const BASE: &str = "http://id.who.int/icd/release/11/2024-01/mms/";

    fn entry(id: &str, code: &str, kind: &str, parent: Option<&str>, extra: Value) -> Value {
        let mut value = json!({
            "@id": format!("{BASE}{id}"),
            "code": code,
            "title": {"@value": format!("Title {id}")},
            "classKind": kind,
            "browserUrl": format!("https://icd.who.int/browse/2024-01/mms/en#{id}")
        });
        if let Some(parent) = parent {
            value["parent"] = json!([format!("{BASE}{parent}")]);
        }
        if let (Some(target), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            target.extend(extra.clone());
        }
        value
    }

    fn source() -> Rc<InMemorySource> {
        let mut source = InMemorySource::new().with_release("en", "2024-01");
        for record in [
            entry(
                "1",
                "01",
                "chapter",
                None,
                json!({"child": [format!("{BASE}2")], "codingNote": {"@value": "chapter note"}}),
            ),
            entry(
                "2",
                "1A0",
                "category",
                Some("1"),
                json!({
                    "child": [format!("{BASE}3"), format!("{BASE}4/other")],
                    "exclusion": [{"label": {"@value": "Excluded"}, "linearizationReference": format!("{BASE}9")}]
                }),
            ),
            entry(
                "3",
                "1A00",
                "category",
                Some("2"),
                json!({"codingNote": {"@value": "leaf note"}}),
            ),
            entry("4/other", "1A0Y", "category", Some("2"), json!({})),
            entry("9", "2B00", "category", Some("1"), json!({})),
        ] {
            source.insert(record).expect("insert");
        }
        Rc::new(source)
    }

    fn explorer(source: &Rc<InMemorySource>) -> Explorer {
        Explorer::new(Rc::clone(source), ExplorerConfig::new("en")).expect("explorer")
    }

    #[test]
    fn stub_serves_identity_without_fetch() {
        let source = source();
        let explorer = explorer(&source);
        let chapter = explorer.entity_from_code("01").expect("chapter");
        let children = chapter.children(false).expect("children");

        assert_eq!(children.len(), 1);
        assert!(!children[0].is_resolved());
        assert_eq!(children[0].uri(), format!("{BASE}2"));
        assert_eq!(source.id_lookups(), 0);
    }

    #[test]
    fn stub_resolves_once() {
        let source = source();
        let explorer = explorer(&source);
        let stub = explorer
            .entity_from_code("01")
            .expect("chapter")
            .children(false)
            .expect("children")[0]
            .clone();

        assert_eq!(stub.code().expect("code"), "1A0");
        assert_eq!(stub.definition().expect("definition"), "");
        assert!(stub.is_resolved());
        assert_eq!(source.id_lookups(), 1);
    }

    #[test]
    fn parent_of_child_stub_known_locally() {
        let source = source();
        let explorer = explorer(&source);
        let chapter = explorer.entity_from_code("01").expect("chapter");
        let stub = chapter.children(false).expect("children")[0].clone();

        assert_eq!(stub.parent().expect("parent"), Some(chapter));
        assert_eq!(source.id_lookups(), 0);
    }

    #[test]
    fn residual_flag_from_id() {
        let source = source();
        let explorer = explorer(&source);
        let other = explorer.entity_from_code("1A0Y").expect("residual");
        assert!(other.is_residual());
        assert!(!explorer.entity_from_code("1A00").expect("leaf").is_residual());
    }

    #[test]
    fn coding_note_merges_top_down() {
        let source = source();
        let explorer = explorer(&source);
        let leaf = explorer.entity_from_code("1A00").expect("leaf");

        assert_eq!(leaf.coding_note(false).expect("note"), "leaf note");
        assert_eq!(
            leaf.coding_note(true).expect("note"),
            "chapter note\nleaf note"
        );
        let residual = explorer.entity_from_code("1A0Y").expect("residual");
        assert_eq!(residual.coding_note(true).expect("note"), "chapter note");
        assert_eq!(residual.coding_note(false).expect("note"), "");
    }

    #[test]
    fn exclusions_inherit_from_parent() {
        let source = source();
        let explorer = explorer(&source);
        let leaf = explorer.entity_from_code("1A00").expect("leaf");

        assert!(leaf.exclusions(false).expect("local").is_empty());
        let inherited = leaf.exclusions(true).expect("inherited");
        assert_eq!(inherited.len(), 1);
        assert_eq!(inherited[0].id(), &EntityId::new("9"));
        // The exclusion label is the stub title; no fetch needed.
        assert_eq!(inherited[0].title().expect("title"), "Excluded");
    }

    #[test]
    fn ancestors_nearest_first() {
        let source = source();
        let explorer = explorer(&source);
        let leaf = explorer.entity_from_code("1A00").expect("leaf");
        let ids: Vec<_> = leaf
            .ancestors()
            .expect("ancestors")
            .iter()
            .map(|e| e.id().as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn failed_resolution_keeps_stub_and_retries() {
        let source = source();
        let explorer = explorer(&source);
        let stub = explorer
            .entity_from_code("01")
            .expect("chapter")
            .children(false)
            .expect("children")[0]
            .clone();

        source.set_offline(true);
        assert!(matches!(stub.code(), Err(IcdError::Connection(_))));
        assert!(!stub.is_resolved());
        assert_eq!(stub.id(), &EntityId::new("2"));
        assert_eq!(stub.uri(), format!("{BASE}2"));

        source.set_offline(false);
        assert_eq!(stub.code().expect("code"), "1A0");
    }

    fn ids(entities: &[Entity<'_>]) -> Vec<String> {
        entities.iter().map(|e| e.id().as_str().to_string()).collect()
    }

    /// Node 2 lists itself as a child and its chapter as a child elsewhere;
    /// nodes 5 and 6 name each other as parent. Of nodes 1 to 3, only node 3
    /// carries a coding note.
    fn cyclic_source() -> Rc<InMemorySource> {
        let mut source = InMemorySource::new().with_release("en", "2024-01");
        for record in [
            entry("1", "01", "chapter", None, json!({"child": [format!("{BASE}2")]})),
            entry(
                "2",
                "1A0",
                "category",
                Some("1"),
                json!({
                    "child": [format!("{BASE}2"), format!("{BASE}3")],
                    "foundationChildElsewhere": [
                        {"label": {"@value": "Chapter"}, "linearizationReference": format!("{BASE}1")}
                    ]
                }),
            ),
            entry(
                "3",
                "1A00",
                "category",
                Some("2"),
                json!({"codingNote": {"@value": "n3"}}),
            ),
            entry(
                "5",
                "1B00",
                "category",
                Some("6"),
                json!({
                    "codingNote": {"@value": "n5"},
                    "exclusion": [{"label": {"@value": "Excluded"}, "linearizationReference": format!("{BASE}3")}]
                }),
            ),
            entry(
                "6",
                "1B01",
                "category",
                Some("5"),
                json!({"codingNote": {"@value": "n6"}}),
            ),
        ] {
            source.insert(record).expect("insert");
        }
        Rc::new(source)
    }

    #[test]
    fn descendants_skip_self_and_back_references() {
        let source = cyclic_source();
        let explorer = explorer(&source);
        let node = explorer.entity_from_code("1A0").expect("node");

        assert_eq!(ids(&node.descendants(true).expect("descendants")), vec!["3", "1"]);
        assert_eq!(ids(&node.descendants(false).expect("descendants")), vec!["3"]);
    }

    #[test]
    fn parent_cycle_terminates_derived_views() {
        let source = cyclic_source();
        let explorer = explorer(&source);
        let node = explorer.entity_from_code("1B01").expect("node");

        assert_eq!(ids(&node.ancestors().expect("ancestors")), vec!["5"]);
        assert_eq!(node.coding_note(true).expect("note"), "n5\nn6");
        let exclusions = node.exclusions(true).expect("exclusions");
        assert_eq!(ids(&exclusions), vec!["3"]);
        let other = explorer.entity_from_code("1B00").expect("other");
        assert_eq!(ids(&other.ancestors().expect("ancestors")), vec!["6"]);
    }

    #[test]
    fn ancestors_capped_on_deep_chains() {
        let depth = MAX_ANCESTOR_DEPTH + 10;
        let mut source = InMemorySource::new().with_release("en", "2024-01");
        source
            .insert(entry(&format!("c{depth}"), "01", "chapter", None, json!({})))
            .expect("insert");
        for level in 0..depth {
            let parent = format!("c{}", level + 1);
            source
                .insert(entry(
                    &format!("c{level}"),
                    &format!("X{level}"),
                    "category",
                    Some(parent.as_str()),
                    json!({}),
                ))
                .expect("insert");
        }
        let source = Rc::new(source);
        let explorer = explorer(&source);
        let leaf = explorer.entity_from_code("X0").expect("leaf");

        let ancestors = leaf.ancestors().expect("ancestors");
        assert_eq!(ancestors.len(), MAX_ANCESTOR_DEPTH);
        assert_eq!(ancestors[0].id(), &EntityId::new("c1"));
    }

    #[test]
    fn coding_note_without_parent_notes_has_no_separator() {
        let source = cyclic_source();
        let explorer = explorer(&source);
        let leaf = explorer.entity_from_code("1A00").expect("leaf");

        assert_eq!(leaf.coding_note(true).expect("note"), "n3");
    }

    #[test]
    fn stub_title_changes_after_resolution() {
        let source = source();
        let explorer = explorer(&source);
        let excluded = explorer
            .entity_from_code("1A0")
            .expect("node")
            .exclusions(false)
            .expect("exclusions")[0]
            .clone();

        assert_eq!(excluded.title().expect("title"), "Excluded");
        excluded.resolve().expect("resolve");
        assert_eq!(excluded.title().expect("title"), "Title 9");
    }
}
