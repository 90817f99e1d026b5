//! # Graph Primitives
//!
//! Hardcoded constants for the ICD-11 entity graph.
//!
//! These are compiled into the binary and are immutable at runtime.

/// URI segment that precedes the entity id in linearization URIs.
pub const MMS_SEGMENT: &str = "/mms/";

/// URI segment that precedes the entity id in foundation URIs.
///
/// The cross-chapter relation lists reference foundation entities.
pub const ENTITY_SEGMENT: &str = "/entity/";

/// Id fragments that mark residual categories.
pub const RESIDUAL_MARKERS: [&str; 2] = ["unspecified", "other"];

/// Separator between the two ends of a code range (e.g. `1A00-1A09`).
pub const CODE_RANGE_SEPARATOR: char = '-';

/// Separator placed between inherited and local coding notes.
pub const CODING_NOTE_SEPARATOR: &str = "\n";

/// Maximum number of parent links followed by any upward walk.
///
/// The classification is at most a handful of levels deep; the cap only
/// bounds walks over a corrupted parent chain.
pub const MAX_ANCESTOR_DEPTH: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestor_cap_exceeds_hierarchy_depth() {
        // Chapter -> block -> block -> category -> subcategory -> extension
        assert!(MAX_ANCESTOR_DEPTH > 6);
    }

    #[test]
    fn segments_are_slash_delimited() {
        assert!(MMS_SEGMENT.starts_with('/') && MMS_SEGMENT.ends_with('/'));
        assert!(ENTITY_SEGMENT.starts_with('/') && ENTITY_SEGMENT.ends_with('/'));
    }
}
