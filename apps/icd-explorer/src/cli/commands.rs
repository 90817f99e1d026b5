//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//! Command output goes to stdout; logs go to stderr.

use super::Target;
use crate::report::{
    CheckReport, CodingNoteReport, EntityRef, EntityReport, RelationReport, ReleaseReport,
};
use icd_core::{Entity, Explorer, IcdError};
use serde::Serialize;

// =============================================================================
// HELPERS
// =============================================================================

/// Look up the entity a command targets.
pub fn resolve_target<'a>(explorer: &'a Explorer, target: &Target) -> Result<Entity<'a>, IcdError> {
    match (&target.code, &target.id) {
        (Some(code), _) => explorer.entity_from_code(code),
        (None, Some(id)) => explorer.entity_from_id(id),
        (None, None) => Err(IcdError::Config(
            "either --code or --id is required".to_string(),
        )),
    }
}

fn print_json<T: Serialize>(report: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(report).unwrap_or_default()
    );
}

fn print_relation(report: &RelationReport, json_mode: bool) {
    if json_mode {
        print_json(report);
        return;
    }

    println!("{} of {}", report.relation, report.entity.line());
    println!("{}", "=".repeat(report.relation.len() + 3 + report.entity.line().len()));
    if report.entities.is_empty() {
        println!("(none)");
    }
    for entity in &report.entities {
        println!("  {}", entity.line());
    }
}

fn field(label: &str, value: &str) {
    if !value.is_empty() {
        println!("{:<22}{}", format!("{label}:"), value);
    }
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

/// Show every field of an entity.
pub fn cmd_show(explorer: &Explorer, target: &Target, json_mode: bool) -> Result<(), IcdError> {
    let entity = resolve_target(explorer, target)?;
    let report = EntityReport::from_entity(&entity)?;

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("{}", report.title);
    println!("{}", "=".repeat(report.title.chars().count()));
    field("Id", &report.id);
    field("URI", &report.uri);
    field("Code", &report.code);
    field("Class kind", &report.class_kind);
    if report.is_residual {
        field("Residual", "yes");
    }
    field("Block id", &report.block_id);
    field("Code range", &report.code_range);
    field("Parent", report.parent.as_deref().unwrap_or_default());
    field("Definition", &report.definition);
    field("Long definition", &report.long_definition);
    field("Fully specified name", &report.fully_specified_name);
    field("Diagnostic criteria", &report.diagnostic_criteria);
    field("Coding note", &report.coding_note);
    field("Children", &report.children.join(", "));
    field("Children elsewhere", &report.children_elsewhere.join(", "));
    field("Index terms", &report.index_terms.join("; "));
    field("Inclusions", &report.inclusions.join("; "));
    field("Exclusions", &report.exclusions.join(", "));
    field("Browser", &report.browser_url);

    Ok(())
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Check whether a code or id exists.
pub fn cmd_check(explorer: &Explorer, target: &Target, json_mode: bool) -> Result<(), IcdError> {
    let report = match (&target.code, &target.id) {
        (Some(code), _) => CheckReport {
            kind: "code".to_string(),
            value: code.clone(),
            valid: explorer.is_valid_code(code)?,
        },
        (None, Some(id)) => CheckReport {
            kind: "id".to_string(),
            value: id.clone(),
            valid: explorer.is_valid_id(id)?,
        },
        (None, None) => {
            return Err(IcdError::Config(
                "either --code or --id is required".to_string(),
            ));
        }
    };

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    let verdict = if report.valid { "valid" } else { "not found" };
    println!("{} {}: {}", report.kind, report.value, verdict);
    Ok(())
}

// =============================================================================
// RELATION COMMANDS
// =============================================================================

/// List the children of an entity.
pub fn cmd_children(
    explorer: &Explorer,
    target: &Target,
    json_mode: bool,
    elsewhere: bool,
) -> Result<(), IcdError> {
    let entity = resolve_target(explorer, target)?;
    let children = entity.children(elsewhere)?;
    let report = RelationReport::new(
        EntityRef::from_entity(&entity)?,
        "Children",
        EntityRef::from_entities(&children)?,
    );
    print_relation(&report, json_mode);
    Ok(())
}

/// List every entity below an entity.
pub fn cmd_descendants(
    explorer: &Explorer,
    target: &Target,
    json_mode: bool,
    elsewhere: bool,
) -> Result<(), IcdError> {
    let entity = resolve_target(explorer, target)?;
    let descendants = entity.descendants(elsewhere)?;
    tracing::debug!(
        count = descendants.len(),
        cached = explorer.cached_count(),
        "descendants collected"
    );
    let report = RelationReport::new(
        EntityRef::from_entity(&entity)?,
        "Descendants",
        EntityRef::from_entities(&descendants)?,
    );
    print_relation(&report, json_mode);
    Ok(())
}

/// List every entity above an entity, nearest first.
pub fn cmd_ancestors(explorer: &Explorer, target: &Target, json_mode: bool) -> Result<(), IcdError> {
    let entity = resolve_target(explorer, target)?;
    let ancestors = entity.ancestors()?;
    let report = RelationReport::new(
        EntityRef::from_entity(&entity)?,
        "Ancestors",
        EntityRef::from_entities(&ancestors)?,
    );
    print_relation(&report, json_mode);
    Ok(())
}

/// List the exclusions of an entity, optionally with its ancestors'.
pub fn cmd_exclusions(
    explorer: &Explorer,
    target: &Target,
    json_mode: bool,
    include_from_upper_levels: bool,
) -> Result<(), IcdError> {
    let entity = resolve_target(explorer, target)?;
    let exclusions = entity.exclusions(include_from_upper_levels)?;
    let report = RelationReport::new(
        EntityRef::from_entity(&entity)?,
        "Exclusions",
        EntityRef::from_entities(&exclusions)?,
    );
    print_relation(&report, json_mode);
    Ok(())
}

// =============================================================================
// CODING NOTE COMMAND
// =============================================================================

/// Show the coding note of an entity, optionally merged with its ancestors'.
pub fn cmd_coding_note(
    explorer: &Explorer,
    target: &Target,
    json_mode: bool,
    include_from_upper_levels: bool,
) -> Result<(), IcdError> {
    let entity = resolve_target(explorer, target)?;
    let report = CodingNoteReport {
        entity: EntityRef::from_entity(&entity)?,
        include_from_upper_levels,
        coding_note: entity.coding_note(include_from_upper_levels)?,
    };

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Coding note of {}", report.entity.line());
    println!();
    if report.coding_note.is_empty() {
        println!("(none)");
    } else {
        println!("{}", report.coding_note);
    }
    Ok(())
}

// =============================================================================
// RELEASE COMMAND
// =============================================================================

/// Show the release and language in use.
pub fn cmd_release(explorer: &Explorer, json_mode: bool) -> Result<(), IcdError> {
    let report = ReleaseReport {
        release: explorer.release().to_string(),
        language: explorer.language().to_string(),
        use_code_ranges_as_codes: explorer.uses_code_ranges_as_codes(),
    };

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("ICD-11 MMS Release");
    println!("==================");
    println!("Release:     {}", report.release);
    println!("Language:    {}", report.language);
    println!(
        "Code ranges: {}",
        if report.use_code_ranges_as_codes { "on" } else { "off" }
    );
    Ok(())
}
