//! Shared fixture: a small slice of chapter 01 served from memory.
//!
//! ```text
//! 01        chapter   1435254666          coding note
//! 1A00-1A09 block     135352227           excludes 500, 600; elsewhere 700
//! 1A00      category  257068234           coding note
//! 1A0Y      category  135352227/other
//! 2B00      category  500
//! 2B01      category  600
//! 9A00      category  700
//! ```

#![allow(dead_code)]

use icd_core::{Explorer, ExplorerConfig, InMemorySource};
use serde_json::{Value, json};
use std::rc::Rc;

pub const RELEASE: &str = "2024-01";
pub const BASE: &str = "http://id.who.int/icd/release/11/2024-01/mms/";

pub const CHAPTER: &str = "1435254666";
pub const BLOCK: &str = "135352227";
pub const CHOLERA: &str = "257068234";
pub const RESIDUAL: &str = "135352227/other";
pub const EXCLUDED_A: &str = "500";
pub const EXCLUDED_B: &str = "600";
pub const ELSEWHERE: &str = "700";

pub fn uri(id: &str) -> String {
    format!("{BASE}{id}")
}

fn record(id: &str, kind: &str, parent: Option<&str>, fields: Value) -> Value {
    let mut value = json!({
        "@id": uri(id),
        "title": {"@language": "en", "@value": format!("Entity {id}")},
        "classKind": kind,
        "browserUrl": format!("https://icd.who.int/browse/{RELEASE}/mms/en#{id}")
    });
    if let Some(parent) = parent {
        value["parent"] = json!([uri(parent)]);
    }
    if let (Some(target), Value::Object(fields)) = (value.as_object_mut(), fields) {
        target.extend(fields);
    }
    value
}

pub fn payloads() -> Vec<Value> {
    vec![
        record(
            CHAPTER,
            "chapter",
            None,
            json!({
                "code": "01",
                "child": [uri(BLOCK)],
                "codingNote": {"@value": "Chapter note"}
            }),
        ),
        record(
            BLOCK,
            "block",
            Some(CHAPTER),
            json!({
                "codeRange": "1A00-1A09",
                "blockId": "BlockL1-1A0",
                "child": [uri(CHOLERA), uri(RESIDUAL)],
                "foundationChildElsewhere": [
                    {"label": {"@value": "Elsewhere"}, "linearizationReference": uri(ELSEWHERE)}
                ],
                "exclusion": [
                    {"label": {"@value": "First exclusion"}, "linearizationReference": uri(EXCLUDED_A)},
                    {"label": {"@value": "Second exclusion"}, "linearizationReference": uri(EXCLUDED_B)}
                ]
            }),
        ),
        record(
            CHOLERA,
            "category",
            Some(BLOCK),
            json!({
                "code": "1A00",
                "definition": {"@value": "An acute diarrhoeal infection."},
                "codingNote": {"@value": "Cholera note"},
                "indexTerm": [{"label": {"@value": "Cholera"}}]
            }),
        ),
        record(RESIDUAL, "category", Some(BLOCK), json!({"code": "1A0Y"})),
        record(EXCLUDED_A, "category", Some(CHAPTER), json!({"code": "2B00"})),
        record(EXCLUDED_B, "category", Some(CHAPTER), json!({"code": "2B01"})),
        record(ELSEWHERE, "category", Some(CHAPTER), json!({"code": "9A00"})),
    ]
}

pub fn source() -> Rc<InMemorySource> {
    let mut source = InMemorySource::new().with_release("en", RELEASE);
    for payload in payloads() {
        source.insert(payload).expect("fixture payload");
    }
    Rc::new(source)
}

pub fn explorer(source: &Rc<InMemorySource>) -> Explorer {
    Explorer::new(Rc::clone(source), ExplorerConfig::new("en")).expect("explorer")
}

pub fn range_explorer(source: &Rc<InMemorySource>) -> Explorer {
    Explorer::new(
        Rc::clone(source),
        ExplorerConfig::new("en").with_code_ranges_as_codes(true),
    )
    .expect("explorer")
}
