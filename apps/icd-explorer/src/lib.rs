//! # icd-explorer
//!
//! Command-line explorer for the ICD-11 MMS classification.
//!
//! This crate wires the `icd-core` graph to the outside world:
//! - `source` - the WHO ICD-API (official or self-hosted) as a `DataSource`
//! - `config` - settings from TOML, environment and flags
//! - `report` - serializable entity views
//! - `cli` - clap commands

pub mod cli;
pub mod config;
pub mod report;
pub mod source;

pub use config::{Overrides, Settings};
pub use report::{EntityRef, EntityReport};
pub use source::{Access, HttpSource};
