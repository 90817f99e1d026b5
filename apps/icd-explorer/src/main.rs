//! # ICD Explorer
//!
//! The main binary for exploring ICD-11 MMS.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 apps/icd-explorer (THE BINARY)           │
//! │                                                          │
//! │  ┌─────────────┐   ┌─────────────┐   ┌───────────────┐  │
//! │  │   CLI       │   │  Settings   │   │  HttpSource   │  │
//! │  │  (clap)     │   │  (toml/env) │   │  (reqwest)    │  │
//! │  └──────┬──────┘   └──────┬──────┘   └───────┬───────┘  │
//! │         └─────────────────┼──────────────────┘          │
//! │                           ▼                             │
//! │                   ┌───────────────┐                     │
//! │                   │   icd-core    │                     │
//! │                   │  (THE GRAPH)  │                     │
//! │                   └───────────────┘                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! export ICD_CLIENT_ID=... ICD_CLIENT_SECRET=...
//! icd-explorer show --code 1A00
//! icd-explorer descendants --code 01 --elsewhere
//! icd-explorer --code-ranges show --code 1A00-1A09
//! icd-explorer --api-url http://localhost:8382 --json-mode ancestors --id 257068234
//! ```

use clap::Parser;
use icd_explorer::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // ICD_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ICD_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "icd_explorer=debug,icd_core=debug"
    } else {
        "icd_explorer=info,icd_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
