//! # Settings
//!
//! Explorer settings, merged in order: defaults → TOML file → environment →
//! CLI flags. Later sources override earlier ones.
//!
//! ```toml
//! language = "en"
//! release = "2024-01"
//! use_code_ranges_as_codes = false
//! client_id = "..."
//! client_secret = "..."
//! # or, for a self-hosted deployment:
//! # api_url = "http://localhost:8382/"
//! ```

use crate::source::{Access, HttpSource};
use icd_core::{Explorer, ExplorerConfig, IcdError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding `language`.
pub const ENV_LANGUAGE: &str = "ICD_LANGUAGE";
/// Environment variable overriding `release`.
pub const ENV_RELEASE: &str = "ICD_RELEASE";
/// Environment variable overriding `api_url`.
pub const ENV_API_URL: &str = "ICD_API_URL";
/// Environment variable overriding `client_id`.
pub const ENV_CLIENT_ID: &str = "ICD_CLIENT_ID";
/// Environment variable overriding `client_secret`.
pub const ENV_CLIENT_SECRET: &str = "ICD_CLIENT_SECRET";

// =============================================================================
// SETTINGS
// =============================================================================

/// Everything needed to open an Explorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Language of the returned texts.
    pub language: String,
    /// Release to explore; `None` means the latest.
    pub release: Option<String>,
    /// Root of a self-hosted ICD-API deployment; `None` means the official API.
    pub api_url: Option<String>,
    /// Address blocks by their code range.
    pub use_code_ranges_as_codes: bool,
    /// Official API client id.
    pub client_id: Option<String>,
    /// Official API client secret.
    pub client_secret: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            release: None,
            api_url: None,
            use_code_ranges_as_codes: false,
            client_id: None,
            client_secret: None,
        }
    }
}

/// Values given on the command line; `None` leaves the setting untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub language: Option<String>,
    pub release: Option<String>,
    pub api_url: Option<String>,
    pub use_code_ranges_as_codes: bool,
}

impl Settings {
    /// Load settings from an optional file, then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, IcdError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Read a TOML settings file.
    pub fn from_file(path: &Path) -> Result<Self, IcdError> {
        tracing::debug!("Loading settings from {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| {
            IcdError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| IcdError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse settings from TOML text. Unknown keys are rejected.
    pub fn from_toml(content: &str) -> Result<Self, IcdError> {
        toml::from_str(content).map_err(|e| IcdError::Config(e.to_string()))
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(language) = read(ENV_LANGUAGE) {
            self.language = language;
        }
        if let Some(release) = read(ENV_RELEASE) {
            self.release = Some(release);
        }
        if let Some(api_url) = read(ENV_API_URL) {
            self.api_url = Some(api_url);
        }
        if let Some(client_id) = read(ENV_CLIENT_ID) {
            self.client_id = Some(client_id);
        }
        if let Some(client_secret) = read(ENV_CLIENT_SECRET) {
            self.client_secret = Some(client_secret);
        }
    }

    /// Apply command-line overrides.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(ref language) = overrides.language {
            self.language.clone_from(language);
        }
        if overrides.release.is_some() {
            self.release.clone_from(&overrides.release);
        }
        if overrides.api_url.is_some() {
            self.api_url.clone_from(&overrides.api_url);
        }
        if overrides.use_code_ranges_as_codes {
            self.use_code_ranges_as_codes = true;
        }
    }

    /// The session parameters for an Explorer.
    #[must_use]
    pub fn explorer_config(&self) -> ExplorerConfig {
        let config = ExplorerConfig::new(self.language.clone())
            .with_code_ranges_as_codes(self.use_code_ranges_as_codes);
        match self.release {
            Some(ref release) => config.with_release(release.clone()),
            None => config,
        }
    }

    /// How to reach the ICD-API.
    ///
    /// A configured `api_url` wins over credentials.
    pub fn access(&self) -> Result<Access, IcdError> {
        if let Some(ref root) = self.api_url {
            return Ok(Access::Deployment { root: root.clone() });
        }
        match (&self.client_id, &self.client_secret) {
            (Some(client_id), Some(client_secret)) => Ok(Access::Official {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
            }),
            _ => Err(IcdError::Config(format!(
                "set {ENV_CLIENT_ID} and {ENV_CLIENT_SECRET} (or client_id/client_secret) for the official API, or {ENV_API_URL} for a self-hosted one"
            ))),
        }
    }

    /// Connect to the ICD-API and open an Explorer.
    pub fn open_explorer(&self) -> Result<Explorer, IcdError> {
        let source = HttpSource::connect(self.access()?)?;
        Explorer::new(source, self.explorer_config())
    }
}

// =============================================================================
// TESTS
// =============================================================================
