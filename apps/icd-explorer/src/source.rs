//! # ICD-API Source
//!
//! `DataSource` over the WHO ICD-API v2, either the official service or a
//! self-hosted deployment.
//!
//! ## Status Mapping
//!
//! - 200 → payload
//! - 404 → `IcdError::NotFound` (`false` for `check_release`)
//! - anything else → `IcdError::Connection` with status and body
//!
//! The official service needs an OAuth2 bearer token. A 401 triggers one
//! re-authentication and a single retry of the request.

use icd_core::{DataSource, EntityId, IcdError};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use std::cell::RefCell;
use std::time::Duration;

/// Root of the official ICD-API.
pub const OFFICIAL_ROOT: &str = "https://id.who.int/";

/// OAuth2 token endpoint of the official ICD-API.
pub const TOKEN_ENDPOINT: &str = "https://icdaccessmanagement.who.int/connect/token";

/// Root of browser links in payloads served by the official API.
pub const OFFICIAL_BROWSER_ROOT: &str = "https://icd.who.int/";

const TOKEN_SCOPE: &str = "icdapi_access";
const API_VERSION: &str = "v2";
const RELEASE_SEGMENT: &str = "/11/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// ACCESS
// =============================================================================

/// How the ICD-API is reached.
#[derive(Clone, PartialEq, Eq)]
pub enum Access {
    /// The WHO service, authenticated with client credentials.
    Official {
        client_id: String,
        client_secret: String,
    },
    /// A self-hosted deployment, no authentication.
    Deployment { root: String },
}

impl std::fmt::Debug for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Official { client_id, .. } => f
                .debug_struct("Official")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Self::Deployment { root } => f.debug_struct("Deployment").field("root", root).finish(),
        }
    }
}

// =============================================================================
// HTTP SOURCE
// =============================================================================

/// Blocking ICD-API client.
pub struct HttpSource {
    http: Client,
    /// `<root>icd/release/11/`
    base: String,
    /// Deployment root, used to rewrite browser links.
    browser_root: Option<String>,
    credentials: Option<(String, String)>,
    token: RefCell<Option<String>>,
}

impl std::fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSource")
            .field("base", &self.base)
            .field("browser_root", &self.browser_root)
            .field("authenticated", &self.token.borrow().is_some())
            .finish_non_exhaustive()
    }
}

impl HttpSource {
    /// Connect to the ICD-API.
    ///
    /// The official API is authenticated right away; a deployment is probed
    /// to make sure it answers like an ICD-API.
    pub fn connect(access: Access) -> Result<Self, IcdError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IcdError::Connection(format!("cannot build HTTP client: {e}")))?;

        match access {
            Access::Official {
                client_id,
                client_secret,
            } => {
                let source = Self {
                    http,
                    base: release_base(OFFICIAL_ROOT),
                    browser_root: None,
                    credentials: Some((client_id, client_secret)),
                    token: RefCell::new(None),
                };
                source.authenticate()?;
                Ok(source)
            }
            Access::Deployment { root } => {
                let root = normalize_root(&root);
                probe_deployment(&http, &root)?;
                tracing::info!(%root, "using self-hosted ICD-API");
                Ok(Self {
                    http,
                    base: release_base(&root),
                    browser_root: Some(root),
                    credentials: None,
                    token: RefCell::new(None),
                })
            }
        }
    }

    /// Fetch a fresh bearer token with the client credentials.
    fn authenticate(&self) -> Result<(), IcdError> {
        let Some((ref client_id, ref client_secret)) = self.credentials else {
            return Ok(());
        };
        tracing::debug!("requesting ICD-API access token");
        let response: Value = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("scope", TOKEN_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .and_then(|r| r.json())
            .map_err(|e| IcdError::Connection(format!("authentication request failed: {e}")))?;
        let token = token_from_response(&response)?;
        *self.token.borrow_mut() = Some(token);
        Ok(())
    }

    fn request(&self, url: &str, release: Option<&str>, language: &str) -> RequestBuilder {
        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .header("Accept-Language", language)
            .header("API-Version", API_VERSION)
            .header("linearizationname", "mms");
        if let Some(release) = release {
            request = request.header("releaseId", release);
        }
        if let Some(ref token) = *self.token.borrow() {
            request = request.bearer_auth(token);
        }
        request
    }

    /// GET a URL, re-authenticating once on 401.
    fn get(
        &self,
        url: &str,
        release: Option<&str>,
        language: &str,
    ) -> Result<(StatusCode, String), IcdError> {
        tracing::trace!(url, "GET");
        let send = || -> Result<(StatusCode, String), IcdError> {
            let response = self
                .request(url, release, language)
                .send()
                .map_err(|e| IcdError::Connection(format!("request to {url} failed: {e}")))?;
            let status = response.status();
            let body = response
                .text()
                .map_err(|e| IcdError::Connection(format!("reading {url} failed: {e}")))?;
            Ok((status, body))
        };

        let (status, body) = send()?;
        if status == StatusCode::UNAUTHORIZED && self.credentials.is_some() {
            tracing::debug!("access token rejected, re-authenticating");
            self.authenticate()?;
            return send();
        }
        Ok((status, body))
    }

    /// GET a URL and parse the 200 payload; 404 becomes `NotFound(not_found)`.
    fn get_json(
        &self,
        url: &str,
        release: Option<&str>,
        language: &str,
        not_found: impl FnOnce() -> String,
        context: impl FnOnce() -> String,
    ) -> Result<Value, IcdError> {
        let (status, body) = self.get(url, release, language)?;
        match status {
            StatusCode::OK => serde_json::from_str(&body).map_err(|e| {
                IcdError::DataIntegrity(format!("{}: malformed JSON: {e}", context()))
            }),
            StatusCode::NOT_FOUND => Err(IcdError::NotFound(not_found())),
            _ => Err(unexpected_status(status, &body, &context())),
        }
    }
}

impl DataSource for HttpSource {
    fn lookup_code(&self, code: &str, release: &str, language: &str) -> Result<Value, IcdError> {
        let url = format!("{}{release}/mms/codeinfo/{code}", self.base);
        let info = self.get_json(
            &url,
            Some(release),
            language,
            || {
                format!(
                    "No ICD-11 entity with code {code} was found for release {release} in language {language}."
                )
            },
            || format!("Error happened while finding entity for code {code}"),
        )?;
        let id = stem_id(&info)?;
        self.lookup_id(id.as_str(), release, language)
    }

    fn lookup_id(&self, id: &str, release: &str, language: &str) -> Result<Value, IcdError> {
        let url = format!("{}{release}/mms/{id}?include=diagnosticCriteria", self.base);
        let mut payload = self.get_json(
            &url,
            Some(release),
            language,
            || {
                format!(
                    "No ICD-11 entity with id {id} was found for release {release} in language {language}."
                )
            },
            || format!("Error happened while finding entity for id {id}"),
        )?;
        if let Some(ref root) = self.browser_root {
            rewrite_browser_url(&mut payload, root);
        }
        Ok(payload)
    }

    fn latest_release(&self, language: &str) -> Result<String, IcdError> {
        let url = format!("{}mms", self.base);
        let index = self.get_json(
            &url,
            None,
            language,
            || format!("Could not find any release for language {language}."),
            || format!("Error happened while finding code of last release in language {language}"),
        )?;
        release_from_index(&index)
    }

    fn check_release(&self, release: &str, language: &str) -> Result<bool, IcdError> {
        let url = format!("{}{release}/mms", self.base);
        let (status, body) = self.get(&url, Some(release), language)?;
        match status {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(unexpected_status(
                status,
                &body,
                &format!(
                    "Error happened while checking if release {release} exists in language {language}"
                ),
            )),
        }
    }
}

// =============================================================================
// PAYLOAD HELPERS
// =============================================================================

fn probe_deployment(http: &Client, root: &str) -> Result<(), IcdError> {
    let url = format!("{root}icd/entity");
    let response = http
        .head(&url)
        .send()
        .map_err(|e| IcdError::Connection(format!("cannot reach {root}: {e}")))?;
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return Err(IcdError::Connection(format!(
            "{root} does not look like an ICD-API deployment (HEAD {url} returned {})",
            response.status()
        )));
    }
    Ok(())
}

/// Ensure a deployment root ends with exactly one `/`.
pub fn normalize_root(root: &str) -> String {
    format!("{}/", root.trim_end_matches('/'))
}

/// `<root>icd/release/11/`
pub fn release_base(root: &str) -> String {
    format!("{root}icd/release/11/")
}

/// Extract the bearer token from a token endpoint response.
pub fn token_from_response(response: &Value) -> Result<String, IcdError> {
    if let Some(error) = response.get("error") {
        return Err(IcdError::Connection(format!(
            "Authentication attempt with official API ended with an error. Error details: {error}"
        )));
    }
    response
        .get("access_token")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| IcdError::Connection("token response has no access_token".to_string()))
}

/// The entity id behind a `codeinfo` response.
pub fn stem_id(codeinfo: &Value) -> Result<EntityId, IcdError> {
    let stem = codeinfo
        .get("stemId")
        .and_then(Value::as_str)
        .ok_or_else(|| IcdError::DataIntegrity("codeinfo response has no stemId".to_string()))?;
    EntityId::from_uri(stem)
        .ok_or_else(|| IcdError::DataIntegrity(format!("cannot derive an entity id from \"{stem}\"")))
}

/// The latest release named in the MMS index, e.g. `2024-01`.
///
/// The first entry of `release` looks like
/// `http://id.who.int/icd/release/11/2024-01/mms`.
pub fn release_from_index(index: &Value) -> Result<String, IcdError> {
    let first = index
        .get("release")
        .and_then(Value::as_array)
        .and_then(|releases| releases.first())
        .and_then(Value::as_str)
        .ok_or_else(|| IcdError::DataIntegrity("release index lists no release".to_string()))?;
    first
        .split_once(RELEASE_SEGMENT)
        .and_then(|(_, rest)| rest.split('/').next())
        .filter(|release| !release.is_empty())
        .map(str::to_string)
        .ok_or_else(|| IcdError::DataIntegrity(format!("cannot read a release name from \"{first}\"")))
}

/// Point browser links at a self-hosted deployment.
pub fn rewrite_browser_url(payload: &mut Value, root: &str) {
    if let Some(Value::String(url)) = payload.get_mut("browserUrl")
        && let Some(rest) = url.strip_prefix(OFFICIAL_BROWSER_ROOT)
    {
        *url = format!("{root}{rest}");
    }
}

fn unexpected_status(status: StatusCode, body: &str, context: &str) -> IcdError {
    IcdError::Connection(format!(
        "{context}. Error code {} - details: \n\"{body}\"",
        status.as_u16()
    ))
}

// =============================================================================
// TESTS
// =============================================================================
