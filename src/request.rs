//! Request plumbing shared by the blocking and async clients: endpoint paths,
//! query construction, status classification and body decoding.

use crate::cache::{DiskCache, Namespace, request_key};
use crate::error::{Error, Result};
use crate::models::{DataResponse, DimensionFilter, IndicatorMetadata, Language};
use crate::normalize::NormalizedData;
use crate::validate::check_key_shape;
use serde_json::Value;

const LOG_TARGET: &str = "ine_rs::request";

pub const DATA_ENDPOINT: &str = "/ine/json_indicador/pindica.jsp";
pub const METADATA_ENDPOINT: &str = "/ine/json_indicador/pindicaMeta.jsp";
pub const CATALOGUE_ENDPOINT: &str = "/ine/xml_indic.jsp";

/// Operation code of the data endpoint.
pub const DATA_OP: &str = "2";

/// Catalogue selection (`opc` parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogueScope {
    /// A single indicator (`opc=1`, requires `varcd`).
    Single,
    /// The whole catalogue (`opc=2`).
    All,
    /// The main-indicators group (`opc=3`).
    Main,
}

impl CatalogueScope {
    pub fn opc(&self) -> &'static str {
        match self {
            CatalogueScope::Single => "1",
            CatalogueScope::All => "2",
            CatalogueScope::Main => "3",
        }
    }
}

/// Optional `start`/`count` pagination window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub start: Option<usize>,
    pub count: Option<usize>,
}

impl Page {
    pub fn new(start: usize, count: usize) -> Self {
        Self {
            start: Some(start),
            count: Some(count),
        }
    }
}

/// Query for the data endpoint. Filter keys must look like `DimN`; this is checked
/// here, without metadata, before anything is sent.
pub fn data_query(
    code: &str,
    filter: Option<&DimensionFilter>,
    page: Page,
) -> Result<Vec<(String, String)>> {
    let mut query = vec![
        ("op".to_string(), DATA_OP.to_string()),
        ("varcd".to_string(), code.to_string()),
    ];
    if let Some(start) = page.start {
        query.push(("start".into(), start.to_string()));
    }
    if let Some(count) = page.count {
        query.push(("count".into(), count.to_string()));
    }
    if let Some(filter) = filter {
        check_key_shape(filter)?;
        query.extend(filter.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    }
    Ok(query)
}

pub fn metadata_query(code: &str) -> Vec<(String, String)> {
    vec![("varcd".to_string(), code.to_string())]
}

pub fn catalogue_query(scope: CatalogueScope, code: Option<&str>) -> Vec<(String, String)> {
    let mut query = vec![("opc".to_string(), scope.opc().to_string())];
    if let Some(code) = code {
        query.push(("varcd".into(), code.to_string()));
    }
    query
}

/// Append the language parameter every request carries.
pub fn with_language(mut query: Vec<(String, String)>, language: Language) -> Vec<(String, String)> {
    query.retain(|(k, _)| k != "lang");
    query.push(("lang".into(), language.as_str().into()));
    query
}

/// Map an HTTP status to the error taxonomy.
pub fn check_status(status: u16, body: &str) -> Result<()> {
    match status {
        200..=299 => Ok(()),
        429 => Err(Error::RateLimit("Too many requests to INE API".into())),
        404 => Err(Error::NotFound("Resource not found".into())),
        _ => {
            let snippet: String = body.trim().chars().take(200).collect();
            let message = if snippet.is_empty() {
                format!("request failed with HTTP {status}")
            } else {
                snippet
            };
            Err(Error::Api { status, message })
        }
    }
}

pub fn decode_json(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| Error::Decode {
        format: "json",
        message: e.to_string(),
    })
}

pub(crate) fn map_reqwest_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else if e.is_connect() {
        Error::Connection(format!("connection failed: {e}"))
    } else {
        Error::Connection(format!("request failed: {e}"))
    }
}

/// Read-through lookup in the namespace's cache, if caching is enabled.
pub(crate) fn cached_body(
    cache: Option<&DiskCache>,
    ns: Namespace,
    url: &str,
    query: &[(String, String)],
) -> Option<String> {
    cache.and_then(|c| c.session(ns).get(&request_key(url, query)))
}

/// Store a successful body; cache write failures are logged, never fatal.
pub(crate) fn store_body(
    cache: Option<&DiskCache>,
    ns: Namespace,
    url: &str,
    query: &[(String, String)],
    body: &str,
) {
    if let Some(c) = cache
        && let Err(e) = c.session(ns).put(&request_key(url, query), body)
    {
        log::warn!(target: LOG_TARGET, "{e}");
    }
}

/// Whether a normalized payload still lacks a title or unit.
pub(crate) fn needs_metadata(normalized: &NormalizedData) -> bool {
    normalized.title.is_none() || normalized.unit.is_none()
}

/// Assemble the caller-facing response; title and unit missing from the payload
/// are taken from `metadata` when given.
pub(crate) fn into_response(
    code: &str,
    language: Language,
    normalized: NormalizedData,
    metadata: Option<&IndicatorMetadata>,
) -> DataResponse {
    let mut resp = DataResponse::new(normalized.indicator_code.unwrap_or_else(|| code.to_string()), language);
    resp.language = normalized.language.unwrap_or(language);
    resp.title = normalized
        .title
        .or_else(|| metadata.map(|m| m.title.clone()).filter(|t| !t.is_empty()))
        .unwrap_or_default();
    resp.unit = normalized
        .unit
        .or_else(|| metadata.and_then(|m| m.unit.clone()));
    resp.data = normalized.records;
    resp
}

/// Error for a chunked iteration that hit the page bound without a short page.
pub(crate) fn page_limit_error(code: &str, max_pages: usize) -> Error {
    Error::Processing(format!(
        "page limit exceeded ({max_pages}) while paginating indicator {code}"
    ))
}
