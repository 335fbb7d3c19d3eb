//! Blocking client for the INE (Statistics Portugal) indicator API.
//!
//! One [`Client`] covers the three endpoints the API exposes:
//! - the XML **catalogue** (`/ine/xml_indic.jsp`),
//! - per-indicator **metadata** (`/ine/json_indicador/pindicaMeta.jsp`),
//! - indicator **data** (`/ine/json_indicador/pindica.jsp`).
//!
//! Responses are read through the disk cache (catalogue and metadata in the
//! metadata namespace, observations in the data namespace) and normalized into
//! [`DataResponse`] values.
//!
//! ```no_run
//! # use ine_rs::{Client, ClientConfig, DimensionFilter};
//! let client = Client::new(ClientConfig::default())?;
//! let filter = DimensionFilter::new().with("Dim1", "S7A2023");
//! let resp = client.get_data("0004167", Some(&filter))?;
//! println!("{} rows of {}", resp.len(), resp.title);
//! # Ok::<(), ine_rs::Error>(())
//! ```

use crate::cache::{DiskCache, Namespace};
use crate::catalogue::{self, ThemeCount};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{
    CatalogueResponse, DataResponse, Dimension, DimensionFilter, Indicator, IndicatorMetadata,
    Language,
};
use crate::normalize::{normalize_data, normalize_metadata};
use crate::request::{
    self, CATALOGUE_ENDPOINT, CatalogueScope, DATA_ENDPOINT, METADATA_ENDPOINT, Page,
};
use crate::transport::{ReqwestTransport, Transport};
use crate::validate;
use std::collections::HashMap;
use std::sync::Mutex;

const LOG_TARGET: &str = "ine_rs::client";

pub struct Client {
    config: ClientConfig,
    transport: Box<dyn Transport>,
    cache: Option<DiskCache>,
    metadata: Mutex<HashMap<String, IndicatorMetadata>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Client over the production HTTP transport.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.timeout, config.connect_timeout)?;
        Self::with_transport(config, transport)
    }

    /// Client over a caller-supplied transport.
    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Result<Self> {
        let cache = config.cache.clone().map(DiskCache::new).transpose()?;
        Ok(Self {
            config,
            transport: Box::new(transport),
            cache,
            metadata: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn language(&self) -> Language {
        self.config.language
    }

    pub fn cache(&self) -> Option<&DiskCache> {
        self.cache.as_ref()
    }

    /// GET `endpoint` with `lang` appended, through the cache namespace `ns`.
    fn request(&self, endpoint: &str, query: Vec<(String, String)>, ns: Namespace) -> Result<String> {
        let url = self.config.url(endpoint);
        let query = request::with_language(query, self.config.language);
        if let Some(body) = request::cached_body(self.cache.as_ref(), ns, &url, &query) {
            return Ok(body);
        }
        let resp = self.transport.get(&url, &query)?;
        request::check_status(resp.status, &resp.body)?;
        request::store_body(self.cache.as_ref(), ns, &url, &query, &resp.body);
        Ok(resp.body)
    }

    // ----- catalogue -----

    fn catalogue(&self, scope: CatalogueScope, code: Option<&str>) -> Result<Vec<Indicator>> {
        let xml = self.request(
            CATALOGUE_ENDPOINT,
            request::catalogue_query(scope, code),
            Namespace::Metadata,
        )?;
        catalogue::parse_catalogue(&xml)
    }

    /// Catalogue entry for one indicator.
    pub fn get_indicator(&self, code: &str) -> Result<Indicator> {
        log::info!(target: LOG_TARGET, "Fetching indicator {code}");
        self.catalogue(CatalogueScope::Single, Some(code))?
            .into_iter()
            .find(|ind| ind.code == code)
            .ok_or_else(|| Error::InvalidIndicator(format!("Indicator {code} not found in catalogue")))
    }

    pub fn get_main_indicators(&self) -> Result<Vec<Indicator>> {
        self.catalogue(CatalogueScope::Main, None)
    }

    /// The whole catalogue. Large; cached in the metadata namespace.
    pub fn get_catalogue(&self) -> Result<Vec<Indicator>> {
        log::info!(target: LOG_TARGET, "Fetching full indicator catalogue");
        let indicators = self.catalogue(CatalogueScope::All, None)?;
        log::info!(target: LOG_TARGET, "Retrieved {} indicators", indicators.len());
        Ok(indicators)
    }

    /// One indicator (when `code` is given) or the whole catalogue, wrapped with
    /// the request language and extraction time.
    pub fn catalogue_response(&self, code: Option<&str>) -> Result<CatalogueResponse> {
        let indicators = match code {
            Some(code) => vec![self.get_indicator(code)?],
            None => self.get_catalogue()?,
        };
        Ok(CatalogueResponse::new(indicators, self.config.language))
    }

    pub fn search(
        &self,
        query: &str,
        theme: Option<&str>,
        subtheme: Option<&str>,
    ) -> Result<Vec<Indicator>> {
        let all = self.get_catalogue()?;
        Ok(catalogue::search(&all, query, theme, subtheme)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn list_themes(&self) -> Result<Vec<ThemeCount>> {
        Ok(catalogue::list_themes(&self.get_catalogue()?))
    }

    // ----- metadata -----

    /// Indicator metadata, fetched once per client and memoized.
    pub fn get_metadata(&self, code: &str) -> Result<IndicatorMetadata> {
        if let Some(meta) = self.memo_get(code) {
            return Ok(meta);
        }
        log::debug!(target: LOG_TARGET, "Fetching metadata for {code}");
        let body = self.request(
            METADATA_ENDPOINT,
            request::metadata_query(code),
            Namespace::Metadata,
        )?;
        let raw = request::decode_json(&body)?;
        let meta = normalize_metadata(&raw, code, self.config.language)?;
        if let Ok(mut memo) = self.metadata.lock() {
            memo.insert(code.to_string(), meta.clone());
        }
        Ok(meta)
    }

    fn memo_get(&self, code: &str) -> Option<IndicatorMetadata> {
        self.metadata.lock().ok().and_then(|m| m.get(code).cloned())
    }

    pub fn get_dimensions(&self, code: &str) -> Result<Vec<Dimension>> {
        Ok(self.get_metadata(code)?.dimensions)
    }

    /// Check `filter` against the indicator's dimensions (fetching metadata if needed).
    pub fn validate_dimensions(&self, code: &str, filter: &DimensionFilter) -> Result<()> {
        validate::check_key_shape(filter)?;
        if filter.is_empty() {
            return Ok(());
        }
        let meta = self.get_metadata(code)?;
        validate::validate_dimensions(&meta, filter)
    }

    // ----- data -----

    fn check_filter(&self, code: &str, filter: Option<&DimensionFilter>) -> Result<()> {
        let Some(filter) = filter else {
            return Ok(());
        };
        if self.config.validate_dimensions {
            self.validate_dimensions(code, filter)
        } else {
            validate::check_key_shape(filter)
        }
    }

    fn fetch(&self, code: &str, filter: Option<&DimensionFilter>, page: Page) -> Result<DataResponse> {
        let query = request::data_query(code, filter, page)?;
        let body = self.request(DATA_ENDPOINT, query, Namespace::Data)?;
        let normalized = normalize_data(&request::decode_json(&body)?)?;

        let metadata = if self.config.validate_dimensions && request::needs_metadata(&normalized) {
            self.get_metadata(code)
                .inspect_err(|e| {
                    log::warn!(target: LOG_TARGET, "Could not fetch metadata for {code}: {e}")
                })
                .ok()
        } else {
            None
        };
        Ok(request::into_response(
            code,
            self.config.language,
            normalized,
            metadata.as_ref(),
        ))
    }

    /// All observations for an indicator, optionally filtered by dimension.
    pub fn get_data(&self, code: &str, filter: Option<&DimensionFilter>) -> Result<DataResponse> {
        log::info!(target: LOG_TARGET, "Fetching data for indicator {code}");
        self.check_filter(code, filter)?;
        let resp = self.fetch(code, filter, Page::default())?;
        log::info!(target: LOG_TARGET, "Retrieved {} data points for {code}", resp.len());
        Ok(resp)
    }

    /// One explicit `start`/`count` window.
    pub fn get_data_page(
        &self,
        code: &str,
        filter: Option<&DimensionFilter>,
        start: usize,
        count: usize,
    ) -> Result<DataResponse> {
        self.check_filter(code, filter)?;
        self.fetch(code, filter, Page::new(start, count))
    }

    /// Page through an indicator in chunks of `chunk_size` records.
    ///
    /// The filter is validated before any data request. The iterator ends after
    /// the first page shorter than `chunk_size`, after an error, or with a
    /// `Processing` error once `max_pages` full pages were fetched.
    pub fn get_all_data(
        &self,
        code: &str,
        filter: Option<&DimensionFilter>,
        chunk_size: usize,
    ) -> Result<DataPages<'_>> {
        if chunk_size == 0 {
            return Err(Error::Validation("chunk_size must be at least 1".into()));
        }
        self.check_filter(code, filter)?;
        Ok(DataPages {
            client: self,
            code: code.to_string(),
            filter: filter.cloned(),
            chunk_size,
            offset: 0,
            pages: 0,
            done: false,
        })
    }

    /// Remove every cached response; a no-op when caching is disabled.
    pub fn clear_cache(&self) -> Result<()> {
        match &self.cache {
            Some(cache) => cache.clear(),
            None => Ok(()),
        }
    }
}

/// Iterator returned by [`Client::get_all_data`].
#[derive(Debug)]
pub struct DataPages<'a> {
    client: &'a Client,
    code: String,
    filter: Option<DimensionFilter>,
    chunk_size: usize,
    offset: usize,
    pages: usize,
    done: bool,
}

impl Iterator for DataPages<'_> {
    type Item = Result<DataResponse>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.pages >= self.client.config.max_pages {
            self.done = true;
            return Some(Err(request::page_limit_error(
                &self.code,
                self.client.config.max_pages,
            )));
        }

        log::info!(
            target: LOG_TARGET,
            "Fetching chunk {} for {} (start={}, count={})",
            self.pages + 1,
            self.code,
            self.offset,
            self.chunk_size
        );
        let page = Page::new(self.offset, self.chunk_size);
        match self.client.fetch(&self.code, self.filter.as_ref(), page) {
            Ok(resp) => {
                self.pages += 1;
                if resp.len() < self.chunk_size {
                    self.done = true;
                } else {
                    self.offset += self.chunk_size;
                }
                Some(Ok(resp))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
