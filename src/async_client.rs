//! Async counterpart of [`Client`](crate::Client) over `reqwest`'s async client.
//!
//! The contract matches the blocking client: same endpoints, validation, caching
//! and error mapping. Several fetches can be awaited together with
//! [`AsyncClient::get_many`], which returns results in submission order.

use crate::cache::{DiskCache, Namespace};
use crate::catalogue;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{
    DataResponse, Dimension, DimensionFilter, Indicator, IndicatorMetadata, Language,
};
use crate::normalize::{normalize_data, normalize_metadata};
use crate::request::{
    self, CATALOGUE_ENDPOINT, CatalogueScope, DATA_ENDPOINT, METADATA_ENDPOINT, Page,
    map_reqwest_error,
};
use crate::transport::{MAX_REDIRECTS, USER_AGENT};
use crate::validate;
use futures::future::join_all;
use futures::stream::{self, Stream};
use reqwest::redirect::Policy;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

const LOG_TARGET: &str = "ine_rs::async_client";

#[derive(Debug)]
pub struct AsyncClient {
    config: ClientConfig,
    http: reqwest::Client,
    cache: Option<DiskCache>,
    metadata: Mutex<HashMap<String, IndicatorMetadata>>,
}

#[derive(Debug, Clone, Copy)]
struct PageState {
    offset: usize,
    pages: usize,
    done: bool,
}

impl AsyncClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Connection(format!("unable to build HTTP client: {e}")))?;
        let cache = config.cache.clone().map(DiskCache::new).transpose()?;
        Ok(Self {
            config,
            http,
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

    async fn request(
        &self,
        endpoint: &str,
        query: Vec<(String, String)>,
        ns: Namespace,
    ) -> Result<String> {
        let url = self.config.url(endpoint);
        let query = request::with_language(query, self.config.language);
        if let Some(body) = self.cached(ns, &url, &query).await {
            return Ok(body);
        }

        log::debug!(target: LOG_TARGET, "GET {url} params={query:?}");
        let started = Instant::now();
        let resp = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(map_reqwest_error)?;
        log::debug!(
            target: LOG_TARGET,
            "GET {url} -> {status} in {:.3}s",
            started.elapsed().as_secs_f64()
        );

        request::check_status(status, &body)?;
        self.store(ns, url, query, body.clone()).await;
        Ok(body)
    }

    /// Cache lookup on the blocking pool; the cache is plain file I/O.
    async fn cached(&self, ns: Namespace, url: &str, query: &[(String, String)]) -> Option<String> {
        let cache = self.cache.clone()?;
        let (url, query) = (url.to_string(), query.to_vec());
        tokio::task::spawn_blocking(move || request::cached_body(Some(&cache), ns, &url, &query))
            .await
            .inspect_err(|e| log::warn!(target: LOG_TARGET, "Cache read task failed: {e}"))
            .ok()
            .flatten()
    }

    async fn store(&self, ns: Namespace, url: String, query: Vec<(String, String)>, body: String) {
        let Some(cache) = self.cache.clone() else {
            return;
        };
        let written = tokio::task::spawn_blocking(move || {
            request::store_body(Some(&cache), ns, &url, &query, &body)
        })
        .await;
        if let Err(e) = written {
            log::warn!(target: LOG_TARGET, "Cache write task failed: {e}");
        }
    }

    async fn catalogue(&self, scope: CatalogueScope, code: Option<&str>) -> Result<Vec<Indicator>> {
        let xml = self
            .request(
                CATALOGUE_ENDPOINT,
                request::catalogue_query(scope, code),
                Namespace::Metadata,
            )
            .await?;
        catalogue::parse_catalogue(&xml)
    }

    pub async fn get_indicator(&self, code: &str) -> Result<Indicator> {
        self.catalogue(CatalogueScope::Single, Some(code))
            .await?
            .into_iter()
            .find(|ind| ind.code == code)
            .ok_or_else(|| Error::InvalidIndicator(format!("Indicator {code} not found in catalogue")))
    }

    pub async fn get_main_indicators(&self) -> Result<Vec<Indicator>> {
        self.catalogue(CatalogueScope::Main, None).await
    }

    pub async fn get_catalogue(&self) -> Result<Vec<Indicator>> {
        self.catalogue(CatalogueScope::All, None).await
    }

    pub async fn get_metadata(&self, code: &str) -> Result<IndicatorMetadata> {
        if let Some(meta) = self.metadata.lock().ok().and_then(|m| m.get(code).cloned()) {
            return Ok(meta);
        }
        let body = self
            .request(
                METADATA_ENDPOINT,
                request::metadata_query(code),
                Namespace::Metadata,
            )
            .await?;
        let meta = normalize_metadata(&request::decode_json(&body)?, code, self.config.language)?;
        if let Ok(mut memo) = self.metadata.lock() {
            memo.insert(code.to_string(), meta.clone());
        }
        Ok(meta)
    }

    pub async fn get_dimensions(&self, code: &str) -> Result<Vec<Dimension>> {
        Ok(self.get_metadata(code).await?.dimensions)
    }

    pub async fn validate_dimensions(&self, code: &str, filter: &DimensionFilter) -> Result<()> {
        validate::check_key_shape(filter)?;
        if filter.is_empty() {
            return Ok(());
        }
        let meta = self.get_metadata(code).await?;
        validate::validate_dimensions(&meta, filter)
    }

    async fn check_filter(&self, code: &str, filter: Option<&DimensionFilter>) -> Result<()> {
        let Some(filter) = filter else {
            return Ok(());
        };
        if self.config.validate_dimensions {
            self.validate_dimensions(code, filter).await
        } else {
            validate::check_key_shape(filter)
        }
    }

    async fn fetch(
        &self,
        code: &str,
        filter: Option<&DimensionFilter>,
        page: Page,
    ) -> Result<DataResponse> {
        let query = request::data_query(code, filter, page)?;
        let body = self.request(DATA_ENDPOINT, query, Namespace::Data).await?;
        let normalized = normalize_data(&request::decode_json(&body)?)?;

        let metadata = if self.config.validate_dimensions && request::needs_metadata(&normalized) {
            match self.get_metadata(code).await {
                Ok(meta) => Some(meta),
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not fetch metadata for {code}: {e}");
                    None
                }
            }
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

    pub async fn get_data(
        &self,
        code: &str,
        filter: Option<&DimensionFilter>,
    ) -> Result<DataResponse> {
        log::info!(target: LOG_TARGET, "Fetching data for indicator {code}");
        self.check_filter(code, filter).await?;
        let resp = self.fetch(code, filter, Page::default()).await?;
        log::info!(target: LOG_TARGET, "Retrieved {} data points for {code}", resp.len());
        Ok(resp)
    }

    pub async fn get_data_page(
        &self,
        code: &str,
        filter: Option<&DimensionFilter>,
        start: usize,
        count: usize,
    ) -> Result<DataResponse> {
        self.check_filter(code, filter).await?;
        self.fetch(code, filter, Page::new(start, count)).await
    }

    /// Stream of pages of `chunk_size` records, ending after the first short
    /// page. Validation runs before the stream is returned.
    pub async fn get_all_data(
        &self,
        code: &str,
        filter: Option<&DimensionFilter>,
        chunk_size: usize,
    ) -> Result<impl Stream<Item = Result<DataResponse>> + '_> {
        if chunk_size == 0 {
            return Err(Error::Validation("chunk_size must be at least 1".into()));
        }
        self.check_filter(code, filter).await?;

        let code = code.to_string();
        let filter = filter.cloned();
        let max_pages = self.config.max_pages;
        let start = PageState {
            offset: 0,
            pages: 0,
            done: false,
        };
        Ok(stream::try_unfold(start, move |state| {
            let code = code.clone();
            let filter = filter.clone();
            async move {
                if state.done {
                    return Ok(None);
                }
                if state.pages >= max_pages {
                    return Err(request::page_limit_error(&code, max_pages));
                }
                log::info!(
                    target: LOG_TARGET,
                    "Fetching chunk {} for {code} (start={}, count={chunk_size})",
                    state.pages + 1,
                    state.offset
                );
                let resp = self
                    .fetch(&code, filter.as_ref(), Page::new(state.offset, chunk_size))
                    .await?;
                let next = PageState {
                    offset: state.offset + chunk_size,
                    pages: state.pages + 1,
                    done: resp.len() < chunk_size,
                };
                Ok(Some((resp, next)))
            }
        }))
    }

    /// Run several data fetches concurrently. Results come back in the order
    /// the requests were given, whatever order they complete in.
    pub async fn get_many(
        &self,
        requests: &[(&str, Option<DimensionFilter>)],
    ) -> Vec<Result<DataResponse>> {
        join_all(
            requests
                .iter()
                .map(|(code, filter)| self.get_data(code, filter.as_ref())),
        )
        .await
    }

    pub fn clear_cache(&self) -> Result<()> {
        match &self.cache {
            Some(cache) => cache.clear(),
            None => Ok(()),
        }
    }
}
