use crate::cache::CacheConfig;
use crate::models::Language;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.ine.pt";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on pages fetched by one chunked iteration.
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Settings shared by [`Client`](crate::Client) and [`AsyncClient`](crate::AsyncClient).
///
/// ```
/// # use ine_rs::{ClientConfig, Language};
/// # use std::time::Duration;
/// let config = ClientConfig::default()
///     .with_language(Language::Pt)
///     .with_timeout(Duration::from_secs(60))
///     .without_cache();
/// assert!(config.cache.is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub language: Language,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Disk cache settings; `None` disables caching.
    pub cache: Option<CacheConfig>,
    /// Check filters against indicator metadata before sending, and fill a
    /// missing title/unit from metadata.
    pub validate_dimensions: bool,
    pub max_pages: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            language: Language::default(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            cache: Some(CacheConfig::default()),
            validate_dimensions: true,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cache_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.with_cache(CacheConfig::in_dir(dir))
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn with_validate_dimensions(mut self, enabled: bool) -> Self {
        self.validate_dimensions = enabled;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub(crate) fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}
