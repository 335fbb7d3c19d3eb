//! Blocking HTTP transport behind a narrow trait, so the client can be driven
//! by a scripted fake in tests.

use crate::error::{Error, Result};
use crate::request::map_reqwest_error;
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use std::time::{Duration, Instant};

const LOG_TARGET: &str = "ine_rs::transport";

pub const USER_AGENT: &str = concat!("ine-rs/", env!("CARGO_PKG_VERSION"));
pub const MAX_REDIRECTS: usize = 5;

/// Status and body of a completed GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }
}

/// `GET(url, query) -> (status, body)`. Implementations report transport
/// failures as [`Error::Connection`] or [`Error::Timeout`]; status codes are
/// classified by the caller.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse>;
}

/// Production transport over `reqwest::blocking`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: HttpClient,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Connection(format!("unable to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse> {
        log::debug!(target: LOG_TARGET, "GET {url} params={query:?}");
        let started = Instant::now();
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .map_err(map_reqwest_error)?;
        let status = resp.status().as_u16();
        let body = resp.text().map_err(map_reqwest_error)?;
        log::debug!(
            target: LOG_TARGET,
            "GET {url} -> {status} in {:.3}s",
            started.elapsed().as_secs_f64()
        );
        Ok(HttpResponse { status, body })
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse> {
        (**self).get(url, query)
    }
}
