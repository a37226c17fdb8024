pub mod http_fetcher;
pub mod mock;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

use crate::app::Result;

pub use http_fetcher::HttpFetcher;
pub use mock::{MockFetcher, MockResponse, RecordedRequest};

/// A fully built request, ready to hand to a [`Fetcher`].
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl OutboundRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
        }
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Status line and headers of an HTTP response.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub url: Url,
    pub status: u16,
    pub headers: HeaderMap,
}

impl ResponseMeta {
    pub fn new(url: Url, status: u16) -> Self {
        Self {
            url,
            status,
            headers: HeaderMap::new(),
        }
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// What came back from one fetch.
///
/// `meta` is `None` when the transport produced bytes but nothing that
/// looks like an HTTP response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub body: Vec<u8>,
    pub meta: Option<ResponseMeta>,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: OutboundRequest) -> Result<FetchResponse>;
}
