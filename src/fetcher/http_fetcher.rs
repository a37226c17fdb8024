use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::app::Result;
use crate::config::HttpConfig;
use crate::fetcher::{FetchResponse, Fetcher, OutboundRequest, ResponseMeta};
use crate::logging::NETWORKING;

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_config(&HttpConfig::default())
    }

    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: OutboundRequest) -> Result<FetchResponse> {
        tracing::debug!(target: NETWORKING, "{} {}", request.method, request.url);

        let response = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .send()
            .await?;

        let meta = ResponseMeta {
            url: response.url().clone(),
            status: response.status().as_u16(),
            headers: response.headers().clone(),
        };

        let body = response.bytes().await?.to_vec();
        tracing::debug!(
            target: NETWORKING,
            "{} {} ({} bytes)",
            meta.status,
            meta.url,
            body.len()
        );

        Ok(FetchResponse {
            body,
            meta: Some(meta),
        })
    }
}
