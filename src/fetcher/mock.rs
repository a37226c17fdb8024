//! Deterministic fetcher for tests and offline runs.
//!
//! Maps addresses to canned responses without touching the network. An
//! address is matched first against the full request URL, then against
//! its path. A route registered with several responses hands them out in
//! order and keeps repeating the last one.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use tokio::time::Instant;

use crate::app::{PollError, Result};
use crate::fetcher::{FetchResponse, Fetcher, OutboundRequest, ResponseMeta};

#[derive(Debug, Clone)]
enum Reply {
    Http {
        status: u16,
        body: Vec<u8>,
        headers: Vec<(String, String)>,
    },
    NotHttp(Vec<u8>),
    Fail(String),
}

/// A canned reply.
#[derive(Debug, Clone)]
pub struct MockResponse {
    reply: Reply,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            reply: Reply::Http {
                status,
                body: body.into(),
                headers: Vec::new(),
            },
        }
    }

    /// A reply with a JSON body and a matching content type.
    pub fn json(status: u16, body: &str) -> Self {
        Self::new(status, body).with_header("content-type", "application/json")
    }

    /// Bytes with no usable response metadata.
    pub fn not_http(body: impl Into<Vec<u8>>) -> Self {
        Self {
            reply: Reply::NotHttp(body.into()),
        }
    }

    /// A transport-level failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            reply: Reply::Fail(message.into()),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let Reply::Http { headers, .. } = &mut self.reply {
            headers.push((name.to_string(), value.to_string()));
        }
        self
    }
}

/// A request seen by the mock, with the instant it was issued.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: OutboundRequest,
    pub at: Instant,
}

#[derive(Default)]
struct MockState {
    routes: HashMap<String, VecDeque<MockResponse>>,
    fallback: Option<MockResponse>,
    requests: Vec<RecordedRequest>,
}

#[derive(Default)]
pub struct MockFetcher {
    state: Mutex<MockState>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for `address` (full URL or path).
    pub fn route(self, address: &str, response: MockResponse) -> Self {
        self.route_sequence(address, vec![response])
    }

    /// Serve `responses` for `address` one per request, repeating the last.
    /// An empty list leaves `address` to the fallback.
    pub fn route_sequence(self, address: &str, responses: Vec<MockResponse>) -> Self {
        self.lock()
            .routes
            .insert(address.to_string(), responses.into_iter().collect());
        self
    }

    /// Serve `response` for any address without a route.
    pub fn with_fallback(self, response: MockResponse) -> Self {
        self.lock().fallback = Some(response);
        self
    }

    /// Every request issued so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_response(state: &mut MockState, request: &OutboundRequest) -> Option<MockResponse> {
        let keys = [request.url.as_str(), request.url.path()];
        for key in keys {
            if let Some(queue) = state.routes.get_mut(key) {
                if queue.len() > 1 {
                    return queue.pop_front();
                }
                if let Some(last) = queue.front() {
                    return Some(last.clone());
                }
            }
        }
        state.fallback.clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: OutboundRequest) -> Result<FetchResponse> {
        let response = {
            let mut state = self.lock();
            state.requests.push(RecordedRequest {
                request: request.clone(),
                at: Instant::now(),
            });
            Self::next_response(&mut state, &request)
        };

        let response = response.ok_or_else(|| {
            PollError::Transport(format!("no mock response for {}", request.url))
        })?;

        match response.reply {
            Reply::Http {
                status,
                body,
                headers,
            } => {
                let mut meta = ResponseMeta::new(request.url, status);
                for (name, value) in headers {
                    let name = HeaderName::from_bytes(name.as_bytes())
                        .map_err(|e| PollError::Transport(e.to_string()))?;
                    meta.headers.append(name, HeaderValue::from_str(&value)?);
                }
                Ok(FetchResponse {
                    body,
                    meta: Some(meta),
                })
            }
            Reply::NotHttp(body) => Ok(FetchResponse { body, meta: None }),
            Reply::Fail(message) => Err(PollError::Transport(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};
    use url::Url;

    fn get(url: &str) -> OutboundRequest {
        OutboundRequest::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_routes_by_full_url_and_path() {
        let mock = MockFetcher::new()
            .route("https://api.example.com/a", MockResponse::json(200, "{}"))
            .route("/b", MockResponse::json(404, "{}"));

        let a = assert_ok!(mock.fetch(get("https://api.example.com/a")).await);
        assert_eq!(a.meta.unwrap().status, 200);

        let b = assert_ok!(mock.fetch(get("https://api.example.com/b")).await);
        assert_eq!(b.meta.unwrap().status, 404);
    }

    #[tokio::test]
    async fn test_sequence_repeats_last_response() {
        let mock = MockFetcher::new().route_sequence(
            "/s",
            vec![MockResponse::json(200, "1"), MockResponse::json(200, "2")],
        );

        let mut bodies = Vec::new();
        for _ in 0..3 {
            let response = mock.fetch(get("https://x.test/s")).await.unwrap();
            bodies.push(String::from_utf8(response.body).unwrap());
        }
        assert_eq!(bodies, vec!["1", "2", "2"]);
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn test_unrouted_address_is_transport_error() {
        let mock = MockFetcher::new();
        let err = assert_err!(mock.fetch(get("https://x.test/missing")).await);
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_fallback_and_headers() {
        let mock = MockFetcher::new()
            .with_fallback(MockResponse::json(200, "{}").with_header("ETag", "\"v1\""));
        let response = mock.fetch(get("https://x.test/anything")).await.unwrap();
        let meta = response.meta.unwrap();
        assert_eq!(meta.header("etag"), Some("\"v1\""));
    }

    #[tokio::test]
    async fn test_empty_sequence_uses_fallback() {
        let mock = MockFetcher::new()
            .route_sequence("/empty", Vec::new())
            .with_fallback(MockResponse::json(202, "{}"));
        let response = assert_ok!(mock.fetch(get("https://x.test/empty")).await);
        assert_eq!(response.meta.unwrap().status, 202);
    }

    #[tokio::test]
    async fn test_not_http_has_no_meta() {
        let mock = MockFetcher::new().route("/raw", MockResponse::not_http("garbage"));
        let response = mock.fetch(get("https://x.test/raw")).await.unwrap();
        assert!(response.meta.is_none());
        assert_eq!(response.body, b"garbage");
    }
}
