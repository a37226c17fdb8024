use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION, CACHE_CONTROL, IF_NONE_MATCH};
use tokio::time::Instant;
use url::Url;

use crate::app::{PollError, Result};
use crate::domain::{Continuation, ResourceResolver};
use crate::fetcher::{OutboundRequest, ResponseMeta};
use crate::interval::{format_interval, parse_seconds};
use crate::logging::{NETWORKING, SESSION};
use crate::processor::ProcessorGroup;
use crate::session::Session;

/// Entity tag validator returned by the server.
pub const ETAG_HEADER: &str = "etag";
/// Remaining request allowance; gates ETag adoption under the default policy.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Server-advised minimum poll interval, in seconds.
pub const POLL_INTERVAL_HEADER: &str = "x-poll-interval";

/// Upper bound on how far ahead a round is scheduled (about 30 years).
pub const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// How response headers feed back into the next round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPolicy {
    /// Only adopt an ETag when `X-RateLimit-Remaining` is also present.
    pub etag_requires_rate_limit: bool,
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        Self {
            etag_requires_rate_limit: true,
        }
    }
}

/// State carried from one round of a chain to the next.
///
/// Never mutated in place by the session: every round produces a new value
/// through the consuming `with_*` methods.
#[derive(Clone)]
pub struct PollRequest {
    resource: Arc<dyn ResourceResolver>,
    processors: Arc<ProcessorGroup>,
    tag: Option<String>,
    repeating: bool,
    interval: Duration,
}

impl PollRequest {
    pub fn new(
        resource: Arc<dyn ResourceResolver>,
        processors: Arc<ProcessorGroup>,
        tag: Option<String>,
        repeating: bool,
        interval: Duration,
    ) -> Self {
        Self {
            resource,
            processors,
            tag,
            repeating,
            interval,
        }
    }

    pub fn resource(&self) -> &dyn ResourceResolver {
        self.resource.as_ref()
    }

    pub fn processors(&self) -> &ProcessorGroup {
        &self.processors
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn repeating(&self) -> bool {
        self.repeating
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Apply a processor's decision to this round's repeating flag.
    pub fn with_continuation(mut self, decision: Continuation) -> Self {
        self.repeating = decision.should_repeat(self.repeating);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Raise the interval to `advised` if it is longer. Never lowers it.
    pub fn with_interval_floor(mut self, advised: Duration) -> Self {
        if advised > self.interval {
            tracing::info!(
                target: NETWORKING,
                "capped repeat interval of {} to X-Poll-Interval {}",
                format_interval(self.interval),
                format_interval(advised)
            );
            self.interval = advised;
        }
        self
    }

    /// Fold validator and interval hints from `response` into the next round.
    pub fn negotiated(self, response: &ResponseMeta, policy: HeaderPolicy) -> Self {
        let mut next = self;
        let remaining = response.header(RATE_LIMIT_REMAINING_HEADER);

        if let Some(remaining) = remaining {
            tracing::debug!(target: NETWORKING, "rate limit remaining: {}", remaining);
        }

        if let Some(tag) = response.header(ETAG_HEADER) {
            if remaining.is_some() || !policy.etag_requires_rate_limit {
                next = next.with_tag(tag);
            }
        }

        if let Some(advised) = response.header(POLL_INTERVAL_HEADER).and_then(parse_seconds) {
            next = next.with_interval_floor(advised);
        }

        next
    }

    /// When the next round should fire, if the chain keeps going.
    ///
    /// An interval too large to add to `now` waits until [`FAR_FUTURE`]
    /// from now instead.
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        self.repeating.then(|| {
            now.checked_add(self.interval)
                .unwrap_or_else(|| now + FAR_FUTURE)
        })
    }

    /// Build the outbound GET for this round.
    pub fn outbound(&self, session: &Session) -> Result<OutboundRequest> {
        let path = self.resource.path(session);
        let url = resolve(session.base(), &path)?;
        let mut request = OutboundRequest::get(url);

        let mut authorization = HeaderValue::from_str(&format!("bearer {}", session.token()))?;
        authorization.set_sensitive(true);
        request.headers.insert(AUTHORIZATION, authorization);
        request
            .headers
            .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        if let Some(tag) = &self.tag {
            match HeaderValue::from_str(tag) {
                Ok(value) => {
                    request.headers.insert(IF_NONE_MATCH, value);
                }
                Err(_) => tracing::warn!(target: NETWORKING, "ignoring unusable ETag {:?}", tag),
            }
        }

        tracing::debug!(
            target: SESSION,
            "Requesting {} for {} ({})",
            self.processors.name(),
            path,
            request.url
        );
        Ok(request)
    }

    pub(crate) fn log_deadline(&self, deadline: Instant) {
        let now = Instant::now();
        let time_info = if deadline <= now {
            "now.".to_string()
        } else {
            format!("in {}.", format_interval(deadline - now))
        };
        let repeat_info = if self.repeating {
            format!(" Will repeat every {}.", format_interval(self.interval))
        } else {
            String::new()
        };
        tracing::info!(
            target: SESSION,
            "Polling for {} {}{}",
            self.processors.name(),
            time_info,
            repeat_info
        );
    }
}

/// Append `path` under `base`. The result never leaves the base address.
///
/// An optional `?query` is carried over. Absolute URLs and `.`/`..`
/// segments are rejected.
fn resolve(base: &Url, path: &str) -> Result<Url> {
    if Url::parse(path).is_ok() {
        return Err(PollError::InvalidPath(path.to_string()));
    }

    let (path_part, query) = match path.split_once('?') {
        Some((path_part, query)) => (path_part, Some(query)),
        None => (path, None),
    };

    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| PollError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
        segments.pop_if_empty();
        for segment in path_part.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(PollError::InvalidPath(path.to_string()));
            }
            segments.push(segment);
        }
        if path_part.is_empty() || path_part.ends_with('/') {
            segments.push("");
        }
    }
    url.set_query(query);
    Ok(url)
}

impl fmt::Debug for PollRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollRequest")
            .field("processors", &self.processors.name())
            .field("tag", &self.tag)
            .field("repeating", &self.repeating)
            .field("interval", &self.interval)
            .finish()
    }
}
