//! Polling sessions.
//!
//! A [`Session`] turns one `schedule` call into a chain of rounds. Each
//! chain runs in its own task:
//!
//! ```text
//! wait for deadline → issue request → dispatch response → update request → repeat?
//! ```
//!
//! Rounds of one chain never overlap: the next deadline is only computed
//! once the previous response has been fully processed. Separate chains run
//! independently.
//!
//! # Cancellation
//!
//! [`Session::cancel_all`] aborts every in-flight fetch and revokes every
//! chain scheduled before the call, including chains whose timer has fired
//! but whose request has not been issued yet. Chains scheduled afterwards
//! run normally.

mod ledger;

pub use crate::domain::HeaderPolicy;
pub use ledger::InFlightTask;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::app::{PollError, Result};
use crate::config::SessionConfig;
use crate::domain::request::FAR_FUTURE;
use crate::domain::{Continuation, PollRequest, ResourceResolver};
use crate::fetcher::{FetchResponse, Fetcher};
use crate::logging::{NETWORKING, SESSION};
use crate::processor::codec::pretty_printed;
use crate::processor::ProcessorGroup;
use ledger::{spawn_ledger, LedgerHandle};

/// Interval used by chains scheduled without one.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// How one round ended.
#[derive(Debug)]
pub enum RoundOutcome {
    /// A processor handled the response and returned this decision.
    Processed(Continuation),
    /// The round failed; the chain carried on as if `Inherit` was returned.
    Failed(PollError),
}

/// Summary of a finished chain.
#[derive(Debug)]
pub struct ChainReport {
    /// Rounds run, including ones that failed before a request went out.
    pub rounds: u64,
    /// How the final round ended. `None` if no round ran.
    pub last_outcome: Option<RoundOutcome>,
    /// The chain ended because of [`Session::cancel_all`].
    pub cancelled: bool,
    /// State the chain would have carried into its next round.
    pub request: PollRequest,
}

/// Handle to a running chain. Dropping it does not stop the chain.
pub struct ChainHandle {
    handle: JoinHandle<ChainReport>,
}

impl ChainHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the chain to end.
    pub async fn finished(self) -> Result<ChainReport> {
        Ok(self.handle.await?)
    }
}

/// When and how a new chain starts.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOptions {
    /// Validator to send with the first request.
    pub tag: Option<String>,
    /// Keep polling at this interval. `None` schedules a single round.
    pub repeat_every: Option<Duration>,
    /// When the first round fires. `None` means now.
    pub deadline: Option<Instant>,
}

impl ScheduleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn repeat_every(mut self, interval: Duration) -> Self {
        self.repeat_every = Some(interval);
        self
    }

    pub fn at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn after(self, delay: Duration) -> Self {
        let now = Instant::now();
        self.at(now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE))
    }
}

pub struct SessionBuilder {
    base: Url,
    token: String,
    fetcher: Arc<dyn Fetcher>,
    default_interval: Duration,
    policy: HeaderPolicy,
}

impl SessionBuilder {
    pub fn default_interval(mut self, interval: Duration) -> Self {
        self.default_interval = interval;
        self
    }

    pub fn header_policy(mut self, policy: HeaderPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the session. Must be called inside a Tokio runtime.
    pub fn build(self) -> Session {
        let mut base = self.base;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Session {
            inner: Arc::new(SessionInner {
                fetcher: self.fetcher,
                base,
                token: self.token,
                default_interval: self.default_interval,
                policy: self.policy,
                ledger: spawn_ledger(),
                generation: Mutex::new(CancellationToken::new()),
            }),
        }
    }
}

struct SessionInner {
    fetcher: Arc<dyn Fetcher>,
    base: Url,
    token: String,
    default_interval: Duration,
    policy: HeaderPolicy,
    ledger: LedgerHandle,
    /// Revoked and replaced by `cancel_all`.
    generation: Mutex<CancellationToken>,
}

/// Schedules polling chains against one service.
///
/// Cheap to clone; clones share the fetcher and the in-flight set.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session with default settings. Must be called inside a
    /// Tokio runtime.
    pub fn new(base: Url, token: impl Into<String>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::builder(base, token, fetcher).build()
    }

    pub fn builder(base: Url, token: impl Into<String>, fetcher: Arc<dyn Fetcher>) -> SessionBuilder {
        SessionBuilder {
            base,
            token: token.into(),
            fetcher,
            default_interval: DEFAULT_INTERVAL,
            policy: HeaderPolicy::default(),
        }
    }

    pub fn from_config(config: &SessionConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        let base = Url::parse(&config.base_url)?;
        Ok(Self::builder(base, config.resolved_token(), fetcher)
            .default_interval(config.default_interval())
            .header_policy(config.header_policy())
            .build())
    }

    pub fn base(&self) -> &Url {
        &self.inner.base
    }

    pub fn token(&self) -> &str {
        &self.inner.token
    }

    pub fn default_interval(&self) -> Duration {
        self.inner.default_interval
    }

    pub fn header_policy(&self) -> HeaderPolicy {
        self.inner.policy
    }

    /// Start a chain polling `resource`, dispatching responses to `processors`.
    pub fn schedule(
        &self,
        resource: impl ResourceResolver + 'static,
        processors: impl Into<Arc<ProcessorGroup>>,
        options: ScheduleOptions,
    ) -> ChainHandle {
        let request = PollRequest::new(
            Arc::new(resource),
            processors.into(),
            options.tag,
            options.repeat_every.is_some(),
            options.repeat_every.unwrap_or(self.inner.default_interval),
        );
        let deadline = options.deadline.unwrap_or_else(Instant::now);
        let generation = self.generation().clone();

        let session = self.clone();
        let handle = tokio::spawn(async move { session.run_chain(request, deadline, generation).await });
        ChainHandle { handle }
    }

    /// Poll `resource` once, now.
    pub fn poll(
        &self,
        resource: impl ResourceResolver + 'static,
        processors: impl Into<Arc<ProcessorGroup>>,
    ) -> ChainHandle {
        self.schedule(resource, processors, ScheduleOptions::default())
    }

    /// Cancel every in-flight request and revoke every chain scheduled so
    /// far. Returns the number of requests that were still running.
    pub async fn cancel_all(&self) -> usize {
        let revoked = std::mem::replace(&mut *self.generation(), CancellationToken::new());
        revoked.cancel();
        self.inner.ledger.cancel_all().await
    }

    /// Number of issued requests not yet pruned.
    pub async fn in_flight(&self) -> usize {
        self.inner.ledger.count().await
    }

    fn generation(&self) -> MutexGuard<'_, CancellationToken> {
        self.inner
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_chain(
        self,
        mut request: PollRequest,
        mut deadline: Instant,
        generation: CancellationToken,
    ) -> ChainReport {
        let mut rounds = 0;
        let mut last_outcome = None;
        let mut cancelled = false;

        loop {
            request.log_deadline(deadline);

            tokio::select! {
                _ = generation.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }

            // The timer may have fired just as the chain was revoked.
            if generation.is_cancelled() {
                cancelled = true;
                break;
            }

            let (next, outcome) = self.send(&request, &generation).await;
            rounds += 1;
            last_outcome = Some(outcome);
            request = next;

            if generation.is_cancelled() {
                cancelled = true;
                break;
            }

            match request.next_deadline(Instant::now()) {
                Some(next_deadline) => deadline = next_deadline,
                None => break,
            }
        }

        tracing::debug!(
            target: SESSION,
            "Chain for {} ended after {} rounds{}",
            request.processors().name(),
            rounds,
            if cancelled { " (cancelled)" } else { "" }
        );

        ChainReport {
            rounds,
            last_outcome,
            cancelled,
            request,
        }
    }

    /// Issue one round's request and process whatever comes back.
    async fn send(
        &self,
        request: &PollRequest,
        generation: &CancellationToken,
    ) -> (PollRequest, RoundOutcome) {
        let outbound = match request.outbound(self) {
            Ok(outbound) => outbound,
            Err(e) => {
                self.log_failure(request, &e, &[]);
                return (request.clone(), RoundOutcome::Failed(e));
            }
        };

        let path = outbound.url.path().to_string();
        let fetcher = self.inner.fetcher.clone();
        let task = tokio::spawn(async move { fetcher.fetch(outbound).await });

        self.inner
            .ledger
            .register(InFlightTask::new(
                path.clone(),
                task.abort_handle(),
                generation.clone(),
            ))
            .await;

        let fetched = match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(PollError::Transport("request cancelled".into())),
            Err(e) => Err(PollError::Transport(format!("fetch task failed: {}", e))),
        };

        if fetched.is_ok() {
            tracing::debug!(target: NETWORKING, "got response for {}", path);
        }

        let result = self.handle_response(request, fetched);
        self.inner.ledger.prune().await;
        result
    }

    /// Work out the next request and this round's outcome from a fetch result.
    ///
    /// Every failure is treated as `Inherit`. Header negotiation applies to
    /// any well-formed HTTP response, even one no processor could handle.
    pub fn handle_response(
        &self,
        request: &PollRequest,
        fetched: Result<FetchResponse>,
    ) -> (PollRequest, RoundOutcome) {
        let response = match fetched {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    target: NETWORKING,
                    "Request for {} failed: {}",
                    request.processors().name(),
                    e
                );
                return (request.clone(), RoundOutcome::Failed(e));
            }
        };

        let Some(meta) = response.meta else {
            let error = PollError::BadResponseShape {
                body: response.body.clone(),
            };
            self.log_failure(request, &error, &response.body);
            return (request.clone(), RoundOutcome::Failed(error));
        };

        let next = request.clone().negotiated(&meta, self.inner.policy);

        match request
            .processors()
            .decode(&meta, &response.body, request, self)
        {
            Ok(decision) => (next.with_continuation(decision), RoundOutcome::Processed(decision)),
            Err(e) => {
                self.log_failure(request, &e, &response.body);
                (next, RoundOutcome::Failed(e))
            }
        }
    }

    fn log_failure(&self, request: &PollRequest, error: &PollError, body: &[u8]) {
        tracing::warn!(
            target: SESSION,
            "Error thrown:\n- query: {}\n- target: {}\n- error: {}",
            request.processors().name(),
            request.resource().path(self),
            error
        );
        if !body.is_empty() {
            tracing::debug!(target: SESSION, "- data: {}", pretty_printed(body));
        }
    }
}
