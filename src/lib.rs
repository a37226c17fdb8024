//! # jsonpoll
//!
//! A client-side polling engine for JSON REST services.
//!
//! ## Architecture
//!
//! Each scheduled resource becomes a chain of rounds:
//!
//! ```text
//! Session → PollRequest → Fetcher → ProcessorGroup → Continuation → next round
//! ```
//!
//! - [`session`]: schedules chains, tracks in-flight requests, cancels them
//! - [`fetcher`]: HTTP transport behind an async trait
//! - [`processor`]: status-code keyed decoding into typed payloads
//! - [`domain`]: poll request state, resources and continuation decisions
//!
//! ## Quick Start
//!
//! ```bash
//! # Poll once
//! jsonpoll watch repos/rust-lang/rust/issues
//!
//! # Keep polling every 30 seconds
//! jsonpoll watch --every 30s notifications
//! ```
//!
//! ## Modules
//!
//! - [`app`]: Application context and error types
//! - [`cli`]: Command-line interface definitions
//! - [`config`]: TOML configuration
//! - [`interval`]: Interval parsing and formatting
//! - [`logging`]: Tracing targets and subscriber setup

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the
/// configuration, the HTTP fetcher and the session.
pub mod app;

/// Command-line interface using clap.
///
/// - `watch <paths>... [--every <interval>]` - Poll resources
/// - `config-path` - Print the config file location
pub mod cli;

/// Configuration management.
///
/// Loads from `~/.config/jsonpoll/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`PollRequest`](domain::PollRequest): State carried between rounds
/// - [`Continuation`](domain::Continuation): Repeat decision
/// - [`ResourceResolver`](domain::ResourceResolver): Resolves a resource path
pub mod domain;

/// HTTP fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for issuing requests
/// - [`HttpFetcher`](fetcher::http_fetcher::HttpFetcher): reqwest-based implementation
/// - [`MockFetcher`](fetcher::mock::MockFetcher): Scripted responses for tests
pub mod fetcher;

pub mod interval;

pub mod logging;

/// Response processors.
pub mod processor;

/// Polling sessions and chain scheduling.
pub mod session;
