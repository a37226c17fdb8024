use std::sync::Arc;

use crate::app::error::{PollError, Result};
use crate::config::Config;
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::Fetcher;
use crate::session::Session;

pub struct AppContext {
    pub config: Config,
    pub session: Session,
}

impl AppContext {
    /// Build a context talking HTTP. Must be called inside a Tokio runtime.
    pub fn new(config: Config) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::with_config(&config.http)?);
        Self::with_fetcher(config, fetcher)
    }

    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        if config.session.base_url.trim().is_empty() {
            return Err(PollError::Config("session.base_url is empty".into()));
        }

        let session = Session::from_config(&config.session, fetcher)?;
        Ok(Self { config, session })
    }
}
