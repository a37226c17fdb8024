use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::join_all;
use url::Url;

use crate::app::{AppContext, Result};
use crate::domain::{Continuation, PollRequest, Resource};
use crate::fetcher::ResponseMeta;
use crate::processor::{Processor, ProcessorGroup};
use crate::session::{ChainHandle, RoundOutcome, ScheduleOptions, Session};

/// Reports `304 Not Modified`.
pub struct NotModified;

impl Processor for NotModified {
    type Payload = ();

    fn codes(&self) -> &[u16] {
        &[304]
    }

    fn process(&self, _: (), response: &ResponseMeta, _: &PollRequest, _: &Session) -> Continuation {
        println!("{} not modified", response_line(304, &response.url, Utc::now()));
        Continuation::Inherit
    }
}

/// Prints any JSON response.
pub struct PrintJson;

impl Processor for PrintJson {
    type Payload = serde_json::Value;

    fn codes(&self) -> &[u16] {
        &[]
    }

    fn process(
        &self,
        payload: serde_json::Value,
        response: &ResponseMeta,
        _: &PollRequest,
        _: &Session,
    ) -> Continuation {
        let rendered = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
        println!("{}\n{}", response_line(response.status, &response.url, Utc::now()), rendered);
        Continuation::Inherit
    }
}

/// Header line printed for each response.
pub fn response_line(status: u16, url: &Url, received: DateTime<Utc>) -> String {
    format!(
        "[{}] {} {}",
        received.to_rfc3339_opts(SecondsFormat::Secs, true),
        status,
        url
    )
}

pub fn watch_group() -> ProcessorGroup {
    ProcessorGroup::new("watch").with(NotModified).with(PrintJson)
}

/// Poll every path until each chain ends or Ctrl-C cancels them.
pub async fn watch(
    ctx: &AppContext,
    paths: &[String],
    every: Option<Duration>,
    etag: Option<String>,
) -> Result<()> {
    let mut options = ScheduleOptions::new();
    if let Some(every) = every {
        options = options.repeat_every(every);
    }
    if let Some(etag) = etag {
        options = options.tag(etag);
    }

    let group = std::sync::Arc::new(watch_group());
    let chains: Vec<ChainHandle> = paths
        .iter()
        .map(|path| {
            ctx.session
                .schedule(Resource::new(path.as_str()), group.clone(), options.clone())
        })
        .collect();

    let session = ctx.session.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("Stopping...");
            session.cancel_all().await;
        }
    });

    let reports = join_all(chains.into_iter().map(ChainHandle::finished)).await;
    interrupt.abort();

    let mut failed = 0;
    for report in reports {
        let report = report?;
        if let Some(RoundOutcome::Failed(e)) = &report.last_outcome {
            if !report.cancelled {
                failed += 1;
                eprintln!("Last round failed: {}", e);
            }
        }
    }

    if failed > 0 {
        println!("{} of {} chains ended with an error", failed, paths.len());
    }

    Ok(())
}
