use crate::app::{DecodeError, PollError, Result};
use crate::domain::{Continuation, PollRequest};
use crate::fetcher::ResponseMeta;
use crate::logging::SESSION;
use crate::processor::{DynProcessor, Processor};
use crate::session::Session;

/// Ordered processors for one resource.
pub struct ProcessorGroup {
    name: String,
    processors: Vec<Box<dyn DynProcessor>>,
    /// Built from a single processor; shortens the log line.
    single: bool,
}

impl ProcessorGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processors: Vec::new(),
            single: false,
        }
    }

    /// A group holding just `processor`, named after it.
    pub fn single<P: Processor>(processor: P) -> Self {
        let name = Processor::name(&processor).to_string();
        Self {
            name,
            processors: vec![Box::new(processor)],
            single: true,
        }
    }

    /// Append `processor`; it is consulted after every earlier one.
    pub fn with<P: Processor>(mut self, processor: P) -> Self {
        self.push(processor);
        self
    }

    pub fn push<P: Processor>(&mut self, processor: P) {
        self.processors.push(Box::new(processor));
        self.single = false;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Hand the response to the first processor claiming its status code.
    ///
    /// The first claim is final: if that processor fails to decode the
    /// body, the error is returned and later processors are not consulted,
    /// even if they would also have claimed the code.
    pub fn decode(
        &self,
        response: &ResponseMeta,
        body: &[u8],
        request: &PollRequest,
        session: &Session,
    ) -> Result<Continuation> {
        let status = response.status;
        let processor = self
            .processors
            .iter()
            .find(|p| p.claims(status))
            .ok_or(PollError::UnexpectedResponseCode(status))?;

        let decision = processor
            .decode_and_process(body, response, request, session)
            .map_err(|source| DecodeError {
                group: self.name.clone(),
                processor: processor.name().to_string(),
                body: body.to_vec(),
                source,
            })?;

        tracing::info!(
            target: SESSION,
            "Processed {}. Repeat status: {}.",
            self.describe(processor.name()),
            decision
        );
        Ok(decision)
    }

    fn describe(&self, processor: &str) -> String {
        if self.single {
            self.name.clone()
        } else {
            format!("{} using {}", self.name, processor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Resource;
    use crate::fetcher::MockFetcher;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    #[derive(Debug, Deserialize)]
    struct Named {
        #[allow(dead_code)]
        name: String,
    }

    struct Counting {
        label: &'static str,
        codes: Vec<u16>,
        calls: Arc<AtomicUsize>,
        decision: Continuation,
    }

    impl Counting {
        fn new(label: &'static str, codes: &[u16]) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let processor = Self {
                label,
                codes: codes.to_vec(),
                calls: calls.clone(),
                decision: Continuation::Inherit,
            };
            (processor, calls)
        }
    }

    impl Processor for Counting {
        type Payload = Named;

        fn name(&self) -> &str {
            self.label
        }

        fn codes(&self) -> &[u16] {
            &self.codes
        }

        fn process(&self, _: Named, _: &ResponseMeta, _: &PollRequest, _: &Session) -> Continuation {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.decision
        }
    }

    struct AnyJson {
        calls: Arc<AtomicUsize>,
    }

    impl Processor for AnyJson {
        type Payload = serde_json::Value;

        fn codes(&self) -> &[u16] {
            &[]
        }

        fn process(&self, _: serde_json::Value, _: &ResponseMeta, _: &PollRequest, _: &Session) -> Continuation {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Continuation::Continue
        }
    }

    fn fixture(group: ProcessorGroup) -> (Session, PollRequest) {
        let session = Session::new(
            Url::parse("https://api.example.com/").unwrap(),
            "t",
            Arc::new(MockFetcher::new()),
        );
        let request = PollRequest::new(
            Arc::new(Resource::new("thing")),
            Arc::new(group),
            None,
            false,
            Duration::from_secs(1),
        );
        (session, request)
    }

    fn meta(status: u16) -> ResponseMeta {
        ResponseMeta::new(Url::parse("https://api.example.com/thing").unwrap(), status)
    }

    #[tokio::test]
    async fn test_dispatch_isolation() {
        let (ok, ok_calls) = Counting::new("ok", &[200, 201]);
        let (missing, missing_calls) = Counting::new("missing", &[404]);
        let (limited, limited_calls) = Counting::new("limited", &[429]);
        let group = ProcessorGroup::new("things").with(ok).with(missing).with(limited);
        let (session, request) = fixture(group);

        let decision = request
            .processors()
            .decode(&meta(404), br#"{"name":"x"}"#, &request, &session)
            .unwrap();

        assert_eq!(decision, Continuation::Inherit);
        assert_eq!(ok_calls.load(Ordering::SeqCst), 0);
        assert_eq!(missing_calls.load(Ordering::SeqCst), 1);
        assert_eq!(limited_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unclaimed_code_is_unexpected() {
        let (ok, ok_calls) = Counting::new("ok", &[200]);
        let (session, request) = fixture(ProcessorGroup::new("things").with(ok));

        let err = request
            .processors()
            .decode(&meta(303), br#"{"name":"x"}"#, &request, &session)
            .unwrap_err();

        assert!(matches!(err, PollError::UnexpectedResponseCode(303)));
        assert_eq!(ok_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_decode_failure_does_not_fall_through() {
        let (strict, strict_calls) = Counting::new("strict", &[200]);
        let wildcard_calls = Arc::new(AtomicUsize::new(0));
        let group = ProcessorGroup::new("things").with(strict).with(AnyJson {
            calls: wildcard_calls.clone(),
        });
        let (session, request) = fixture(group);

        let err = request
            .processors()
            .decode(&meta(200), br#"{"count":3}"#, &request, &session)
            .unwrap_err();

        match err {
            PollError::Decode(decode) => {
                assert_eq!(decode.group, "things");
                assert_eq!(decode.processor, "strict");
                assert_eq!(decode.body, br#"{"count":3}"#);
            }
            other => panic!("expected decode error, got {other:?}"),
        }
        assert_eq!(strict_calls.load(Ordering::SeqCst), 0);
        assert_eq!(wildcard_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wildcard_claims_anything_in_order() {
        let wildcard_calls = Arc::new(AtomicUsize::new(0));
        let (late, late_calls) = Counting::new("late", &[500]);
        let group = ProcessorGroup::new("things")
            .with(AnyJson {
                calls: wildcard_calls.clone(),
            })
            .with(late);
        let (session, request) = fixture(group);

        let decision = request
            .processors()
            .decode(&meta(500), br#"{"name":"boom"}"#, &request, &session)
            .unwrap();

        assert_eq!(decision, Continuation::Continue);
        assert_eq!(wildcard_calls.load(Ordering::SeqCst), 1);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_single_group_takes_processor_name() {
        let group = ProcessorGroup::single(AnyJson {
            calls: Arc::new(AtomicUsize::new(0)),
        });
        assert_eq!(group.name(), "AnyJson");
        assert_eq!(group.len(), 1);
        assert_eq!(group.describe("AnyJson"), "AnyJson");
    }

    #[test]
    fn test_processor_names_keep_registration_order() {
        let (a, _) = Counting::new("a", &[200]);
        let (b, _) = Counting::new("b", &[]);
        let group = ProcessorGroup::new("g").with(a).with(b);
        assert_eq!(group.processor_names(), vec!["a", "b"]);
        assert_eq!(group.describe("b"), "g using b");
    }
}
