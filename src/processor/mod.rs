//! Status-code keyed response processing.
//!
//! A [`Processor`] claims a set of HTTP status codes, decodes a body into
//! its own payload type and decides whether the chain keeps polling. A
//! [`ProcessorGroup`] holds processors for one resource in registration
//! order and hands each response to the first one that claims it.
//!
//! ```rust,ignore
//! #[derive(Deserialize)]
//! struct Item { name: String }
//!
//! struct ItemProcessor;
//!
//! impl Processor for ItemProcessor {
//!     type Payload = Item;
//!
//!     fn codes(&self) -> &[u16] { &[200] }
//!
//!     fn process(&self, item: Item, _: &ResponseMeta, _: &PollRequest, _: &Session) -> Continuation {
//!         println!("Received item {}", item.name);
//!         Continuation::Inherit
//!     }
//! }
//!
//! let group = ProcessorGroup::new("items").with(ItemProcessor);
//! ```

pub mod codec;
mod group;

pub use group::ProcessorGroup;

use serde::de::DeserializeOwned;

use crate::domain::{Continuation, PollRequest};
use crate::fetcher::ResponseMeta;
use crate::session::Session;

pub trait Processor: Send + Sync + 'static {
    type Payload: DeserializeOwned;

    /// Name used in log messages. Defaults to the type name.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Status codes this processor handles. Empty claims every code.
    fn codes(&self) -> &[u16];

    fn decode(&self, body: &[u8]) -> Result<Self::Payload, serde_json::Error> {
        codec::decode(body)
    }

    fn process(
        &self,
        payload: Self::Payload,
        response: &ResponseMeta,
        request: &PollRequest,
        session: &Session,
    ) -> Continuation;
}

/// Object-safe view of a [`Processor`], so groups can hold processors
/// with different payload types in one list.
pub(crate) trait DynProcessor: Send + Sync {
    fn name(&self) -> &str;

    fn claims(&self, status: u16) -> bool;

    fn decode_and_process(
        &self,
        body: &[u8],
        response: &ResponseMeta,
        request: &PollRequest,
        session: &Session,
    ) -> Result<Continuation, serde_json::Error>;
}

impl<P: Processor> DynProcessor for P {
    fn name(&self) -> &str {
        Processor::name(self)
    }

    fn claims(&self, status: u16) -> bool {
        let codes = self.codes();
        codes.is_empty() || codes.contains(&status)
    }

    fn decode_and_process(
        &self,
        body: &[u8],
        response: &ResponseMeta,
        request: &PollRequest,
        session: &Session,
    ) -> Result<Continuation, serde_json::Error> {
        let payload = self.decode(body)?;
        Ok(self.process(payload, response, request, session))
    }
}
