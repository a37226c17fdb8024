pub mod continuation;
pub mod request;
pub mod resource;

pub use continuation::Continuation;
pub use request::{HeaderPolicy, PollRequest};
pub use resource::{Resource, ResourceResolver};
