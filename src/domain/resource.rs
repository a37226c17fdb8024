use crate::session::Session;

/// Something that resolves to a REST resource path, relative to the
/// session's base address.
pub trait ResourceResolver: Send + Sync {
    fn path(&self, session: &Session) -> String;
}

/// A resource with a fixed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    path: String,
}

impl Resource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl From<&str> for Resource {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl ResourceResolver for Resource {
    fn path(&self, _session: &Session) -> String {
        self.path.clone()
    }
}
