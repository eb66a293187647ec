use dockwork_layout::{DockModelError, LayoutPersistError, PersistKey};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DockError>;

/// Failures of manager and registry calls.
///
/// Expected refusals (unknown target, non-closeable content, ...) are not
/// errors; those calls return `Ok(false)`.
#[derive(Debug, Error)]
pub enum DockError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("dock manager has been disposed")]
    Disposed,

    #[error("content factory returned {returned} for requested key {requested}")]
    FactoryKeyMismatch {
        requested: PersistKey,
        returned: PersistKey,
    },

    #[error("layout persistence failed: {0}")]
    Persist(#[from] LayoutPersistError),
}

impl DockError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

impl From<DockModelError> for DockError {
    fn from(err: DockModelError) -> Self {
        Self::invalid(err.to_string())
    }
}
