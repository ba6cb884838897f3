//! Per-item failure type

use crate::http::HttpError;

/// Error from processing a single catalog item (download + persist).
///
/// These stay local to the item: the worker queues the item for another
/// attempt. Only [`is_fatal`](ItemError::is_fatal) errors escalate to the run.
#[derive(Debug)]
pub enum ItemError {
    Http(HttpError),
    Io(std::io::Error),
    /// File name from the catalog that cannot be used as a path component
    InvalidFileName(String),
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::InvalidFileName(name) => write!(f, "invalid file name {name:?}"),
        }
    }
}

impl std::error::Error for ItemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => std::error::Error::source(e),
            Self::Io(e) => std::error::Error::source(e),
            Self::InvalidFileName(_) => None,
        }
    }
}

impl From<HttpError> for ItemError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Io(io) => Self::Io(io),
            other => Self::Http(other),
        }
    }
}

impl From<std::io::Error> for ItemError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl ItemError {
    /// Infrastructure faults that retrying the item cannot fix.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Io(e) => e.kind() == std::io::ErrorKind::StorageFull,
            Self::Http(_) | Self::InvalidFileName(_) => false,
        }
    }
}
