//! File download boundary

use std::path::Path;

use modpull_core::{ItemError, http};

/// Downloads one file's bytes to disk.
///
/// Implementations must make `dest` appear only once it is complete.
pub trait FileFetcher: Send + Sync {
    /// Returns bytes written
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, ItemError>;
}

/// Streams over the shared HTTP client
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl FileFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, ItemError> {
        Ok(http::download_to(url, dest)?)
    }
}
