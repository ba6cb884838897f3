//! Modpull Core - Concurrency and retry engine for catalog downloads
//!
//! This crate provides the catalog-independent parts of a batch download:
//! a paginated cursor shared by parallel workers, worker-local retry queues,
//! run-wide statistics and abort signalling, plus the HTTP transport and
//! atomic on-disk storage the workers use.

pub mod error;
pub mod fatal;
pub mod http;
pub mod logging;
pub mod page_source;
pub mod progress;
pub mod retry;
pub mod stats;
pub mod storage;

// Re-exports for convenience
pub use error::ItemError;
pub use fatal::FatalSignal;
pub use http::{HttpConfig, HttpError, SHARED_RUNTIME, http_client, http_config, set_http_config};
pub use logging::{IndicatifLogger, init_logging};
pub use page_source::{PageFetch, PageSource};
pub use progress::{ProgressContext, SharedProgress};
pub use retry::{RetryEntry, RetryQueue};
pub use stats::{Stats, StatsSnapshot};
pub use storage::{AtomicFile, cleanup_partial_files, write_json, write_json_if_absent};

/// Thread-name prefix of download workers
pub const WORKER_THREAD_PREFIX: &str = "download-worker-";

/// Thread name of worker `idx`
pub fn worker_thread_name(idx: usize) -> String {
    format!("{WORKER_THREAD_PREFIX}{idx}")
}
