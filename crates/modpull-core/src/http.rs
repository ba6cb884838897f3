//! Blocking HTTP transport over a shared async client.
//!
//! Uses async reqwest internally with tokio::time::timeout for stall detection,
//! but presents a sync interface for the worker threads. Concurrent requests
//! are admitted through a counting gate sized by [`HttpConfig::max_connections`];
//! callers block when it is exhausted.

use std::path::Path;
use std::sync::{Condvar, LazyLock, Mutex, OnceLock};
use std::time::Duration;

use futures_util::StreamExt;

use crate::storage::AtomicFile;

/// Transport settings, installed once before the first request.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    /// No data for this long while streaming a body = stall
    pub read_timeout: Duration,
    /// Upper bound on requests in flight across all workers
    pub max_connections: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            max_connections: 512,
        }
    }
}

static HTTP_CONFIG: OnceLock<HttpConfig> = OnceLock::new();

/// Install transport settings. Only the first call has an effect.
pub fn set_http_config(config: HttpConfig) {
    if HTTP_CONFIG.set(config).is_err() {
        log::debug!("HTTP config already installed, ignoring override");
    }
}

/// Current transport settings (defaults if none installed).
pub fn http_config() -> &'static HttpConfig {
    HTTP_CONFIG.get_or_init(HttpConfig::default)
}

/// Error types for transport operations
#[derive(Debug)]
pub enum HttpError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Failure reported by the HTTP client, URL stripped
    Transport(reqwest::Error),
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Transport(e) => match e.status() {
                Some(s) => write!(f, "HTTP {}: {e}", s.as_u16()),
                None => write!(f, "HTTP error: {e}"),
            },
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for HttpError {
    // the wrapped error is part of Display; chain from its cause
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http { .. } => None,
            Self::Transport(e) => std::error::Error::source(e),
            Self::Io(e) => std::error::Error::source(e),
        }
    }
}

impl HttpError {
    /// Create HTTP error from reqwest error, without the request URL
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        Self::Transport(e.without_url())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Io(_) => None,
        }
    }
}

impl From<std::io::Error> for HttpError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Counting gate limiting requests in flight.
///
/// Uses `Mutex + Condvar` from std.
pub struct ConnectionGate {
    available: Mutex<usize>,
    cond: Condvar,
}

/// RAII permit that returns its slot to the gate on drop.
pub struct ConnectionPermit<'a>(&'a ConnectionGate);

impl ConnectionGate {
    pub fn new(slots: usize) -> Self {
        Self {
            available: Mutex::new(slots.max(1)),
            cond: Condvar::new(),
        }
    }

    /// Block until a slot is free, then take it.
    pub fn acquire(&self) -> ConnectionPermit<'_> {
        let mut available = self.available.lock().unwrap_or_else(|e| e.into_inner());
        while *available == 0 {
            available = self.cond.wait(available).unwrap_or_else(|e| e.into_inner());
        }
        *available -= 1;
        ConnectionPermit(self)
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        *self.available.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ConnectionPermit<'_> {
    fn drop(&mut self) {
        let mut available = self.0.available.lock().unwrap_or_else(|e| e.into_inner());
        *available += 1;
        self.0.cond.notify_one();
    }
}

static GATE: LazyLock<ConnectionGate> =
    LazyLock::new(|| ConnectionGate::new(http_config().max_connections));

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    let config = http_config();
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(config.max_connections)
        .user_agent(concat!("modpull/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// GET `url` with query parameters, returning the body of a 2xx response.
pub fn get_text(url: &str, query: &[(&str, String)]) -> Result<String, HttpError> {
    let _permit = GATE.acquire();
    SHARED_RUNTIME.handle().block_on(async {
        let response = SHARED_CLIENT
            .get(url)
            .query(query)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(HttpError::from_reqwest)?;
        response.text().await.map_err(HttpError::from_reqwest)
    })
}

/// POST a JSON body, returning the body of a 2xx response.
pub fn post_json(url: &str, body: &impl serde::Serialize) -> Result<String, HttpError> {
    let payload = serde_json::to_vec(body).map_err(|e| HttpError::Http {
        status: None,
        message: format!("cannot encode request body: {e}"),
    })?;

    let _permit = GATE.acquire();
    SHARED_RUNTIME.handle().block_on(async {
        let response = SHARED_CLIENT
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(HttpError::from_reqwest)?;
        response.text().await.map_err(HttpError::from_reqwest)
    })
}

/// Stream the body of `url` into `dest`.
///
/// The body goes to the partial companion of `dest` first and is renamed into place only after the
/// last byte is written, so `dest` never exists half-written. Returns bytes
/// written.
pub fn download_to(url: &str, dest: &Path) -> Result<u64, HttpError> {
    let read_timeout = http_config().read_timeout;
    let mut file = AtomicFile::create(dest)?;

    let _permit = GATE.acquire();
    SHARED_RUNTIME.handle().block_on(async {
        let response = SHARED_CLIENT
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(HttpError::from_reqwest)?;

        let mut body = response.bytes_stream();
        loop {
            let chunk = match tokio::time::timeout(read_timeout, body.next()).await {
                Ok(Some(chunk)) => chunk.map_err(HttpError::from_reqwest)?,
                Ok(None) => break,
                Err(_) => {
                    return Err(HttpError::Io(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("read timeout ({}s with no data)", read_timeout.as_secs()),
                    )));
                }
            };
            file.write_all(&chunk)?;
        }
        Ok::<_, HttpError>(())
    })?;

    Ok(file.finalize()?)
}
