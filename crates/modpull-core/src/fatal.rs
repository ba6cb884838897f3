//! Run-wide abort signal shared by all workers

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot fatal signal.
///
/// The first [`trip`](FatalSignal::trip) stores its error and raises the
/// flag; later trips are logged and dropped. Workers poll
/// [`is_tripped`](FatalSignal::is_tripped) at their checkpoints and return,
/// and the runner collects the error after the join barrier.
#[derive(Default)]
pub struct FatalSignal {
    tripped: AtomicBool,
    error: Mutex<Option<anyhow::Error>>,
}

impl std::fmt::Debug for FatalSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FatalSignal")
            .field("tripped", &self.is_tripped())
            .finish_non_exhaustive()
    }
}

impl FatalSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fatal error and tell every worker to stop
    pub fn trip(&self, error: anyhow::Error) {
        let mut slot = self.error.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            log::error!("Fatal: {error:#}");
            *slot = Some(error);
        } else {
            log::debug!("Additional fatal error after abort: {error:#}");
        }
        self.tripped.store(true, Ordering::SeqCst);
    }

    /// Check if the run is being aborted
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Take the first recorded error
    pub fn take_error(&self) -> Option<anyhow::Error> {
        self.error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}
