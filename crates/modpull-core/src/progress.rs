//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: one status line per worker plus an overall item counter.
//! Non-TTY mode: hidden bars, log output only.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Overall counter when the item total is known (limit set)
fn bounded_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<18.cyan.bold} {bar:30.green/dim} {pos:>7}/{len:7} {elapsed:>4} {wide_msg:.dim}")
        .expect("invalid template")
        .progress_chars("--")
}

/// Overall counter for an unbounded catalog
fn unbounded_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:<16.cyan.bold} {pos:>7} items {elapsed:>4} {wide_msg:.dim}")
        .expect("invalid template")
}

/// Per-worker status line
fn worker_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:<18.dim} {wide_msg:.dim}").expect("invalid template")
}

/// Central progress context managing multi-progress bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        let is_tty = std::io::stderr().is_terminal();
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Context that never draws (tests, piped output)
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty: false,
        }
    }

    /// Overall resolved-items counter.
    ///
    /// With a known `total` (item limit) renders a bar, otherwise a spinner.
    pub fn items_bar(&self, total: Option<u64>) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = match total {
            Some(total) => {
                let pb = self.multi.add(ProgressBar::new(total));
                pb.set_style(bounded_style());
                pb
            }
            None => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(unbounded_style());
                pb.enable_steady_tick(Duration::from_millis(80));
                pb
            }
        };
        pb.set_prefix("items");
        pb
    }

    /// Status line for one worker; update with `set_message`.
    pub fn worker_line(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(worker_style());
        pb.set_prefix(name.to_string());
        pb
    }

    /// Print a line above managed progress bars (avoids interference).
    ///
    /// Use this instead of `eprintln!` when progress bars are active.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
