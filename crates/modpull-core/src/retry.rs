//! Worker-local retry queue with bounded attempts per item

use std::time::Duration;

use crate::fatal::FatalSignal;
use crate::stats::Stats;

/// Delay before retry pass `pass` (1-based): `base * 2^(pass-1)`
pub fn backoff_duration(base: Duration, pass: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(pass.saturating_sub(1)))
}

/// A failed item waiting for another attempt
#[derive(Debug)]
pub struct RetryEntry<T> {
    pub item: T,
    pub attempts_remaining: u32,
}

/// Items whose first attempt failed, retried after the primary pass.
///
/// Each item gets `max_attempts` attempts in total, counting the one that
/// put it here. [`drain`](RetryQueue::drain) keeps making passes until every
/// entry has either succeeded or used up its attempts.
#[derive(Debug)]
pub struct RetryQueue<T> {
    entries: Vec<RetryEntry<T>>,
    max_attempts: u32,
    pass_delay: Duration,
}

impl<T> RetryQueue<T> {
    pub fn new(max_attempts: u32, pass_delay: Duration) -> Self {
        Self {
            entries: Vec::new(),
            max_attempts: max_attempts.max(1),
            pass_delay,
        }
    }

    /// Queue an item after its primary attempt failed
    pub fn push(&mut self, item: T) {
        // the primary attempt is charged here
        self.entries.push(RetryEntry {
            item,
            attempts_remaining: self.max_attempts - 1,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Retry every entry until the queue is empty.
    ///
    /// `attempt` returns `Ok(true)` on success and `Ok(false)` on an item
    /// failure; an `Err` is fatal and is returned immediately, dropping the
    /// remaining entries. Each resolution is recorded in `stats` as it happens.
    /// Stops early without error when `fatal` is tripped.
    pub fn drain(
        &mut self,
        stats: &Stats,
        fatal: &FatalSignal,
        mut attempt: impl FnMut(&T) -> anyhow::Result<bool>,
        mut describe: impl FnMut(&T) -> String,
    ) -> anyhow::Result<()> {
        let mut pass = 0u32;
        while !self.entries.is_empty() {
            pass += 1;
            let delay = backoff_duration(self.pass_delay, pass);
            if !delay.is_zero() {
                log::debug!(
                    "Retry pass {pass} over {} items in {delay:?}",
                    self.entries.len()
                );
                std::thread::sleep(delay);
            }

            for mut entry in std::mem::take(&mut self.entries) {
                if fatal.is_tripped() {
                    return Ok(());
                }
                if entry.attempts_remaining == 0 {
                    log::error!(
                        "Failed to process {} after {} attempts",
                        describe(&entry.item),
                        self.max_attempts
                    );
                    stats.record_failure();
                    continue;
                }

                if attempt(&entry.item)? {
                    stats.record_success();
                    continue;
                }

                entry.attempts_remaining -= 1;
                if entry.attempts_remaining == 0 {
                    log::error!(
                        "Failed to process {} after {} attempts",
                        describe(&entry.item),
                        self.max_attempts
                    );
                    stats.record_failure();
                } else {
                    log::warn!(
                        "Failed to process {}, {} attempts left",
                        describe(&entry.item),
                        entry.attempts_remaining
                    );
                    self.entries.push(entry);
                }
            }
        }
        Ok(())
    }
}
