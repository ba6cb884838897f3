//! Item processing and the per-worker draw/retry loop

use std::fs;
use std::path::Path;
use std::time::Duration;

use indicatif::ProgressBar;
use modpull_core::{FatalSignal, ItemError, PageSource, RetryQueue, Stats};

use crate::catalog::{CatalogClient, CatalogPages, resolve_details};
use crate::fetcher::FileFetcher;
use crate::model::{CatalogItem, ITEM_INFO_FILE, select_latest, sidecar_path};

/// How one processing attempt of an item ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Latest matching file fetched; bytes written
    Downloaded(u64),
    /// Latest matching file was already on disk
    AlreadyPresent,
    /// No file supports the game version; nothing to fetch
    NoMatchingFile,
    /// Transient failure, worth another attempt
    Failed,
}

impl ItemOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Failed)
    }

    /// Count the detail counters; success/failure is counted by the caller
    fn record_details(self, stats: &Stats) {
        match self {
            Self::Downloaded(bytes) => stats.record_download(bytes),
            Self::AlreadyPresent => stats.record_already_present(),
            Self::NoMatchingFile => stats.record_no_match(),
            Self::Failed => {}
        }
    }
}

/// Fetches and stores the latest matching file of an item
pub struct ItemProcessor<'a> {
    pub catalog: &'a dyn CatalogClient,
    pub fetcher: &'a dyn FileFetcher,
    pub output_dir: &'a Path,
    pub game_version: &'a str,
}

impl ItemProcessor<'_> {
    /// One processing attempt.
    ///
    /// Item-local trouble ends in `Ok(ItemOutcome::Failed)`; `Err` is a
    /// catalog or infrastructure fault and aborts the run.
    pub fn process(&self, item: &CatalogItem) -> anyhow::Result<ItemOutcome> {
        log::debug!("Processing {item}");
        match self.try_process(item) {
            Ok(outcome) => Ok(outcome),
            Err(Failure::Fatal(e)) => Err(e),
            Err(Failure::Item(e)) if e.is_fatal() => {
                Err(anyhow::Error::new(e).context(format!("Cannot store {item}")))
            }
            Err(Failure::Item(e)) => {
                log::error!("Error processing {item}: {e}");
                Ok(ItemOutcome::Failed)
            }
        }
    }

    fn try_process(&self, item: &CatalogItem) -> Result<ItemOutcome, Failure> {
        let item_dir = item.dir(self.output_dir);
        fs::create_dir_all(&item_dir).map_err(ItemError::from)?;
        modpull_core::write_json(&item_dir.join(ITEM_INFO_FILE), item).map_err(ItemError::from)?;

        let files = self.catalog.list_files(item.id).map_err(Failure::Fatal)?;
        let Some(file) = select_latest(&files, self.game_version) else {
            log::debug!("{item}: no file for {}", self.game_version);
            return Ok(ItemOutcome::NoMatchingFile);
        };

        let target = file.target_path(&item_dir)?;
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).map_err(ItemError::from)?;
        }

        let outcome = if target.exists() {
            log::debug!("{item}: {} already present", file.file_name);
            ItemOutcome::AlreadyPresent
        } else {
            let bytes = self
                .fetcher
                .fetch(&file.download_url, &target)
                .map_err(|e| {
                    log::error!(
                        "An error occurred downloading and saving from {}: {e}",
                        file.download_url
                    );
                    e
                })?;
            ItemOutcome::Downloaded(bytes)
        };

        modpull_core::write_json_if_absent(&sidecar_path(&target), file)
            .map_err(ItemError::from)?;
        Ok(outcome)
    }
}

/// Internal split between item-local and run-wide errors
enum Failure {
    Item(ItemError),
    Fatal(anyhow::Error),
}

impl From<ItemError> for Failure {
    fn from(e: ItemError) -> Self {
        Self::Item(e)
    }
}

/// Everything a worker shares with its siblings
pub struct WorkerContext<'a> {
    pub source: &'a PageSource<CatalogPages<'a>>,
    pub processor: ItemProcessor<'a>,
    pub stats: &'a Stats,
    pub fatal: &'a FatalSignal,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub items_bar: &'a ProgressBar,
}

impl WorkerContext<'_> {
    /// Primary pass over drawn batches, then retry of this worker's failures.
    ///
    /// Returns early and quietly once the fatal signal is tripped; returns
    /// `Err` for a fault raised by this worker.
    pub fn run(&self, worker_idx: usize, status: &ProgressBar) -> anyhow::Result<()> {
        log::info!("Starting worker {worker_idx}");
        let mut retry: RetryQueue<CatalogItem> =
            RetryQueue::new(self.max_attempts, self.retry_delay);

        loop {
            if self.fatal.is_tripped() {
                return Ok(());
            }
            status.set_message("waiting for page...");
            let Some(batch) = self.source.next_batch()? else {
                break;
            };

            status.set_message(format!("resolving {} items...", batch.len()));
            let details = resolve_details(self.processor.catalog, &batch)?;
            for item in details {
                if self.fatal.is_tripped() {
                    return Ok(());
                }
                status.set_message(item.name.clone());
                if self.attempt(&item)? {
                    self.stats.record_success();
                } else {
                    retry.push(item);
                }
                self.items_bar.set_position(self.stats.resolved() as u64);
            }
            log::info!("Worker {worker_idx} processed one batch of {}", batch.len());
        }

        if !retry.is_empty() {
            log::info!("Trying to process {} failed items again", retry.len());
            status.set_message(format!("retrying {} items...", retry.len()));
            retry.drain(
                self.stats,
                self.fatal,
                |item| {
                    status.set_message(format!("retry {}", item.name));
                    let ok = self.attempt(item);
                    self.items_bar.set_position(self.stats.resolved() as u64);
                    ok
                },
                |item| item.to_string(),
            )?;
            self.items_bar.set_position(self.stats.resolved() as u64);
        }

        status.finish_and_clear();
        log::debug!("Worker {worker_idx} finished");
        Ok(())
    }

    fn attempt(&self, item: &CatalogItem) -> anyhow::Result<bool> {
        let outcome = self.processor.process(item)?;
        outcome.record_details(self.stats);
        Ok(outcome.is_success())
    }
}
