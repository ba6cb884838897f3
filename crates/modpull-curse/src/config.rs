//! Download run configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::api::DEFAULT_API_URL;

/// Default worker count: half the CPUs, at least one
pub fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2);
    (cpus / 2).max(1)
}

/// Item cap from a CLI-style integer: `<= 0` means unlimited
pub fn limit_from_arg(limit: i64) -> Option<usize> {
    usize::try_from(limit).ok().filter(|&l| l > 0)
}

/// Where the catalog lives and how to find the section to download
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub api_url: String,
    /// Game whose items are downloaded
    pub game_slug: String,
    /// Category (section) inside that game
    pub category_slug: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            game_slug: "minecraft".to_string(),
            category_slug: "mc-mods".to_string(),
        }
    }
}

/// Runtime configuration for a download run
#[derive(Debug, Clone)]
pub struct Config {
    /// Game version files must list to be selected
    pub game_version: String,
    pub workers: usize,
    pub output_dir: PathBuf,
    /// Maximum items drawn from the catalog (`None` = all)
    pub limit: Option<usize>,
    /// Items requested per catalog page
    pub batch_size: usize,
    /// Attempts per item, counting the first
    pub max_attempts: u32,
    /// Delay before the first retry pass, doubled for each later pass
    pub retry_delay: Duration,
    /// Worker `n` waits `n * stagger` before its first draw
    pub stagger: Duration,
    pub catalog: CatalogSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            game_version: String::new(),
            workers: default_workers(),
            output_dir: PathBuf::from("mods"),
            limit: None,
            batch_size: 200,
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            stagger: Duration::ZERO,
            catalog: CatalogSettings::default(),
        }
    }
}

impl Config {
    /// Reject settings the worker pool cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.game_version.trim().is_empty(),
            "Game version must not be empty"
        );
        anyhow::ensure!(self.workers > 0, "Worker count must be at least 1");
        anyhow::ensure!(self.batch_size > 0, "Batch size must be at least 1");
        anyhow::ensure!(self.max_attempts > 0, "Max attempts must be at least 1");
        Ok(())
    }
}
