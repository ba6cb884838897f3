//! Modpull Curse - CurseForge mod downloader
//!
//! This crate provides the catalog client, per-item download logic and the
//! worker pool that mirrors every mod of one game version to disk.

pub mod api;
pub mod catalog;
pub mod config;
pub mod fetcher;
pub mod model;
pub mod runner;
pub mod worker;

// Re-exports
pub use api::HttpCatalog;
pub use catalog::CatalogClient;
pub use config::{CatalogSettings, Config};
pub use fetcher::{FileFetcher, HttpFetcher};
pub use model::{CatalogItem, FileRecord};
pub use runner::{RunSummary, run};
pub use worker::ItemOutcome;
