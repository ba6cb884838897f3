//! Catalog boundary used by the workers

use modpull_core::PageFetch;

use crate::model::{CatalogItem, FileRecord};

/// Remote catalog of downloadable items.
///
/// Every error is systemic (bad status, malformed payload, unknown id) and
/// aborts the run; per-item download trouble never goes through here.
pub trait CatalogClient: Send + Sync {
    /// Items at positions `offset..offset + page_size` of the filtered
    /// listing; empty exactly when the listing is exhausted
    fn list_page(&self, offset: usize, page_size: usize) -> anyhow::Result<Vec<CatalogItem>>;

    /// Full records for `ids`, one per id
    fn get_details(&self, ids: &[u64]) -> anyhow::Result<Vec<CatalogItem>>;

    /// All files of one item
    fn list_files(&self, item_id: u64) -> anyhow::Result<Vec<FileRecord>>;
}

/// Page listing of a catalog, as drawn by [`modpull_core::PageSource`]
pub struct CatalogPages<'a>(pub &'a dyn CatalogClient);

impl PageFetch for CatalogPages<'_> {
    type Item = CatalogItem;

    fn fetch_page(&self, offset: usize, page_size: usize) -> anyhow::Result<Vec<CatalogItem>> {
        self.0.list_page(offset, page_size)
    }
}

/// Detail lookup for a drawn batch, checked to return one record per id
pub fn resolve_details(
    catalog: &dyn CatalogClient,
    batch: &[CatalogItem],
) -> anyhow::Result<Vec<CatalogItem>> {
    let ids: Vec<u64> = batch.iter().map(|item| item.id).collect();
    let details = catalog.get_details(&ids)?;
    anyhow::ensure!(
        details.len() == ids.len(),
        "Catalog returned {} detail records for {} ids",
        details.len(),
        ids.len()
    );
    Ok(details)
}
