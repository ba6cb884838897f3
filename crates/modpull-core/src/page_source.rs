//! Paginated cursor handing out non-overlapping batches to parallel workers

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One page request against the remote source.
///
/// Must return the items at positions `offset..offset + page_size` in source
/// order, and an empty page exactly when the source is exhausted.
pub trait PageFetch: Sync {
    type Item;

    fn fetch_page(&self, offset: usize, page_size: usize) -> anyhow::Result<Vec<Self::Item>>;
}

/// Thread-safe paginated cursor.
///
/// Workers call [`next_batch()`](PageSource::next_batch) to reserve the next
/// offset under the lock; the page request itself runs outside it, so
/// workers fetch different pages in parallel.
pub struct PageSource<F> {
    fetch: F,
    batch_size: usize,
    limit: Option<usize>,
    cursor: Mutex<Cursor>,
    drawn: AtomicUsize,
}

/// State guarded by the cursor lock
#[derive(Debug, Default)]
struct Cursor {
    offset: usize,
    /// Reservations handed out so far
    reserved: usize,
}

impl<F: PageFetch> PageSource<F> {
    /// `limit: None` draws until the source runs dry
    pub fn new(fetch: F, batch_size: usize, limit: Option<usize>) -> Self {
        Self {
            fetch,
            batch_size: batch_size.max(1),
            limit: limit.filter(|&l| l > 0),
            cursor: Mutex::new(Cursor::default()),
            drawn: AtomicUsize::new(0),
        }
    }

    /// Reserve `batch_size` positions.
    ///
    /// Returns the arrival number of this reservation and the offset to
    /// request; offset `n * batch_size` always goes to the `n`-th arrival.
    fn reserve(&self) -> (usize, usize) {
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        let arrival = cursor.reserved;
        let offset = cursor.offset;
        cursor.reserved += 1;
        cursor.offset += self.batch_size;
        (arrival, offset)
    }

    /// Next batch of items, or `None` once this caller reaches the end.
    ///
    /// End comes from the configured limit (without a request) or from an
    /// empty page. Errors from the source are returned as-is.
    pub fn next_batch(&self) -> anyhow::Result<Option<Vec<F::Item>>> {
        let (_, offset) = self.reserve();

        if let Some(limit) = self.limit {
            if offset >= limit {
                log::debug!("Offset {offset} at or past limit {limit}, stopping");
                return Ok(None);
            }
        }

        log::debug!("Requesting {} items at offset {offset}", self.batch_size);
        let mut page = self.fetch.fetch_page(offset, self.batch_size)?;
        if page.is_empty() {
            log::debug!("Source exhausted at offset {offset}");
            return Ok(None);
        }

        if let Some(limit) = self.limit {
            let allowance = limit - offset;
            if page.len() > allowance {
                log::debug!(
                    "Page at offset {offset} truncated from {} to {allowance} items to respect limit",
                    page.len()
                );
                page.truncate(allowance);
            }
        }

        self.drawn.fetch_add(page.len(), Ordering::Relaxed);
        Ok(Some(page))
    }

    /// Total items returned to callers so far
    pub fn drawn(&self) -> usize {
        self.drawn.load(Ordering::SeqCst)
    }

    /// Offsets reserved so far, including ones past the limit
    pub fn reservations(&self) -> usize {
        self.cursor.lock().unwrap_or_else(|e| e.into_inner()).reserved
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// In-memory source of `0..total` that records every requested offset
    struct Numbers {
        total: usize,
        requests: Mutex<Vec<usize>>,
    }

    impl Numbers {
        fn new(total: usize) -> Self {
            Self {
                total,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<usize> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl PageFetch for &Numbers {
        type Item = usize;

        fn fetch_page(&self, offset: usize, page_size: usize) -> anyhow::Result<Vec<usize>> {
            self.requests.lock().unwrap().push(offset);
            let end = (offset + page_size).min(self.total);
            Ok((offset.min(end)..end).collect())
        }
    }

    fn drain<F: PageFetch>(source: &PageSource<F>) -> Vec<Vec<F::Item>> {
        let mut batches = Vec::new();
        while let Some(batch) = source.next_batch().unwrap() {
            batches.push(batch);
        }
        batches
    }

    #[test]
    fn unlimited_reads_until_empty_page() {
        let numbers = Numbers::new(5);
        let source = PageSource::new(&numbers, 2, None);
        let batches = drain(&source);
        assert_eq!(batches, vec![vec![0, 1], vec![2, 3], vec![4]]);
        // one extra request observes the empty page
        assert_eq!(numbers.requests(), vec![0, 2, 4, 6]);
        assert_eq!(source.drawn(), 5);
    }

    #[test]
    fn non_positive_limit_means_unlimited() {
        let numbers = Numbers::new(3);
        let source = PageSource::new(&numbers, 2, Some(0));
        assert_eq!(source.limit(), None);
        assert_eq!(drain(&source).concat(), vec![0, 1, 2]);
    }

    #[test]
    fn limit_truncates_last_page_exactly() {
        let numbers = Numbers::new(5);
        let source = PageSource::new(&numbers, 2, Some(3));
        let batches = drain(&source);
        assert_eq!(batches, vec![vec![0, 1], vec![2]]);
        assert_eq!(source.drawn(), 3);
    }

    #[test]
    fn limit_reached_stops_without_request() {
        let numbers = Numbers::new(100);
        let source = PageSource::new(&numbers, 2, Some(4));
        assert_eq!(drain(&source).concat(), vec![0, 1, 2, 3]);
        // offset 4 is at the limit: no request for it
        assert_eq!(numbers.requests(), vec![0, 2]);
        // every later call also stops without a request
        assert!(source.next_batch().unwrap().is_none());
        assert_eq!(numbers.requests(), vec![0, 2]);
    }

    #[test]
    fn limit_larger_than_source() {
        let numbers = Numbers::new(3);
        let source = PageSource::new(&numbers, 2, Some(10));
        assert_eq!(drain(&source).concat(), vec![0, 1, 2]);
    }

    #[test]
    fn limit_smaller_than_one_batch() {
        let numbers = Numbers::new(500);
        let source = PageSource::new(&numbers, 200, Some(7));
        assert_eq!(drain(&source), vec![(0..7).collect::<Vec<_>>()]);
    }

    #[test]
    fn offset_advances_by_batch_size_even_for_short_pages() {
        struct Short;
        impl PageFetch for Short {
            type Item = usize;
            fn fetch_page(&self, offset: usize, _: usize) -> anyhow::Result<Vec<usize>> {
                Ok(if offset < 30 { vec![offset] } else { vec![] })
            }
        }
        let source = PageSource::new(Short, 10, None);
        assert_eq!(drain(&source).concat(), vec![0, 10, 20]);
    }

    #[test]
    fn source_error_propagates() {
        struct Broken;
        impl PageFetch for Broken {
            type Item = usize;
            fn fetch_page(&self, _: usize, _: usize) -> anyhow::Result<Vec<usize>> {
                anyhow::bail!("HTTP 503")
            }
        }
        let source = PageSource::new(Broken, 10, None);
        assert!(source.next_batch().is_err());
    }

    #[test]
    fn concurrent_callers_never_overlap() {
        let numbers = Numbers::new(10_000);
        let source = PageSource::new(&numbers, 7, Some(5_000));

        let batches: Mutex<Vec<Vec<usize>>> = Mutex::new(Vec::new());
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    while let Some(batch) = source.next_batch().unwrap() {
                        batches.lock().unwrap().push(batch);
                    }
                });
            }
        });

        let all: Vec<usize> = batches.into_inner().unwrap().concat();
        let unique: HashSet<usize> = all.iter().copied().collect();
        assert_eq!(all.len(), 5_000);
        assert_eq!(unique.len(), 5_000);
        assert_eq!(unique, (0..5_000).collect());
        assert_eq!(source.drawn(), 5_000);

        let requests = numbers.requests();
        let offsets: HashSet<usize> = requests.iter().copied().collect();
        assert_eq!(offsets.len(), requests.len());
        assert!(offsets.iter().all(|o| o % 7 == 0 && *o < 5_000));
    }

    #[test]
    fn offsets_increase_in_arrival_order() {
        let numbers = Numbers::new(0);
        let source = PageSource::new(&numbers, 7, None);

        let reserved: Mutex<Vec<(usize, usize)>> = Mutex::new(Vec::new());
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let mut mine = Vec::new();
                    for _ in 0..250 {
                        mine.push(source.reserve());
                    }
                    // a single caller sees strictly increasing offsets
                    assert!(mine.windows(2).all(|w| w[0].1 < w[1].1));
                    reserved.lock().unwrap().extend(mine);
                });
            }
        });

        let mut reserved = reserved.into_inner().unwrap();
        reserved.sort_unstable();
        assert_eq!(reserved.len(), 2_000);
        assert_eq!(source.reservations(), 2_000);
        for (n, &(arrival, offset)) in reserved.iter().enumerate() {
            assert_eq!(arrival, n);
            assert_eq!(offset, n * 7);
        }
        assert!(numbers.requests().is_empty());
    }
}
