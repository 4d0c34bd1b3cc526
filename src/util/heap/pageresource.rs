use std::sync::atomic::{AtomicUsize, Ordering};

use log::trace;

use crate::util::conversions::pages_to_bytes;
use crate::util::memory;
use crate::util::Address;

/// Source of raw pages for the spaces. A single call returns a contiguous,
/// page-aligned, zeroed range; ranges from distinct calls need not be
/// adjacent.
///
/// Returning `None` means the provider cannot supply the pages (address
/// space or budget exhausted); the allocator's retry policy decides what
/// happens next.
pub trait PageProvider: Sync + Send {
    /// Acquire `pages` contiguous pages. Returns the start of the range, or
    /// `None` on exhaustion.
    fn acquire_pages(&self, pages: usize) -> Option<Address>;

    /// Return a range previously handed out by `acquire_pages`.
    fn release_pages(&self, start: Address, pages: usize);

    /// Number of pages currently handed out.
    fn committed_pages(&self) -> usize;
}

/// The default page provider, backed by anonymous mmap. An optional page
/// budget bounds the total committed pages so that embedders and tests can
/// cap the heap; exceeding it makes `acquire_pages` fail deterministically.
pub struct MmapPageProvider {
    budget_pages: Option<usize>,
    committed: AtomicUsize,
}

impl MmapPageProvider {
    pub fn new() -> Self {
        MmapPageProvider {
            budget_pages: None,
            committed: AtomicUsize::new(0),
        }
    }

    pub fn with_budget(budget_pages: usize) -> Self {
        MmapPageProvider {
            budget_pages: Some(budget_pages),
            committed: AtomicUsize::new(0),
        }
    }

    fn charge(&self, pages: usize) -> bool {
        match self.budget_pages {
            None => {
                self.committed.fetch_add(pages, Ordering::Relaxed);
                true
            }
            Some(budget) => self
                .committed
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |committed| {
                    if committed + pages <= budget {
                        Some(committed + pages)
                    } else {
                        None
                    }
                })
                .is_ok(),
        }
    }
}

impl Default for MmapPageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PageProvider for MmapPageProvider {
    fn acquire_pages(&self, pages: usize) -> Option<Address> {
        debug_assert!(pages > 0);
        if !self.charge(pages) {
            trace!("page budget exhausted, requested {} pages", pages);
            return None;
        }
        match memory::mmap_anonymous(pages_to_bytes(pages)) {
            Ok(start) => {
                trace!("acquired {} pages at {}", pages, start);
                Some(start)
            }
            Err(e) => {
                trace!("mmap of {} pages failed: {}", pages, e);
                self.committed.fetch_sub(pages, Ordering::Relaxed);
                None
            }
        }
    }

    fn release_pages(&self, start: Address, pages: usize) {
        debug_assert!(!start.is_zero());
        // The range came from acquire_pages, so munmap can only fail on a
        // caller bug. Report it loudly in debug builds.
        let result = memory::munmap(start, pages_to_bytes(pages));
        debug_assert!(result.is_ok(), "munmap({}, {}) failed", start, pages);
        self.committed.fetch_sub(pages, Ordering::Relaxed);
    }

    fn committed_pages(&self) -> usize {
        self.committed.load(Ordering::Relaxed)
    }
}
