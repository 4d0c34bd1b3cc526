use atomic::Atomic;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace};

use crate::policy::space::{Space, SpaceKind};
use crate::util::alloc::allocator::{align_allocation, fill_alignment_gap};
use crate::util::conversions::pages_to_bytes;
use crate::util::heap::PageProvider;
use crate::util::Address;

/// The immutable read-only space. Populated by plain bump allocation during
/// a controlled startup phase, then sealed. Sealing is a one-way transition;
/// afterwards every allocation request fails deterministically. Exhaustion
/// of this space never triggers a collection, before or after sealing.
pub struct ReadOnlySpace {
    name: &'static str,
    start: Address,
    limit: Address,
    cursor: Atomic<Address>,
    sealed: AtomicBool,
    pages: usize,
    provider: Arc<dyn PageProvider>,
}

impl ReadOnlySpace {
    pub fn new(name: &'static str, pages: usize, provider: Arc<dyn PageProvider>) -> Self {
        let start = provider
            .acquire_pages(pages)
            .unwrap_or_else(|| panic!("unable to reserve {} pages for {}", pages, name));
        ReadOnlySpace {
            name,
            start,
            limit: start + pages_to_bytes(pages),
            cursor: Atomic::new(start),
            sealed: AtomicBool::new(false),
            pages,
            provider,
        }
    }

    pub fn allocate(&self, size: usize, align: usize) -> Option<Address> {
        debug_assert!(size > 0);
        if self.is_sealed() {
            trace!("{}: allocation rejected, space is sealed", self.name);
            return None;
        }
        let old = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cursor| {
                let start = align_allocation(cursor, align);
                let new_cursor = start + size;
                if new_cursor > self.limit {
                    None
                } else {
                    Some(new_cursor)
                }
            })
            .ok()?;
        let start = align_allocation(old, align);
        fill_alignment_gap(old, start);
        Some(start)
    }

    /// Seal the space. One-way; there is no unseal.
    pub fn seal(&self) {
        debug!("{}: sealed at {}", self.name, self.cursor.load(Ordering::Relaxed));
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub fn used_bytes(&self) -> usize {
        self.cursor.load(Ordering::Relaxed) - self.start
    }
}

impl Space for ReadOnlySpace {
    fn kind(&self) -> SpaceKind {
        SpaceKind::ReadOnly
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr < self.limit
    }

    fn committed_bytes(&self) -> usize {
        pages_to_bytes(self.pages)
    }

    fn capacity_bytes(&self) -> usize {
        pages_to_bytes(self.pages)
    }
}

impl Drop for ReadOnlySpace {
    fn drop(&mut self) {
        self.provider.release_pages(self.start, self.pages);
    }
}
