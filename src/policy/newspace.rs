use atomic::Atomic;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::trace;

use crate::policy::space::{Space, SpaceKind};
use crate::util::alloc::allocator::{align_allocation, fill_alignment_gap};
use crate::util::conversions::pages_to_bytes;
use crate::util::heap::PageProvider;
use crate::util::Address;

/// The young generation. A single contiguous extent reserved at setup, with
/// a lock-free bump frontier. Objects are reclaimed wholesale (or promoted
/// elsewhere) by a minor collection, which resets the frontier.
pub struct NewSpace {
    name: &'static str,
    start: Address,
    limit: Address,
    cursor: Atomic<Address>,
    pages: usize,
    provider: Arc<dyn PageProvider>,
}

impl NewSpace {
    /// Reserve the space's extent eagerly. Panics if the provider cannot map
    /// the initial extent; a heap that cannot reserve its young generation
    /// cannot be set up at all.
    pub fn new(name: &'static str, pages: usize, provider: Arc<dyn PageProvider>) -> Self {
        let start = provider
            .acquire_pages(pages)
            .unwrap_or_else(|| panic!("unable to reserve {} pages for {}", pages, name));
        let limit = start + pages_to_bytes(pages);
        NewSpace {
            name,
            start,
            limit,
            cursor: Atomic::new(start),
            pages,
            provider,
        }
    }

    /// Bump-allocate `size` bytes at the given alignment. The frontier is
    /// advanced atomically; any alignment gap is zero filler emitted before
    /// the returned address.
    pub fn allocate(&self, size: usize, align: usize) -> Option<Address> {
        debug_assert!(size > 0);
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
        trace!("{}: bump {} bytes at {}", self.name, size, start);
        Some(start)
    }

    /// Roll the frontier back over the allocation at `start`, if and only if
    /// it is still the most recent one. Used when object construction at a
    /// reserved address is abandoned.
    pub fn undo_allocation(&self, start: Address, size: usize) -> bool {
        self.cursor
            .compare_exchange(
                start + size,
                start,
                Ordering::Relaxed,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// Wholesale reclamation after a minor collection: everything below the
    /// frontier is dead or has been promoted by the collector.
    pub fn reset(&self) {
        trace!("{}: reset frontier to {}", self.name, self.start);
        self.cursor.store(self.start, Ordering::Relaxed);
    }

    /// The current allocation frontier.
    pub fn frontier(&self) -> Address {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Bytes allocated since the last reset, including filler.
    pub fn used_bytes(&self) -> usize {
        self.frontier() - self.start
    }
}

impl Space for NewSpace {
    fn kind(&self) -> SpaceKind {
        SpaceKind::Young
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

impl Drop for NewSpace {
    fn drop(&mut self) {
        self.provider.release_pages(self.start, self.pages);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::{DOUBLE_ALIGNMENT, TAGGED_ALIGNMENT};
    use crate::util::heap::MmapPageProvider;

    fn space() -> NewSpace {
        NewSpace::new("new_space", 4, Arc::new(MmapPageProvider::new()))
    }

    #[test]
    fn frontier_is_monotone_and_accounts_filler() {
        let space = space();
        let base = space.frontier();
        let mut expected = 0usize;
        for size in [8usize, 24, 3, 8] {
            let prev = space.frontier();
            let start = space.allocate(size, TAGGED_ALIGNMENT).unwrap();
            let filler = start - prev;
            expected += filler + size;
            assert!(space.frontier() >= prev);
            assert_eq!(space.frontier() - base, expected);
        }
    }

    #[test]
    fn alignment_is_satisfied() {
        let space = space();
        space.allocate(3, TAGGED_ALIGNMENT).unwrap();
        let addr = space.allocate(16, DOUBLE_ALIGNMENT).unwrap();
        assert!(addr.is_aligned_to(DOUBLE_ALIGNMENT));
    }

    #[test]
    fn extents_do_not_overlap() {
        let space = space();
        let mut granted: Vec<(Address, usize)> = vec![];
        for size in [16usize, 40, 8, 64, 8] {
            let start = space.allocate(size, TAGGED_ALIGNMENT).unwrap();
            granted.push((start, size));
        }
        for (i, &(a_start, a_size)) in granted.iter().enumerate() {
            for &(b_start, b_size) in &granted[i + 1..] {
                assert!(a_start + a_size <= b_start || b_start + b_size <= a_start);
            }
        }
    }

    #[test]
    fn exhaustion_returns_none() {
        let space = space();
        let capacity = space.capacity_bytes();
        assert!(space.allocate(capacity + 8, TAGGED_ALIGNMENT).is_none());
        // A fitting request still succeeds afterwards.
        assert!(space.allocate(8, TAGGED_ALIGNMENT).is_some());
    }

    #[test]
    fn undo_rolls_back_only_the_latest() {
        let space = space();
        let first = space.allocate(16, TAGGED_ALIGNMENT).unwrap();
        let second = space.allocate(16, TAGGED_ALIGNMENT).unwrap();
        assert!(!space.undo_allocation(first, 16));
        assert!(space.undo_allocation(second, 16));
        assert_eq!(space.frontier(), second);
    }

    #[test]
    fn reset_reclaims_wholesale() {
        let space = space();
        space.allocate(128, TAGGED_ALIGNMENT).unwrap();
        space.reset();
        assert_eq!(space.used_bytes(), 0);
    }
}
