use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::trace;

use crate::policy::space::{Space, SpaceKind};
use crate::util::alloc::allocator::{align_allocation, fill_alignment_gap, BumpPointer};
use crate::util::constants::{MIN_FREE_LIST_HOLE_BYTES, PAGES_IN_CHUNK};
use crate::util::conversions::{bytes_to_pages_up, pages_to_bytes, raw_align_up};
use crate::util::heap::PageProvider;
use crate::util::memory;
use crate::util::Address;

/// A hole left behind by the collector's sweep, or by a retired LAB tail.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct FreeListEntry {
    start: Address,
    bytes: usize,
}

struct PagedSpaceSync {
    /// Bump frontier within the current extent.
    cursor: Address,
    /// End of the current extent.
    limit: Address,
    /// Address-ordered holes. First fit over this list is deterministic for
    /// a given heap state.
    free_list: Vec<FreeListEntry>,
    /// Every extent acquired from the provider, for containment checks and
    /// teardown.
    extents: Vec<(Address, usize)>,
}

/// A long-lived paged space (old, code, map, and the shared variants). Pages
/// are acquired from the provider in chunk units on demand; after a
/// collection the swept holes form a free list that is consulted before the
/// bump frontier.
///
/// All mutation is serialized by one lock. The same lock carves LABs for
/// concurrent allocators and admits the collector's entry points, so a
/// collection can never interleave with a frontier update or a LAB refill on
/// this space.
pub struct PagedSpace {
    name: &'static str,
    kind: SpaceKind,
    capacity_pages: usize,
    provider: Arc<dyn PageProvider>,
    sync: Mutex<PagedSpaceSync>,
    committed_pages: AtomicUsize,
}

impl PagedSpace {
    pub fn new(
        name: &'static str,
        kind: SpaceKind,
        capacity_bytes: usize,
        provider: Arc<dyn PageProvider>,
    ) -> Self {
        PagedSpace {
            name,
            kind,
            capacity_pages: bytes_to_pages_up(capacity_bytes),
            provider,
            sync: Mutex::new(PagedSpaceSync {
                cursor: Address::ZERO,
                limit: Address::ZERO,
                free_list: Vec::new(),
                extents: Vec::new(),
            }),
            committed_pages: AtomicUsize::new(0),
        }
    }

    /// Allocate `size` bytes at the given alignment. Tries the free list
    /// first (lowest-address first fit), then the bump frontier, then grows
    /// the space by a chunk. Returns `None` when the space is at capacity or
    /// the provider fails.
    pub fn allocate(&self, size: usize, align: usize) -> Option<Address> {
        debug_assert!(size > 0);
        let mut sync = self.lock();
        self.try_allocate_locked(&mut sync, size, align)
    }

    /// Carve a LAB of `bytes` for a concurrent allocator, advancing the
    /// shared frontier once under the lock. The returned range is zeroed.
    pub fn allocate_lab(&self, bytes: usize) -> Option<BumpPointer> {
        debug_assert!(bytes >= MIN_FREE_LIST_HOLE_BYTES);
        let mut sync = self.lock();
        let start = self.try_allocate_locked(&mut sync, bytes, crate::util::constants::BYTES_IN_WORD)?;
        trace!("{}: carved {} byte lab at {}", self.name, bytes, start);
        Some(BumpPointer::new(start, start + bytes))
    }

    /// Return a range to the space. Used by the collector when sweeping
    /// creates holes, by `undo_allocation`, and by concurrent allocators
    /// retiring LAB tails. Ranges below the tracking threshold are left as
    /// filler.
    pub fn free(&self, start: Address, bytes: usize) {
        if bytes < MIN_FREE_LIST_HOLE_BYTES {
            return;
        }
        let mut sync = self.lock();
        Self::insert_hole(&mut sync.free_list, start, bytes);
    }

    /// Roll back an allocation. If it is still at the frontier the frontier
    /// shrinks; otherwise the range becomes a hole.
    pub fn undo_allocation(&self, start: Address, bytes: usize) {
        let mut sync = self.lock();
        if sync.cursor == start + bytes {
            sync.cursor = start;
        } else if bytes >= MIN_FREE_LIST_HOLE_BYTES {
            Self::insert_hole(&mut sync.free_list, start, bytes);
        }
    }

    /// The number of holes currently tracked.
    pub fn free_list_len(&self) -> usize {
        self.lock().free_list.len()
    }

    fn lock(&self) -> MutexGuard<'_, PagedSpaceSync> {
        // A poisoned lock means an allocating or sweeping thread panicked
        // mid-update; the space state cannot be trusted past that point.
        self.sync.lock().expect("paged space lock poisoned")
    }

    fn try_allocate_locked(
        &self,
        sync: &mut PagedSpaceSync,
        size: usize,
        align: usize,
    ) -> Option<Address> {
        if let Some(start) = Self::allocate_from_free_list(&mut sync.free_list, size, align) {
            // Free-list memory has held objects before; hand it back zeroed.
            memory::zero(start, size);
            trace!("{}: free-list fit, {} bytes at {}", self.name, size, start);
            return Some(start);
        }
        if let Some(start) = Self::allocate_from_frontier(sync, size, align) {
            return Some(start);
        }
        self.grow(sync, size)?;
        Self::allocate_from_frontier(sync, size, align)
    }

    fn allocate_from_frontier(
        sync: &mut PagedSpaceSync,
        size: usize,
        align: usize,
    ) -> Option<Address> {
        let start = align_allocation(sync.cursor, align);
        let new_cursor = start + size;
        if sync.limit.is_zero() || new_cursor > sync.limit {
            return None;
        }
        fill_alignment_gap(sync.cursor, start);
        sync.cursor = new_cursor;
        Some(start)
    }

    fn allocate_from_free_list(
        free_list: &mut Vec<FreeListEntry>,
        size: usize,
        align: usize,
    ) -> Option<Address> {
        let (index, start) = free_list.iter().enumerate().find_map(|(index, hole)| {
            let start = align_allocation(hole.start, align);
            let end = start + size;
            if end <= hole.start + hole.bytes {
                Some((index, start))
            } else {
                None
            }
        })?;
        let hole = free_list.remove(index);
        let leading = start - hole.start;
        let trailing = (hole.start + hole.bytes) - (start + size);
        // The leading gap (at most align - 1 bytes) is filler.
        debug_assert!(leading < align);
        if trailing >= MIN_FREE_LIST_HOLE_BYTES {
            Self::insert_hole(free_list, start + size, trailing);
        }
        Some(start)
    }

    /// Acquire a new chunk-granular extent. The tail of the old extent is
    /// kept as a hole so it is not lost.
    fn grow(&self, sync: &mut PagedSpaceSync, size: usize) -> Option<()> {
        let pages = bytes_to_pages_up(raw_align_up(size, pages_to_bytes(PAGES_IN_CHUNK)))
            .max(PAGES_IN_CHUNK);
        let committed = self.committed_pages.load(Ordering::Relaxed);
        if committed + pages > self.capacity_pages {
            trace!(
                "{}: at capacity ({} + {} > {} pages)",
                self.name,
                committed,
                pages,
                self.capacity_pages
            );
            return None;
        }
        let start = self.provider.acquire_pages(pages)?;
        self.committed_pages.fetch_add(pages, Ordering::Relaxed);
        if !sync.cursor.is_zero() && sync.limit > sync.cursor {
            let tail = sync.limit - sync.cursor;
            if tail >= MIN_FREE_LIST_HOLE_BYTES {
                let cursor = sync.cursor;
                Self::insert_hole(&mut sync.free_list, cursor, tail);
            }
        }
        sync.cursor = start;
        sync.limit = start + pages_to_bytes(pages);
        sync.extents.push((start, pages));
        trace!("{}: grew by {} pages at {}", self.name, pages, start);
        Some(())
    }

    fn insert_hole(free_list: &mut Vec<FreeListEntry>, start: Address, bytes: usize) {
        let index = free_list
            .iter()
            .position(|hole| hole.start > start)
            .unwrap_or(free_list.len());
        debug_assert!(
            index == 0 || free_list[index - 1].start + free_list[index - 1].bytes <= start,
            "hole overlaps predecessor"
        );
        // Coalesce with neighbors where the ranges touch.
        let merges_prev =
            index > 0 && free_list[index - 1].start + free_list[index - 1].bytes == start;
        let merges_next =
            index < free_list.len() && start + bytes == free_list[index].start;
        match (merges_prev, merges_next) {
            (true, true) => {
                free_list[index - 1].bytes += bytes + free_list[index].bytes;
                free_list.remove(index);
            }
            (true, false) => free_list[index - 1].bytes += bytes,
            (false, true) => {
                free_list[index].start = start;
                free_list[index].bytes += bytes;
            }
            (false, false) => free_list.insert(index, FreeListEntry { start, bytes }),
        }
    }
}

impl Space for PagedSpace {
    fn kind(&self) -> SpaceKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn contains(&self, addr: Address) -> bool {
        self.lock()
            .extents
            .iter()
            .any(|&(start, pages)| addr >= start && addr < start + pages_to_bytes(pages))
    }

    fn committed_bytes(&self) -> usize {
        pages_to_bytes(self.committed_pages.load(Ordering::Relaxed))
    }

    fn capacity_bytes(&self) -> usize {
        pages_to_bytes(self.capacity_pages)
    }
}

impl Drop for PagedSpace {
    fn drop(&mut self) {
        let sync = self.sync.get_mut().expect("paged space lock poisoned");
        for &(start, pages) in &sync.extents {
            self.provider.release_pages(start, pages);
        }
    }
}
