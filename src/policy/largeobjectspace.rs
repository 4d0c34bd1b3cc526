use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::trace;

use crate::policy::space::{Space, SpaceKind};
use crate::util::conversions::{bytes_to_pages_up, pages_to_bytes};
use crate::util::heap::PageProvider;
use crate::util::Address;

/// A chunk backing exactly one large object.
#[derive(Copy, Clone, Debug)]
pub struct LargeChunk {
    pub start: Address,
    pub pages: usize,
}

/// A large-object space. Every object gets its own page-rounded mapping from
/// the provider, recorded in a tracking list; nothing here is ever served
/// from a bump frontier. One such space exists per generation that admits
/// large objects (young, old, code).
pub struct LargeObjectSpace {
    name: &'static str,
    kind: SpaceKind,
    capacity_pages: usize,
    provider: Arc<dyn PageProvider>,
    chunks: Mutex<Vec<LargeChunk>>,
    committed_pages: AtomicUsize,
}

impl LargeObjectSpace {
    pub fn new(
        name: &'static str,
        kind: SpaceKind,
        capacity_bytes: usize,
        provider: Arc<dyn PageProvider>,
    ) -> Self {
        debug_assert!(kind.is_large());
        LargeObjectSpace {
            name,
            kind,
            capacity_pages: bytes_to_pages_up(capacity_bytes),
            provider,
            chunks: Mutex::new(Vec::new()),
            committed_pages: AtomicUsize::new(0),
        }
    }

    /// Map a dedicated chunk for a `size`-byte object. The chunk start is
    /// page aligned, which satisfies every object alignment. Fails when the
    /// space is at capacity or the provider cannot supply the address range.
    pub fn allocate(&self, size: usize) -> Option<Address> {
        debug_assert!(size > 0);
        let pages = bytes_to_pages_up(size);
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
        self.lock().push(LargeChunk { start, pages });
        trace!("{}: mapped {} pages at {}", self.name, pages, start);
        Some(start)
    }

    /// Release the chunk starting at `start`. Collector entry point; returns
    /// false if no such chunk is tracked.
    pub fn release_chunk(&self, start: Address) -> bool {
        let mut chunks = self.lock();
        let Some(index) = chunks.iter().position(|chunk| chunk.start == start) else {
            return false;
        };
        let chunk = chunks.remove(index);
        drop(chunks);
        self.provider.release_pages(chunk.start, chunk.pages);
        self.committed_pages.fetch_sub(chunk.pages, Ordering::Relaxed);
        true
    }

    /// Number of live chunks.
    pub fn chunk_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LargeChunk>> {
        self.chunks.lock().expect("large object space lock poisoned")
    }
}

impl Space for LargeObjectSpace {
    fn kind(&self) -> SpaceKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn contains(&self, addr: Address) -> bool {
        self.lock()
            .iter()
            .any(|chunk| addr >= chunk.start && addr < chunk.start + pages_to_bytes(chunk.pages))
    }

    fn committed_bytes(&self) -> usize {
        pages_to_bytes(self.committed_pages.load(Ordering::Relaxed))
    }

    fn capacity_bytes(&self) -> usize {
        pages_to_bytes(self.capacity_pages)
    }
}

impl Drop for LargeObjectSpace {
    fn drop(&mut self) {
        let chunks = self.chunks.get_mut().expect("large object space lock poisoned");
        for chunk in chunks.drain(..) {
            self.provider.release_pages(chunk.start, chunk.pages);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::BYTES_IN_PAGE;
    use crate::util::conversions::is_page_aligned;
    use crate::util::heap::MmapPageProvider;

    fn space() -> LargeObjectSpace {
        LargeObjectSpace::new(
            "old_lo_space",
            SpaceKind::OldLarge,
            64 * BYTES_IN_PAGE,
            Arc::new(MmapPageProvider::new()),
        )
    }

    #[test]
    fn chunks_are_page_rounded() {
        let space = space();
        let addr = space.allocate(BYTES_IN_PAGE + 1).unwrap();
        assert!(is_page_aligned(addr));
        assert_eq!(space.committed_bytes(), 2 * BYTES_IN_PAGE);
        assert_eq!(space.chunk_count(), 1);
    }

    #[test]
    fn capacity_is_enforced() {
        let space = LargeObjectSpace::new(
            "old_lo_space",
            SpaceKind::OldLarge,
            2 * BYTES_IN_PAGE,
            Arc::new(MmapPageProvider::new()),
        );
        let first = space.allocate(2 * BYTES_IN_PAGE).unwrap();
        assert!(space.allocate(1).is_none());
        assert!(space.release_chunk(first));
        assert!(space.allocate(1).is_some());
    }

    #[test]
    fn release_untracked_chunk_is_rejected() {
        let space = space();
        assert!(!space.release_chunk(unsafe { Address::from_usize(0x1000) }));
    }

    #[test]
    fn contains_covers_whole_chunk() {
        let space = space();
        let addr = space.allocate(BYTES_IN_PAGE).unwrap();
        assert!(space.contains(addr));
        assert!(space.contains(addr + (BYTES_IN_PAGE - 1)));
        assert!(!space.contains(addr + BYTES_IN_PAGE));
    }
}
