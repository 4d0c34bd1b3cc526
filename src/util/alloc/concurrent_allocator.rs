use log::trace;

use crate::allocator::{AllocationAlignment, AllocationOrigin, AllocationResult, AllocationType};
use crate::heap::Heap;
use crate::policy::pagedspace::PagedSpace;
use crate::policy::space::{Space, SpaceKind};
use crate::util::alloc::allocator::BumpPointer;
use crate::util::Address;

/// A background-thread allocator for one of the shared spaces. Owns a
/// thread-local allocation buffer (LAB) carved from the shared frontier, so
/// the common case touches no shared state at all. Exhaustion never runs a
/// collection on this thread; it raises a request the main thread polls.
pub struct ConcurrentAllocator<'h> {
    heap: &'h Heap,
    space: &'h PagedSpace,
    ty: AllocationType,
    kind: SpaceKind,
    lab: BumpPointer,
    lab_size: usize,
}

impl<'h> ConcurrentAllocator<'h> {
    /// Create an allocator bound to one shared space. `ty` must be
    /// `SharedOld` or `SharedMap`.
    pub fn new(heap: &'h Heap, ty: AllocationType) -> Self {
        let (space, kind) = match ty {
            AllocationType::SharedOld => (heap.shared_old_space(), SpaceKind::SharedOld),
            AllocationType::SharedMap => (heap.shared_map_space(), SpaceKind::SharedMap),
            _ => panic!("concurrent allocator bound to non-shared type {:?}", ty),
        };
        ConcurrentAllocator {
            heap,
            space,
            ty,
            kind,
            lab: BumpPointer::EMPTY,
            lab_size: heap.options().lab_size,
        }
    }

    /// Allocate from the LAB, refilling it from the shared space when it runs
    /// dry. On refill failure the collection request flag is raised and the
    /// caller sees `Failure`; this thread never blocks on a collection.
    pub fn allocate(
        &mut self,
        size: usize,
        origin: AllocationOrigin,
        alignment: AllocationAlignment,
    ) -> AllocationResult {
        debug_assert!(size > 0, "zero-sized allocation request");
        debug_assert!(
            size <= self.heap.options().max_regular_object_size,
            "large objects are not allocated concurrently"
        );
        match self.try_allocate(size, alignment.bytes()) {
            Some(start) => {
                self.heap.notify_allocation(self.ty, origin);
                AllocationResult::success(start, self.kind)
            }
            None => {
                trace!(
                    "{}: lab refill failed for {} bytes, requesting collection",
                    self.space.name(),
                    size
                );
                self.heap.request_collection();
                AllocationResult::Failure
            }
        }
    }

    /// Retire the current LAB, returning its unused tail to the space. Called
    /// before a collection inspects the shared space, and on thread teardown.
    pub fn retire_lab(&mut self) {
        let remaining = self.lab.remaining();
        if remaining > 0 {
            self.space.free(self.lab.cursor, remaining);
        }
        self.lab = BumpPointer::EMPTY;
    }

    pub(crate) fn try_allocate(&mut self, size: usize, align: usize) -> Option<Address> {
        if let Some(start) = self.lab.allocate(size, align) {
            return Some(start);
        }
        self.refill_and_allocate(size, align)
    }

    /// Slow path: retire the dry LAB and carve a fresh one under the space
    /// lock. The new LAB is sized to fit the pending request even when it
    /// exceeds the configured LAB size.
    fn refill_and_allocate(&mut self, size: usize, align: usize) -> Option<Address> {
        self.retire_lab();
        let bytes = self
            .lab_size
            .max(size + align)
            .max(crate::util::constants::MIN_FREE_LIST_HOLE_BYTES);
        self.lab = self.space.allocate_lab(bytes)?;
        self.lab.allocate(size, align)
    }
}

impl Drop for ConcurrentAllocator<'_> {
    fn drop(&mut self) {
        self.retire_lab();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::HeapBuilder;
    use crate::policy::space::Space;
    use crate::util::constants::BYTES_IN_CHUNK;
    use crate::util::heap::MmapPageProvider;
    use crate::util::options::HeapOptions;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;

    fn build_heap(options: HeapOptions) -> Heap {
        HeapBuilder::new()
            .options(options)
            .build(Arc::new(MmapPageProvider::new()))
    }

    #[test]
    fn lab_serves_repeated_small_allocations() {
        let heap = build_heap(HeapOptions::default());
        let mut allocator = ConcurrentAllocator::new(&heap, AllocationType::SharedOld);
        let first = allocator.allocate(64, AllocationOrigin::Runtime, AllocationAlignment::TaggedAligned);
        assert!(first.is_success());
        let committed = heap.shared_old_space().committed_bytes();
        assert_eq!(committed, BYTES_IN_CHUNK);
        // Everything below fits in the already carved LAB.
        for _ in 0..16 {
            let result =
                allocator.allocate(64, AllocationOrigin::Runtime, AllocationAlignment::TaggedAligned);
            assert!(result.is_success());
        }
        assert_eq!(heap.shared_old_space().committed_bytes(), committed);
    }

    #[test]
    fn retired_lab_tail_returns_to_the_space() {
        let heap = build_heap(HeapOptions::default());
        let mut allocator = ConcurrentAllocator::new(&heap, AllocationType::SharedOld);
        let result = allocator.allocate(64, AllocationOrigin::Runtime, AllocationAlignment::TaggedAligned);
        assert!(result.is_success());
        assert_eq!(heap.shared_old_space().free_list_len(), 0);
        allocator.retire_lab();
        assert_eq!(heap.shared_old_space().free_list_len(), 1);
        // The retired range is immediately reusable.
        assert!(heap.shared_old_space().allocate(64, 8).is_some());
    }

    #[test]
    fn exhaustion_requests_a_collection_instead_of_running_one() {
        // A shared space that can hold exactly one LAB and cannot grow.
        let heap = build_heap(HeapOptions {
            shared_space_capacity: 64 * 1024,
            lab_size: 64 * 1024,
            ..Default::default()
        });
        let mut allocator = ConcurrentAllocator::new(&heap, AllocationType::SharedMap);
        assert!(!heap.take_collection_request());
        let result = allocator.allocate(64, AllocationOrigin::Gc, AllocationAlignment::TaggedAligned);
        assert!(result.is_failure());
        assert!(heap.take_collection_request());
    }

    #[test]
    fn oversized_request_gets_an_oversized_lab() {
        let heap = build_heap(HeapOptions {
            lab_size: 1024,
            ..Default::default()
        });
        let mut allocator = ConcurrentAllocator::new(&heap, AllocationType::SharedOld);
        let size = 16 * 1024;
        debug_assert!(size <= heap.options().max_regular_object_size);
        let result =
            allocator.allocate(size, AllocationOrigin::Runtime, AllocationAlignment::DoubleAligned);
        let start = result.unwrap_address();
        assert!(start.is_aligned_to(16));
        assert!(heap.shared_old_space().contains(start));
    }

    #[test]
    fn threads_receive_disjoint_extents() {
        let heap = build_heap(HeapOptions::default());
        let all: Vec<(Address, usize)> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4u64)
                .map(|seed| {
                    let heap = &heap;
                    scope.spawn(move || {
                        let mut rng = ChaCha8Rng::seed_from_u64(seed);
                        let mut allocator = ConcurrentAllocator::new(heap, AllocationType::SharedOld);
                        let mut granted = Vec::with_capacity(256);
                        for _ in 0..256 {
                            let size = rng.random_range(8..512usize);
                            let result = allocator.allocate(
                                size,
                                AllocationOrigin::Runtime,
                                AllocationAlignment::TaggedAligned,
                            );
                            let start = result.unwrap_address();
                            assert!(start.is_aligned_to(8));
                            granted.push((start, size));
                        }
                        granted
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });
        let mut sorted = all;
        sorted.sort_by_key(|&(start, _)| start);
        for window in sorted.windows(2) {
            let (a_start, a_size) = window[0];
            let (b_start, _) = window[1];
            assert!(a_start + a_size <= b_start, "extents overlap at {}", b_start);
        }
        assert_eq!(
            heap.allocation_count_by_type(AllocationType::SharedOld),
            4 * 256
        );
    }
}
