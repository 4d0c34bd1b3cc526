use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use enum_map::EnumMap;
use log::debug;

use crate::allocator::{AllocationOrigin, AllocationType};
use crate::policy::largeobjectspace::LargeObjectSpace;
use crate::policy::newspace::NewSpace;
use crate::policy::pagedspace::PagedSpace;
use crate::policy::readonlyspace::ReadOnlySpace;
use crate::policy::space::{Space, SpaceKind};
use crate::util::heap::PageProvider;
use crate::util::options::HeapOptions;

/// The heap: owner of every space. Allocators borrow it and never outlive
/// it. Apart from the read-only seal and the collection-request flag, the
/// heap itself is passive; all allocation behavior lives in
/// [`HeapAllocator`](crate::allocator::HeapAllocator) and
/// [`ConcurrentAllocator`](crate::util::alloc::ConcurrentAllocator).
pub struct Heap {
    new_space: NewSpace,
    old_space: PagedSpace,
    code_space: PagedSpace,
    map_space: PagedSpace,
    read_only_space: ReadOnlySpace,
    new_lo_space: LargeObjectSpace,
    old_lo_space: LargeObjectSpace,
    code_lo_space: LargeObjectSpace,
    shared_old_space: PagedSpace,
    shared_map_space: PagedSpace,
    options: HeapOptions,
    /// Set by background allocators that exhausted their shared space. The
    /// main thread polls and clears it when scheduling the next collection
    /// cycle.
    collection_requested: AtomicBool,
    allocations_by_origin: EnumMap<AllocationOrigin, AtomicUsize>,
    allocations_by_type: EnumMap<AllocationType, AtomicUsize>,
}

impl Heap {
    pub fn new_space(&self) -> &NewSpace {
        &self.new_space
    }

    pub fn old_space(&self) -> &PagedSpace {
        &self.old_space
    }

    pub fn code_space(&self) -> &PagedSpace {
        &self.code_space
    }

    pub fn map_space(&self) -> &PagedSpace {
        &self.map_space
    }

    pub fn read_only_space(&self) -> &ReadOnlySpace {
        &self.read_only_space
    }

    pub fn new_lo_space(&self) -> &LargeObjectSpace {
        &self.new_lo_space
    }

    pub fn old_lo_space(&self) -> &LargeObjectSpace {
        &self.old_lo_space
    }

    pub fn code_lo_space(&self) -> &LargeObjectSpace {
        &self.code_lo_space
    }

    pub fn shared_old_space(&self) -> &PagedSpace {
        &self.shared_old_space
    }

    pub fn shared_map_space(&self) -> &PagedSpace {
        &self.shared_map_space
    }

    pub fn options(&self) -> &HeapOptions {
        &self.options
    }

    /// Every space, for inspection and accounting.
    pub fn spaces(&self) -> [&dyn Space; 10] {
        [
            &self.new_space,
            &self.old_space,
            &self.code_space,
            &self.map_space,
            &self.read_only_space,
            &self.new_lo_space,
            &self.old_lo_space,
            &self.code_lo_space,
            &self.shared_old_space,
            &self.shared_map_space,
        ]
    }

    pub fn space(&self, kind: SpaceKind) -> &dyn Space {
        match kind {
            SpaceKind::Young => &self.new_space,
            SpaceKind::Old => &self.old_space,
            SpaceKind::Code => &self.code_space,
            SpaceKind::Map => &self.map_space,
            SpaceKind::ReadOnly => &self.read_only_space,
            SpaceKind::SharedOld => &self.shared_old_space,
            SpaceKind::SharedMap => &self.shared_map_space,
            SpaceKind::YoungLarge => &self.new_lo_space,
            SpaceKind::OldLarge => &self.old_lo_space,
            SpaceKind::CodeLarge => &self.code_lo_space,
        }
    }

    /// Bytes currently backed by provider pages, across all spaces.
    pub fn committed_bytes(&self) -> usize {
        self.spaces().iter().map(|s| s.committed_bytes()).sum()
    }

    /// Seal the read-only space. One-way; performed once startup
    /// population is complete.
    pub fn seal_read_only_space(&self) {
        self.read_only_space.seal();
    }

    /// Escalation hook for background allocation failures: records that the
    /// main thread should schedule a collection cycle. Never blocks, never
    /// collects inline.
    pub fn request_collection(&self) {
        self.collection_requested.store(true, Ordering::Release);
    }

    /// Main-thread poll: consume a pending collection request, if any.
    pub fn take_collection_request(&self) -> bool {
        self.collection_requested.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn notify_allocation(&self, ty: AllocationType, origin: AllocationOrigin) {
        self.allocations_by_origin[origin].fetch_add(1, Ordering::Relaxed);
        self.allocations_by_type[ty].fetch_add(1, Ordering::Relaxed);
    }

    /// Successful allocations tagged with the given origin.
    pub fn allocation_count_by_origin(&self, origin: AllocationOrigin) -> usize {
        self.allocations_by_origin[origin].load(Ordering::Relaxed)
    }

    /// Successful allocations of the given type.
    pub fn allocation_count_by_type(&self, ty: AllocationType) -> usize {
        self.allocations_by_type[ty].load(Ordering::Relaxed)
    }
}

/// Builder for a [`Heap`]. Collects options, validates them, then reserves
/// the eager extents (young and read-only) and sets up the paged and
/// large-object spaces.
#[derive(Default)]
pub struct HeapBuilder {
    pub options: HeapOptions,
}

impl HeapBuilder {
    pub fn new() -> Self {
        HeapBuilder {
            options: HeapOptions::default(),
        }
    }

    pub fn options(mut self, options: HeapOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the heap. Panics on invalid options or if the provider cannot
    /// reserve the eager extents; a heap that cannot complete setup has no
    /// usable degraded mode.
    pub fn build(self, provider: Arc<dyn PageProvider>) -> Heap {
        match crate::util::logger::try_init() {
            Ok(_) => debug!("heap initialized the logger"),
            Err(_) => debug!("logger already initialized by the embedder"),
        }
        if let Err(msg) = self.options.validate() {
            panic!("invalid heap options: {}", msg);
        }
        let options = self.options;
        let heap = Heap {
            new_space: NewSpace::new("new_space", options.young_space_pages(), provider.clone()),
            old_space: PagedSpace::new(
                "old_space",
                SpaceKind::Old,
                options.old_space_capacity,
                provider.clone(),
            ),
            code_space: PagedSpace::new(
                "code_space",
                SpaceKind::Code,
                options.code_space_capacity,
                provider.clone(),
            ),
            map_space: PagedSpace::new(
                "map_space",
                SpaceKind::Map,
                options.map_space_capacity,
                provider.clone(),
            ),
            read_only_space: ReadOnlySpace::new(
                "read_only_space",
                options.read_only_space_pages(),
                provider.clone(),
            ),
            new_lo_space: LargeObjectSpace::new(
                "new_lo_space",
                SpaceKind::YoungLarge,
                options.large_object_space_capacity,
                provider.clone(),
            ),
            old_lo_space: LargeObjectSpace::new(
                "old_lo_space",
                SpaceKind::OldLarge,
                options.large_object_space_capacity,
                provider.clone(),
            ),
            code_lo_space: LargeObjectSpace::new(
                "code_lo_space",
                SpaceKind::CodeLarge,
                options.large_object_space_capacity,
                provider.clone(),
            ),
            shared_old_space: PagedSpace::new(
                "shared_old_space",
                SpaceKind::SharedOld,
                options.shared_space_capacity,
                provider.clone(),
            ),
            shared_map_space: PagedSpace::new(
                "shared_map_space",
                SpaceKind::SharedMap,
                options.shared_space_capacity,
                provider,
            ),
            options,
            collection_requested: AtomicBool::new(false),
            allocations_by_origin: EnumMap::default(),
            allocations_by_type: EnumMap::default(),
        };
        debug!(
            "heap set up with {} bytes committed eagerly",
            heap.committed_bytes()
        );
        heap
    }
}
