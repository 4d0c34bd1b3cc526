//! The heap allocator facade: every allocation request enters here, gets
//! dispatched to the space selected by its [`AllocationType`], and on
//! failure escalates through an explicit, bounded retry ladder that invokes
//! the external collector.

use log::trace;

use crate::collection::{Collection, MemoryPressure};
use crate::heap::Heap;
use crate::policy::space::SpaceKind;
use crate::util::alloc::allocator::AllocationError;
use crate::util::alloc::ConcurrentAllocator;
use crate::util::constants::{DOUBLE_ALIGNMENT, TAGGED_ALIGNMENT};
use crate::util::Address;

/// Which space a request targets. Every request carries exactly one type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, enum_map::Enum, strum_macros::EnumIter)]
pub enum AllocationType {
    Young,
    Old,
    Code,
    Map,
    ReadOnly,
    SharedOld,
    SharedMap,
}

/// Who asked for the allocation. Statistics tag only: it never affects
/// dispatch or retry behavior.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, enum_map::Enum)]
pub enum AllocationOrigin {
    Runtime,
    Gc,
    Generated,
}

/// Minimum address alignment the returned memory must satisfy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocationAlignment {
    TaggedAligned,
    DoubleAligned,
}

impl AllocationAlignment {
    pub fn bytes(self) -> usize {
        match self {
            AllocationAlignment::TaggedAligned => TAGGED_ALIGNMENT,
            AllocationAlignment::DoubleAligned => DOUBLE_ALIGNMENT,
        }
    }
}

/// Outcome of an allocation request. A `Failure` never carries an address;
/// callers must check before constructing an object at the result.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocationResult {
    Success { start: Address, space: SpaceKind },
    Failure,
}

impl AllocationResult {
    pub fn success(start: Address, space: SpaceKind) -> Self {
        debug_assert!(!start.is_zero());
        AllocationResult::Success { start, space }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AllocationResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn address(&self) -> Option<Address> {
        match self {
            AllocationResult::Success { start, .. } => Some(*start),
            AllocationResult::Failure => None,
        }
    }

    pub fn space(&self) -> Option<SpaceKind> {
        match self {
            AllocationResult::Success { space, .. } => Some(*space),
            AllocationResult::Failure => None,
        }
    }

    /// The address of a successful allocation. Panics on `Failure`.
    pub fn unwrap_address(&self) -> Address {
        match self {
            AllocationResult::Success { start, .. } => *start,
            AllocationResult::Failure => panic!("unwrap_address on a failed allocation"),
        }
    }
}

/// How the slow path escalates when the fast path cannot satisfy a request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocationRetryMode {
    /// One minor collection, one retry, then report `Failure` to the caller.
    /// For call sites with a real fallback.
    LightRetry,
    /// Minor collection, retry, major collection under critical pressure,
    /// retry, then fatal out-of-memory. The default for ordinary object
    /// creation.
    RetryOrFail,
}

/// The main-thread allocator. Holds non-owning references to the heap's
/// spaces (established once at construction, the setup step of the heap
/// lifecycle) and the two concurrent allocators that front the shared
/// spaces.
pub struct HeapAllocator<'h, C: Collection> {
    heap: &'h Heap,
    collector: C,
    shared_old_allocator: ConcurrentAllocator<'h>,
    shared_map_allocator: ConcurrentAllocator<'h>,
    /// Diagnostic countdown. When it hits zero the fast path reports
    /// failure, deterministically exercising the slow path under test
    /// harnesses.
    allocation_timeout: Option<u32>,
}

impl<'h, C: Collection> HeapAllocator<'h, C> {
    pub fn new(heap: &'h Heap, collector: C) -> Self {
        HeapAllocator {
            heap,
            collector,
            shared_old_allocator: ConcurrentAllocator::new(heap, AllocationType::SharedOld),
            shared_map_allocator: ConcurrentAllocator::new(heap, AllocationType::SharedMap),
            allocation_timeout: heap.options().allocation_timeout,
        }
    }

    /// A single allocation attempt: dispatch to the target space and run its
    /// fast path. Never invokes the collector. Requests above the
    /// large-object threshold are rerouted to the matching large-object
    /// space regardless of the requested type.
    pub fn allocate(
        &mut self,
        size: usize,
        ty: AllocationType,
        origin: AllocationOrigin,
        alignment: AllocationAlignment,
    ) -> AllocationResult {
        debug_assert!(size > 0, "zero-sized allocation request");
        if self.allocation_timeout_expired() {
            trace!("allocation timeout expired, forcing fast-path failure");
            return AllocationResult::Failure;
        }
        if size > self.heap.options().max_regular_object_size {
            return self.allocate_large(size, ty, origin);
        }
        let align = alignment.bytes();
        let (addr, space) = match ty {
            AllocationType::Young => (self.heap.new_space().allocate(size, align), SpaceKind::Young),
            AllocationType::Old => (self.heap.old_space().allocate(size, align), SpaceKind::Old),
            AllocationType::Code => (self.heap.code_space().allocate(size, align), SpaceKind::Code),
            AllocationType::Map => (self.heap.map_space().allocate(size, align), SpaceKind::Map),
            AllocationType::ReadOnly => (
                self.heap.read_only_space().allocate(size, align),
                SpaceKind::ReadOnly,
            ),
            AllocationType::SharedOld => (
                self.shared_old_allocator.try_allocate(size, align),
                SpaceKind::SharedOld,
            ),
            AllocationType::SharedMap => (
                self.shared_map_allocator.try_allocate(size, align),
                SpaceKind::SharedMap,
            ),
        };
        self.finish(addr, space, ty, origin)
    }

    /// Type-narrowed convenience entry for plain data objects. Supports only
    /// `Young` and `Old`; behaviorally identical to [`allocate`].
    ///
    /// [`allocate`]: HeapAllocator::allocate
    pub fn allocate_data(
        &mut self,
        size: usize,
        ty: AllocationType,
        origin: AllocationOrigin,
        alignment: AllocationAlignment,
    ) -> AllocationResult {
        debug_assert!(
            matches!(ty, AllocationType::Young | AllocationType::Old),
            "allocate_data supports Young and Old only"
        );
        self.allocate(size, ty, origin, alignment)
    }

    /// Allocate with the given retry policy. The ladder is an explicit
    /// bounded loop: at most one minor and (under `RetryOrFail`) one major
    /// collection attempt, never more.
    ///
    /// Read-only requests never trigger a collection; their failures come
    /// back as plain `Failure` under either mode.
    pub fn allocate_with_retry(
        &mut self,
        mode: AllocationRetryMode,
        size: usize,
        ty: AllocationType,
        origin: AllocationOrigin,
        alignment: AllocationAlignment,
    ) -> AllocationResult {
        let result = self.allocate(size, ty, origin, alignment);
        if result.is_success() || ty == AllocationType::ReadOnly {
            return result;
        }
        trace!(
            "fast path failed for {} bytes ({:?}), entering {:?} slow path",
            size,
            ty,
            mode
        );
        self.collector.run_minor_collection(self.heap);
        self.update_allocation_timeout();
        let result = self.allocate(size, ty, origin, alignment);
        if result.is_success() || mode == AllocationRetryMode::LightRetry {
            return result;
        }
        self.collector
            .run_major_collection(self.heap, MemoryPressure::Critical);
        self.update_allocation_timeout();
        let result = self.allocate(size, ty, origin, alignment);
        if result.is_success() {
            return result;
        }
        let error = if size > self.heap.options().max_regular_object_size {
            AllocationError::AddressSpaceOutOfMemory
        } else {
            AllocationError::HeapOutOfMemory
        };
        self.collector.out_of_memory(error);
        panic!(
            "heap exhausted: {:?} for {} bytes ({:?}) after one minor and one major collection",
            error, size, ty
        );
    }

    /// May the read-only space still be allocated into?
    pub fn can_allocate_in_read_only_space(&self) -> bool {
        !self.heap.read_only_space().is_sealed()
    }

    /// Arm the diagnostic countdown: after `timeout` further attempts the
    /// fast path reports failure. Reset explicitly between test scenarios.
    pub fn set_allocation_timeout(&mut self, timeout: u32) {
        self.allocation_timeout = Some(timeout);
    }

    pub fn clear_allocation_timeout(&mut self) {
        self.allocation_timeout = None;
    }

    /// Clear a fired countdown. The slow path calls this after the
    /// collection the forced failure was meant to provoke, so the mandated
    /// retry runs unimpeded.
    pub fn update_allocation_timeout(&mut self) {
        if self.allocation_timeout == Some(0) {
            self.allocation_timeout = None;
        }
    }

    fn allocation_timeout_expired(&mut self) -> bool {
        match self.allocation_timeout.as_mut() {
            None => false,
            Some(0) => true,
            Some(remaining) => {
                *remaining -= 1;
                *remaining == 0
            }
        }
    }

    /// Large requests bypass every bump frontier: each maps a dedicated
    /// page-rounded chunk in the large-object space of the matching
    /// generation. Only Young, Old and Code admit large objects.
    fn allocate_large(
        &mut self,
        size: usize,
        ty: AllocationType,
        origin: AllocationOrigin,
    ) -> AllocationResult {
        let (addr, space) = match ty {
            AllocationType::Young => (self.heap.new_lo_space().allocate(size), SpaceKind::YoungLarge),
            AllocationType::Old => (self.heap.old_lo_space().allocate(size), SpaceKind::OldLarge),
            AllocationType::Code => (self.heap.code_lo_space().allocate(size), SpaceKind::CodeLarge),
            _ => {
                debug_assert!(false, "large allocation request for {:?}", ty);
                (None, SpaceKind::OldLarge)
            }
        };
        self.finish(addr, space, ty, origin)
    }

    fn finish(
        &mut self,
        addr: Option<Address>,
        space: SpaceKind,
        ty: AllocationType,
        origin: AllocationOrigin,
    ) -> AllocationResult {
        match addr {
            Some(start) => {
                self.heap.notify_allocation(ty, origin);
                AllocationResult::success(start, space)
            }
            None => AllocationResult::Failure,
        }
    }
}
