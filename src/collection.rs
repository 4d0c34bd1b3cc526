use crate::heap::Heap;
use crate::util::alloc::allocator::AllocationError;

/// Pressure hint passed with a major collection request from the retry
/// ladder.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemoryPressure {
    Moderate,
    Critical,
}

/// The collector collaborator. The allocator only sees completion signals:
/// neither entry point guarantees that any memory was actually freed.
///
/// Collections run on the main thread only. Background allocators escalate
/// exhaustion through [`Heap::request_collection`] instead of calling these
/// methods.
pub trait Collection {
    /// Run a collection scoped to the young generation.
    fn run_minor_collection(&self, heap: &Heap);

    /// Run a full-heap collection.
    fn run_major_collection(&self, heap: &Heap, pressure: MemoryPressure);

    /// Called when the retry-or-fail ladder is exhausted, immediately before
    /// the allocator raises the fatal out-of-memory signal. Implementations
    /// may report diagnostics; they cannot recover the allocation.
    fn out_of_memory(&self, error: AllocationError) {
        let _ = error;
    }
}

impl<C: Collection + ?Sized> Collection for &C {
    fn run_minor_collection(&self, heap: &Heap) {
        (**self).run_minor_collection(heap)
    }

    fn run_major_collection(&self, heap: &Heap, pressure: MemoryPressure) {
        (**self).run_major_collection(heap, pressure)
    }

    fn out_of_memory(&self, error: AllocationError) {
        (**self).out_of_memory(error)
    }
}
