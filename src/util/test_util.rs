//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::collection::{Collection, MemoryPressure};
use crate::heap::Heap;
use crate::util::alloc::allocator::AllocationError;

/// What a mock collection does to the heap when invoked.
#[derive(Copy, Clone, Debug)]
pub enum CollectionBehavior {
    /// Record the call and free nothing. Models a collection that cannot
    /// help the failing allocation.
    Nop,
    /// Reset the young generation, so young allocations succeed afterwards.
    ResetYoung,
}

/// A recording collector. Counts every entry point and optionally mutates
/// the heap per its [`CollectionBehavior`].
pub struct MockCollection {
    behavior: CollectionBehavior,
    minor_calls: AtomicUsize,
    major_calls: AtomicUsize,
    oom_calls: AtomicUsize,
    last_oom_error: Mutex<Option<AllocationError>>,
}

impl MockCollection {
    pub fn new(behavior: CollectionBehavior) -> Self {
        MockCollection {
            behavior,
            minor_calls: AtomicUsize::new(0),
            major_calls: AtomicUsize::new(0),
            oom_calls: AtomicUsize::new(0),
            last_oom_error: Mutex::new(None),
        }
    }

    pub fn minor_calls(&self) -> usize {
        self.minor_calls.load(Ordering::SeqCst)
    }

    pub fn major_calls(&self) -> usize {
        self.major_calls.load(Ordering::SeqCst)
    }

    pub fn oom_calls(&self) -> usize {
        self.oom_calls.load(Ordering::SeqCst)
    }

    pub fn last_oom_error(&self) -> Option<AllocationError> {
        *self.last_oom_error.lock().unwrap()
    }

    fn apply(&self, heap: &Heap) {
        match self.behavior {
            CollectionBehavior::Nop => {}
            CollectionBehavior::ResetYoung => heap.new_space().reset(),
        }
    }
}

impl Collection for MockCollection {
    fn run_minor_collection(&self, heap: &Heap) {
        self.minor_calls.fetch_add(1, Ordering::SeqCst);
        self.apply(heap);
    }

    fn run_major_collection(&self, heap: &Heap, _pressure: MemoryPressure) {
        self.major_calls.fetch_add(1, Ordering::SeqCst);
        self.apply(heap);
    }

    fn out_of_memory(&self, error: AllocationError) {
        self.oom_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_oom_error.lock().unwrap() = Some(error);
    }
}
