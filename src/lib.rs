//! The allocation front end of a managed-object heap.
//!
//! The crate carves a reserved address range into typed spaces (young, old,
//! code, map, read-only, shared, and per-generation large-object spaces) and
//! serves object allocations out of them. The main-thread entry point is
//! [`HeapAllocator`]: a single dispatch layer that routes each request to the
//! space selected by its [`AllocationType`], reroutes oversized requests to a
//! large-object space, and on failure escalates through an explicit bounded
//! retry ladder that drives the embedder's [`Collection`] implementation.
//! Background threads allocate into the shared spaces through
//! [`ConcurrentAllocator`], which bump-allocates from thread-local buffers
//! and never runs a collection itself.
//!
//! Garbage collection is deliberately out of scope: the collector is a
//! collaborator behind the [`Collection`] trait, and the heap only exposes
//! the hooks it needs (space resets, hole reclamation, chunk release).
//!
//! A heap is configured with [`HeapOptions`] and built with [`HeapBuilder`]:
//!
//! ```ignore
//! let heap = HeapBuilder::new().build(Arc::new(MmapPageProvider::new()));
//! let mut allocator = HeapAllocator::new(&heap, collector);
//! let result = allocator.allocate_with_retry(
//!     AllocationRetryMode::RetryOrFail,
//!     size,
//!     AllocationType::Young,
//!     AllocationOrigin::Runtime,
//!     AllocationAlignment::TaggedAligned,
//! );
//! ```

pub mod allocator;
pub mod collection;
pub mod heap;
pub mod policy;
pub mod util;

pub use crate::allocator::{
    AllocationAlignment, AllocationOrigin, AllocationResult, AllocationRetryMode, AllocationType,
    HeapAllocator,
};
pub use crate::collection::{Collection, MemoryPressure};
pub use crate::heap::{Heap, HeapBuilder};
pub use crate::policy::space::{Space, SpaceKind};
pub use crate::util::alloc::{AllocationError, BumpPointer, ConcurrentAllocator};
pub use crate::util::heap::{MmapPageProvider, PageProvider};
pub use crate::util::options::HeapOptions;
pub use crate::util::Address;
