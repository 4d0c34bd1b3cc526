//! Allocation primitives shared by the main-thread and background
//! allocators.

pub mod allocator;
pub mod concurrent_allocator;

pub use allocator::{AllocationError, BumpPointer};
pub use concurrent_allocator::ConcurrentAllocator;
