use crate::util::memory;
use crate::util::Address;

/// Align `region` up for an allocation with the given alignment, returning
/// the address the object will start at.
pub fn align_allocation(region: Address, align: usize) -> Address {
    debug_assert!(align.is_power_of_two());
    region.align_up(align)
}

/// Zero the gap between the natural bump position and the aligned object
/// start, so that the skipped bytes read as filler.
pub fn fill_alignment_gap(start: Address, end: Address) {
    if end > start {
        memory::zero(start, end - start);
    }
}

/// The error reported when the retry ladder is exhausted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocationError {
    /// The regular spaces and the collector could not supply the memory.
    HeapOutOfMemory,
    /// A dedicated large-object mapping could not be established; the
    /// constraint is address space rather than region capacity.
    AddressSpaceOutOfMemory,
}

/// A thread-local bump range. The cursor and limit are owned by a single
/// allocating thread; no synchronization applies within the range.
#[derive(Copy, Clone, Debug)]
pub struct BumpPointer {
    pub cursor: Address,
    pub limit: Address,
}

impl BumpPointer {
    /// An empty range that fails every allocation, used before the first
    /// refill.
    pub const EMPTY: BumpPointer = BumpPointer {
        cursor: Address::ZERO,
        limit: Address::ZERO,
    };

    pub fn new(cursor: Address, limit: Address) -> Self {
        debug_assert!(cursor <= limit);
        BumpPointer { cursor, limit }
    }

    /// Bump-allocate from this range. Returns the aligned object start, or
    /// `None` if the range cannot fit the request.
    pub fn allocate(&mut self, size: usize, align: usize) -> Option<Address> {
        let start = align_allocation(self.cursor, align);
        let new_cursor = start + size;
        if new_cursor > self.limit {
            return None;
        }
        fill_alignment_gap(self.cursor, start);
        self.cursor = new_cursor;
        Some(start)
    }

    /// Bytes left in the range.
    pub fn remaining(&self) -> usize {
        self.limit - self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_allocation_rounds_up() {
        let unaligned = unsafe { Address::from_usize(0x1001) };
        assert_eq!(align_allocation(unaligned, 8), unsafe {
            Address::from_usize(0x1008)
        });
        let aligned = unsafe { Address::from_usize(0x1010) };
        assert_eq!(align_allocation(aligned, 16), aligned);
    }

    #[test]
    fn bump_pointer_respects_limit() {
        let start = unsafe { Address::from_usize(0x1000) };
        let mut bp = BumpPointer::new(start, start + 32usize);
        assert_eq!(bp.allocate(16, 8), Some(start));
        assert_eq!(bp.allocate(16, 8), Some(start + 16usize));
        assert_eq!(bp.allocate(1, 8), None);
        assert_eq!(bp.remaining(), 0);
    }

    #[test]
    fn empty_bump_pointer_always_fails() {
        let mut bp = BumpPointer::EMPTY;
        assert_eq!(bp.allocate(1, 8), None);
    }
}
