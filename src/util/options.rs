use crate::util::constants::*;
use crate::util::conversions::raw_align_up;

const MBYTE: usize = 1 << 20;

/// Configuration for a heap instance. All behavior toggles live here and are
/// passed to [`HeapBuilder`](crate::heap::HeapBuilder) explicitly; there is no
/// process-wide mutable state.
///
/// Capacities are in bytes and are rounded up to page granularity when the
/// spaces are created.
#[derive(Clone, Debug)]
pub struct HeapOptions {
    /// Capacity of the young generation, reserved contiguously at setup.
    pub young_space_capacity: usize,
    /// Capacity of the old space, grown on demand in chunk units.
    pub old_space_capacity: usize,
    /// Capacity of the executable code space.
    pub code_space_capacity: usize,
    /// Capacity of the map/metadata space.
    pub map_space_capacity: usize,
    /// Capacity of the read-only space, reserved contiguously at setup.
    pub read_only_space_capacity: usize,
    /// Capacity of each large-object space.
    pub large_object_space_capacity: usize,
    /// Capacity of each shared space (old and map) used by concurrent
    /// allocators.
    pub shared_space_capacity: usize,
    /// Size cutoff above which a request is routed to a large-object space
    /// regardless of the requested allocation type.
    pub max_regular_object_size: usize,
    /// Size of the thread-local buffer a concurrent allocator carves out of a
    /// shared space per refill.
    pub lab_size: usize,
    /// Diagnostic countdown: after this many allocation attempts the fast
    /// path reports failure and forces a collection. Test/debug facility,
    /// reset explicitly between scenarios.
    pub allocation_timeout: Option<u32>,
}

impl Default for HeapOptions {
    fn default() -> Self {
        HeapOptions {
            young_space_capacity: 4 * MBYTE,
            old_space_capacity: 16 * MBYTE,
            code_space_capacity: 4 * MBYTE,
            map_space_capacity: 2 * MBYTE,
            read_only_space_capacity: MBYTE,
            large_object_space_capacity: 32 * MBYTE,
            shared_space_capacity: 8 * MBYTE,
            max_regular_object_size: 32 * 1024,
            lab_size: 64 * 1024,
            allocation_timeout: None,
        }
    }
}

impl HeapOptions {
    /// Check the option values for consistency. Returns an error message for
    /// the first invalid value found.
    pub fn validate(&self) -> Result<(), String> {
        if self.young_space_capacity == 0 {
            return Err("young_space_capacity must be non-zero".to_string());
        }
        if self.old_space_capacity == 0 {
            return Err("old_space_capacity must be non-zero".to_string());
        }
        if self.read_only_space_capacity == 0 {
            return Err("read_only_space_capacity must be non-zero".to_string());
        }
        if self.max_regular_object_size == 0 {
            return Err("max_regular_object_size must be non-zero".to_string());
        }
        if self.max_regular_object_size > self.young_space_capacity {
            return Err(
                "max_regular_object_size must not exceed young_space_capacity".to_string(),
            );
        }
        if self.lab_size < BYTES_IN_WORD {
            return Err("lab_size must hold at least one word".to_string());
        }
        if self.lab_size > self.shared_space_capacity {
            return Err("lab_size must not exceed shared_space_capacity".to_string());
        }
        Ok(())
    }

    /// Young space capacity rounded up to whole pages.
    pub fn young_space_pages(&self) -> usize {
        raw_align_up(self.young_space_capacity, BYTES_IN_PAGE) >> LOG_BYTES_IN_PAGE
    }

    /// Read-only space capacity rounded up to whole pages.
    pub fn read_only_space_pages(&self) -> usize {
        raw_align_up(self.read_only_space_capacity, BYTES_IN_PAGE) >> LOG_BYTES_IN_PAGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid() {
        assert!(HeapOptions::default().validate().is_ok());
    }

    #[test]
    fn zero_young_capacity_rejected() {
        let options = HeapOptions {
            young_space_capacity: 0,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn oversized_threshold_rejected() {
        let options = HeapOptions {
            young_space_capacity: MBYTE,
            max_regular_object_size: 2 * MBYTE,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn oversized_lab_rejected() {
        let options = HeapOptions {
            shared_space_capacity: 4096,
            lab_size: 8192,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn page_rounding() {
        let options = HeapOptions {
            young_space_capacity: BYTES_IN_PAGE + 1,
            ..Default::default()
        };
        assert_eq!(options.young_space_pages(), 2);
    }
}
