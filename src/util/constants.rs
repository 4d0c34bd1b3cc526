use static_assertions::const_assert;

pub const LOG_BYTES_IN_WORD: usize = 3;
pub const BYTES_IN_WORD: usize = 1 << LOG_BYTES_IN_WORD;

pub const LOG_BYTES_IN_PAGE: usize = 12;
pub const BYTES_IN_PAGE: usize = 1 << LOG_BYTES_IN_PAGE;

/// Granularity at which paged spaces grow. A chunk is the unit the page
/// provider is asked for when a bump region runs out of linear space.
pub const LOG_PAGES_IN_CHUNK: usize = 7;
pub const PAGES_IN_CHUNK: usize = 1 << LOG_PAGES_IN_CHUNK;
pub const BYTES_IN_CHUNK: usize = BYTES_IN_PAGE << LOG_PAGES_IN_CHUNK;

/// Alignment of tagged object references.
pub const TAGGED_ALIGNMENT: usize = BYTES_IN_WORD;
/// Alignment for objects containing unboxed doubles.
pub const DOUBLE_ALIGNMENT: usize = 16;

/// The smallest hole worth tracking on a free list. Anything below this is
/// left as filler.
pub const MIN_FREE_LIST_HOLE_BYTES: usize = 2 * BYTES_IN_WORD;

const_assert!(TAGGED_ALIGNMENT.is_power_of_two());
const_assert!(DOUBLE_ALIGNMENT.is_power_of_two());
const_assert!(DOUBLE_ALIGNMENT >= TAGGED_ALIGNMENT);
const_assert!(BYTES_IN_CHUNK % BYTES_IN_PAGE == 0);
