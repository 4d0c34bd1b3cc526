//! Utilities used across the crate, and part of the public API.

pub mod address;
pub mod alloc;
pub mod constants;
pub mod conversions;
pub mod heap;
pub mod logger;
pub mod memory;
pub mod options;
#[cfg(test)]
pub(crate) mod test_util;

pub use self::address::Address;
