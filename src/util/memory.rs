use crate::util::Address;
use std::io::Result;

/// Zero a range of memory.
pub fn zero(start: Address, len: usize) {
    let ptr = start.to_mut_ptr();
    wrap_libc_call(&|| unsafe { libc::memset(ptr, 0, len) }, ptr).unwrap()
}

/// Map a fresh anonymous region of the given size. The returned memory is
/// page aligned, readable, writable and executable, and guaranteed zeroed.
pub fn mmap_anonymous(size: usize) -> Result<Address> {
    let prot = libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC;
    let flags = libc::MAP_ANON | libc::MAP_PRIVATE;
    let ret = unsafe { libc::mmap(std::ptr::null_mut(), size, prot, flags, -1, 0) };
    if ret == libc::MAP_FAILED {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(Address::from_mut_ptr(ret))
    }
}

/// Unmap a region previously returned by `mmap_anonymous`.
pub fn munmap(start: Address, size: usize) -> Result<()> {
    wrap_libc_call(&|| unsafe { libc::munmap(start.to_mut_ptr(), size) }, 0)
}

fn wrap_libc_call<T: PartialEq>(f: &dyn Fn() -> T, expect: T) -> Result<()> {
    let ret = f();
    if ret == expect {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::BYTES_IN_PAGE;

    #[test]
    fn test_mmap_zeroed_and_aligned() {
        let start = mmap_anonymous(BYTES_IN_PAGE).unwrap();
        assert!(start.is_aligned_to(BYTES_IN_PAGE));
        let slice = unsafe { std::slice::from_raw_parts(start.to_ptr::<u8>(), BYTES_IN_PAGE) };
        assert!(slice.iter().all(|&b| b == 0));
        munmap(start, BYTES_IN_PAGE).unwrap();
    }
}
