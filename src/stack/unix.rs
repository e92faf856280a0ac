use std::io;
use std::ptr;

use super::{Stack, StackPointer, DEFAULT_STACK_SIZE, MIN_STACK_SIZE};

fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    debug_assert!(size > 0 && (size as usize).is_power_of_two());
    size as usize
}

/// Length of the mapping backing a stack of at least `size` bytes.
fn mapping_len(size: usize, page_size: usize) -> io::Result<usize> {
    size.max(MIN_STACK_SIZE)
        .checked_next_multiple_of(page_size)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "stack size overflow"))
}

/// Stack backed by a private anonymous memory mapping.
///
/// The kernel hands out the pages zero-filled and only commits them on first
/// touch, so a large stack costs address space rather than memory. There is
/// no guard page: running off the bottom of the stack corrupts whatever is
/// mapped below it.
pub struct DefaultStack {
    base: StackPointer,
    len: usize,
}

impl DefaultStack {
    /// Maps a stack of at least `size` bytes, rounded up to whole pages and to
    /// [`MIN_STACK_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns the `mmap` error, or `InvalidInput` if rounding overflows.
    pub fn new(size: usize) -> io::Result<Self> {
        let len = mapping_len(size, page_size())?;

        #[cfg(target_os = "openbsd")]
        let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_STACK;
        #[cfg(not(target_os = "openbsd"))]
        let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                flags,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        let base = StackPointer::new(addr as usize + len)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stack mapped at the end of memory"))?;
        Ok(Self { base, len })
    }
}

impl Default for DefaultStack {
    fn default() -> Self {
        Self::new(DEFAULT_STACK_SIZE).expect("failed to allocate stack")
    }
}

impl Drop for DefaultStack {
    fn drop(&mut self) {
        let ret = unsafe { libc::munmap(self.limit().get() as *mut libc::c_void, self.len) };
        debug_assert_eq!(ret, 0);
    }
}

unsafe impl Stack for DefaultStack {
    #[inline]
    fn base(&self) -> StackPointer {
        self.base
    }

    #[inline]
    fn limit(&self) -> StackPointer {
        unsafe { StackPointer::new_unchecked(self.base.get() - self.len) }
    }

    #[inline]
    fn size(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_len_rounds_up() {
        assert_eq!(mapping_len(0, 4096).unwrap(), MIN_STACK_SIZE);
        assert_eq!(mapping_len(4097, 4096).unwrap(), 8192);
        assert_eq!(mapping_len(8192, 4096).unwrap(), 8192);
        assert_eq!(mapping_len(5000, 16384).unwrap(), 16384);
        assert!(mapping_len(usize::MAX, 4096).is_err());
    }

    #[test]
    fn stack_is_writable() {
        let stack = DefaultStack::new(16 * 1024).unwrap();
        assert!(stack.size() >= 16 * 1024);
        assert!(stack.contains(stack.base().get() - 1));
        assert!(!stack.contains(stack.limit().get() - 1));
        unsafe {
            let top = (stack.base().get() - 8) as *mut u64;
            assert_eq!(*top, 0);
            *top = 0xfeed;
            let bottom = stack.limit().get() as *mut u64;
            *bottom = 0xbeef;
            assert_eq!(*top, 0xfeed);
        }
    }
}
