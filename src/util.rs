//! Small helpers shared by the context-switching backends and the stack
//! inspector.

use core::hint::black_box;

/// Splits a pointer-sized value into its high and low 32-bit halves, for
/// passing through interfaces that only forward `int` arguments.
///
/// On 32-bit targets the high half is always 0.
#[inline]
#[allow(dead_code)]
pub fn split_ptr(ptr: usize) -> (u32, u32) {
    let wide = ptr as u64;
    ((wide >> 32) as u32, wide as u32)
}

/// Reassembles a value produced by [`split_ptr`].
#[inline]
#[allow(dead_code)]
pub fn join_ptr(hi: u32, lo: u32) -> usize {
    ((hi as u64) << 32 | lo as u64) as usize
}

/// Returns an address on the current stack, close to the stack pointer of the
/// caller.
#[inline(never)]
pub fn current_stack_address() -> usize {
    let marker = 0u8;
    black_box(&marker) as *const u8 as usize
}

/// Determines empirically whether the stack grows towards lower addresses,
/// by comparing the address of a local with one taken a call deeper.
#[inline(never)]
pub fn stack_grows_down() -> bool {
    let marker = 0u8;
    let outer = black_box(&marker) as *const u8 as usize;
    current_stack_address() < outer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_join_ptr() {
        let value = usize::MAX - 0x1f3;
        let (hi, lo) = split_ptr(value);
        assert_eq!(join_ptr(hi, lo), value);

        assert_eq!(split_ptr(0x1234_5678), (0, 0x1234_5678));
        #[cfg(target_pointer_width = "64")]
        assert_eq!(split_ptr(0xdead_beef_0000_0001), (0xdead_beef, 1));
    }

    #[test]
    fn stack_direction() {
        // Every supported target has a downwards growing stack.
        assert!(stack_grows_down());
    }
}
