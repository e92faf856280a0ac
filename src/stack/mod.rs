//! Machine stacks that coroutines run on.
//!
//! Every stackful coroutine owns one [`Stack`]. [`DefaultStack`] maps fresh
//! memory from the OS; anything else that satisfies the trait's contract can
//! be handed to [`Builder::build_with_stack`](crate::Builder::build_with_stack).

use core::num::NonZeroUsize;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use self::unix::DefaultStack;
    } else {
        compile_error!("Unsupported target");
    }
}

/// Address within a stack.
pub type StackPointer = NonZeroUsize;

/// Alignment that both ends of a stack must have.
pub const STACK_ALIGNMENT: usize = crate::arch::STACK_ALIGNMENT;

/// Smallest stack [`DefaultStack`] will allocate. Smaller requests are
/// rounded up.
pub const MIN_STACK_SIZE: usize = 4096;

/// Stack size of coroutines that don't configure one.
pub const DEFAULT_STACK_SIZE: usize = 128 * 1024;

/// Owner of a block of memory usable as a machine stack.
///
/// Stacks grow downwards on every supported target: execution starts at
/// [`base`](Stack::base) and moves towards [`limit`](Stack::limit).
///
/// # Safety
///
/// Memory between `limit` and `base` must stay readable and writable, and
/// must not move, for as long as the object is alive. Both addresses must be
/// aligned to [`STACK_ALIGNMENT`] and at least [`MIN_STACK_SIZE`] bytes
/// apart. Overflow is not detected.
pub unsafe trait Stack {
    /// Highest address of the stack, one past its last usable byte.
    fn base(&self) -> StackPointer;

    /// Lowest address of the stack.
    fn limit(&self) -> StackPointer;

    /// Usable size in bytes.
    #[inline]
    fn size(&self) -> usize {
        self.base().get() - self.limit().get()
    }

    /// Whether `addr` points into this stack.
    #[inline]
    fn contains(&self, addr: usize) -> bool {
        (self.limit().get()..=self.base().get()).contains(&addr)
    }
}

#[test]
fn assert_send_sync() {
    fn send<T: Send>() {}
    fn sync<T: Sync>() {}
    send::<DefaultStack>();
    sync::<DefaultStack>();
}
