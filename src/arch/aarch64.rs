//! Context switching for AArch64 (AAPCS64).
//!
//! As on x86_64, a suspended context is just a stack pointer. The frame that
//! `coro_swap_context` leaves at the top of a suspended stack is 160 bytes:
//!
//! ```text
//! +--------------+
//! | D8 - D15     |  <- Low 64 bits only, as the ABI requires.
//! +--------------+
//! | X29, LR      |  <- LR is where execution resumes.
//! +--------------+
//! | X19 - X28    |
//! +--------------+  <- Saved stack pointer
//! ```
//!
//! A fresh stack carries the same frame directly below the stack base, with
//! LR pointing at `coro_init_trampoline`, the initial function in X20 and its
//! argument in X19.

use core::cell::Cell;

use super::{push, InitialFunc};
use crate::stack::Stack;

pub const STACK_ALIGNMENT: usize = 16;
pub type StackWord = u64;

// X0 holds where to save our stack pointer, X1 where to load the stack
// pointer to resume from. X1 is only read after X0 has been written so that
// switching a context to itself behaves like a plain save and return.
global_fn!(
    "coro_swap_context",
    align = 4,
    "sub sp, sp, #160",
    "stp x19, x20, [sp, #0]",
    "stp x21, x22, [sp, #16]",
    "stp x23, x24, [sp, #32]",
    "stp x25, x26, [sp, #48]",
    "stp x27, x28, [sp, #64]",
    "stp x29, lr, [sp, #80]",
    "stp d8, d9, [sp, #96]",
    "stp d10, d11, [sp, #112]",
    "stp d12, d13, [sp, #128]",
    "stp d14, d15, [sp, #144]",
    "mov x2, sp",
    "str x2, [x0]",
    "ldr x2, [x1]",
    "mov sp, x2",
    "ldp x19, x20, [sp, #0]",
    "ldp x21, x22, [sp, #16]",
    "ldp x23, x24, [sp, #32]",
    "ldp x25, x26, [sp, #48]",
    "ldp x27, x28, [sp, #64]",
    "ldp x29, lr, [sp, #80]",
    "ldp d8, d9, [sp, #96]",
    "ldp d10, d11, [sp, #112]",
    "ldp d12, d13, [sp, #128]",
    "ldp d14, d15, [sp, #144]",
    "add sp, sp, #160",
    "ret",
);

// First code executed on a fresh stack. SP is the stack base.
global_fn!(
    "coro_init_trampoline",
    align = 4,
    ".cfi_startproc",
    // There is no caller frame to unwind into: stop backtraces here.
    ".cfi_undefined x30",
    "mov x0, x19",
    "blr x20",
    // The initial function never returns.
    "brk #0",
    ".cfi_endproc",
);

extern "C" {
    fn coro_swap_context(save: *mut usize, load: *const usize);
    fn coro_init_trampoline();
}

/// Saved state of a suspended context: its stack pointer, or 0 if the
/// context has never been captured or initialized.
pub struct MachineContext {
    sp: Cell<usize>,
}

impl MachineContext {
    #[inline]
    pub fn new() -> Self {
        Self { sp: Cell::new(0) }
    }

    /// Whether this context holds state that can be switched to.
    #[inline]
    pub fn is_resumable(&self) -> bool {
        self.sp.get() != 0
    }

    /// Stack pointer at the time this context was last suspended.
    #[inline]
    pub fn stack_pointer(&self) -> Option<usize> {
        Some(self.sp.get()).filter(|&sp| sp != 0)
    }
}

/// Sets up the initial state on a stack so that `func(arg)` is executed on
/// the first switch to `ctx`.
#[inline]
pub unsafe fn init_context(
    ctx: &MachineContext,
    stack: &dyn Stack,
    func: InitialFunc,
    arg: *const (),
) {
    let mut sp = stack.base().get();

    // D15 down to D8.
    for _ in 0..8 {
        push(&mut sp, 0);
    }

    // LR, then a zero X29 to end the frame record chain.
    push(&mut sp, coro_init_trampoline as StackWord);
    push(&mut sp, 0);

    // X28 down to X21.
    for _ in 0..8 {
        push(&mut sp, 0);
    }

    push(&mut sp, func as StackWord);
    push(&mut sp, arg as StackWord);

    ctx.sp.set(sp);
}

/// Suspends the current context into `save` and resumes `load`.
///
/// Returns once some other context switches back to `save`.
#[inline]
pub unsafe fn swap_context(save: &MachineContext, load: &MachineContext) {
    coro_swap_context(save.sp.as_ptr(), load.sp.as_ptr());
}
