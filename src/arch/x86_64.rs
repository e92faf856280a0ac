//! Context switching for x86_64 (System V ABI).
//!
//! A suspended context is nothing more than a stack pointer: everything
//! needed to resume it is stored on its own stack by `coro_swap_context`.
//!
//! ## Stack layout
//!
//! Here is what the top of a stack looks like when its context is
//! suspended inside `coro_swap_context`:
//!
//! ```text
//! |              |
//! ~     ...      ~
//! |              |
//! +--------------+
//! | Return addr  |  <- Back into the caller of swap_context().
//! +--------------+
//! | Saved RBP    |
//! +--------------+
//! | Saved RBX    |
//! +--------------+
//! | Saved R12    |
//! +--------------+
//! | Saved R13    |
//! +--------------+
//! | Saved R14    |
//! +--------------+
//! | Saved R15    |
//! +--------------+
//! | FPU CW|MXCSR |
//! +--------------+  <- Saved stack pointer
//! ```
//!
//! A freshly initialized stack has the same shape, with the return address
//! pointing at `coro_init_trampoline`, the initial function in R12 and its
//! argument in RBX:
//!
//! ```text
//! +--------------+  <- Stack base
//! | Trampoline   |
//! +--------------+
//! | 0 (RBP)      |
//! +--------------+
//! | Arg (RBX)    |
//! +--------------+
//! | Func (R12)   |
//! +--------------+
//! | 0 (R13-R15)  |
//! ~              ~
//! +--------------+
//! | FPU CW|MXCSR |  <- Initial stack pointer
//! +--------------+
//! ```

use core::cell::Cell;

use super::{push, InitialFunc};
use crate::stack::Stack;

pub const STACK_ALIGNMENT: usize = 16;
pub type StackWord = u64;

// Default control words, as set up by the kernel for a new process.
const INITIAL_MXCSR: StackWord = 0x1f80;
const INITIAL_FPU_CW: StackWord = 0x037f;

// Saves the callee-saved registers of the current context on its stack,
// stores the resulting stack pointer through RDI, then loads the stack pointer
// stored at RSI and restores the registers saved there.
//
// The target stack pointer is only read after ours has been written so that
// switching a context to itself behaves like a plain save and return.
global_fn!(
    "coro_swap_context",
    align = 16,
    "push rbp",
    "push rbx",
    "push r12",
    "push r13",
    "push r14",
    "push r15",
    // The SSE and x87 control words are callee-saved as well.
    "sub rsp, 8",
    "stmxcsr dword ptr [rsp]",
    "fnstcw word ptr [rsp + 4]",
    "mov [rdi], rsp",
    "mov rsp, [rsi]",
    "ldmxcsr dword ptr [rsp]",
    "fldcw word ptr [rsp + 4]",
    "add rsp, 8",
    "pop r15",
    "pop r14",
    "pop r13",
    "pop r12",
    "pop rbx",
    "pop rbp",
    // Return into the resumed context, or into coro_init_trampoline if the
    // context has never run.
    "ret",
);

// First code executed on a fresh stack. RSP is the stack base, which is
// 16-byte aligned as required before a CALL.
global_fn!(
    "coro_init_trampoline",
    align = 16,
    ".cfi_startproc",
    // There is no caller frame to unwind into: stop backtraces here.
    ".cfi_undefined rip",
    "mov rdi, rbx",
    "call r12",
    // The initial function never returns.
    "ud2",
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

    // Return address of coro_swap_context.
    push(&mut sp, coro_init_trampoline as StackWord);

    // Callee-saved registers, in the order they are pushed. A zero RBP ends
    // the frame pointer chain.
    push(&mut sp, 0);
    push(&mut sp, arg as StackWord);
    push(&mut sp, func as StackWord);
    push(&mut sp, 0);
    push(&mut sp, 0);
    push(&mut sp, 0);

    push(&mut sp, INITIAL_MXCSR | INITIAL_FPU_CW << 32);

    ctx.sp.set(sp);
}

/// Suspends the current context into `save` and resumes `load`.
///
/// Returns once some other context switches back to `save`.
#[inline]
pub unsafe fn swap_context(save: &MachineContext, load: &MachineContext) {
    coro_swap_context(save.sp.as_ptr(), load.sp.as_ptr());
}
