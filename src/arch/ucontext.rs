//! Context switching on top of the C library's `ucontext` functions.
//!
//! This is slower than the assembly backends since `swapcontext` also saves
//! and restores the signal mask with a system call, but it works on any
//! target whose C library still ships `makecontext`.
//!
//! `makecontext` only forwards `int`-sized arguments to the new context, so
//! pointers cannot be passed directly on 64-bit targets. Both the initial
//! function and its argument are split into two 32-bit halves here and
//! reassembled by `ucontext_trampoline`.

use core::cell::{Cell, UnsafeCell};
use core::mem;
use core::ptr;

use libc::c_uint;

use super::InitialFunc;
use crate::stack::Stack;
use crate::util::{join_ptr, split_ptr};

pub const STACK_ALIGNMENT: usize = 16;

/// Saved state of a suspended context.
pub struct MachineContext {
    uc: UnsafeCell<libc::ucontext_t>,
    valid: Cell<bool>,
}

impl MachineContext {
    #[inline]
    pub fn new() -> Self {
        Self {
            uc: UnsafeCell::new(unsafe { mem::zeroed() }),
            valid: Cell::new(false),
        }
    }

    /// Whether this context holds state that can be switched to.
    #[inline]
    pub fn is_resumable(&self) -> bool {
        self.valid.get()
    }

    /// The saved register layout is target-specific, so the stack pointer of
    /// a suspended context is not reported.
    #[inline]
    pub fn stack_pointer(&self) -> Option<usize> {
        None
    }
}

extern "C" fn ucontext_trampoline(func_hi: c_uint, func_lo: c_uint, arg_hi: c_uint, arg_lo: c_uint) {
    unsafe {
        let func = mem::transmute::<usize, InitialFunc>(join_ptr(func_hi, func_lo));
        func(join_ptr(arg_hi, arg_lo) as *const ())
    }
}

/// Sets up `ctx` so that `func(arg)` is executed on `stack` the first time
/// it is switched to.
pub unsafe fn init_context(
    ctx: &MachineContext,
    stack: &dyn Stack,
    func: InitialFunc,
    arg: *const (),
) {
    let uc = ctx.uc.get();
    let ret = libc::getcontext(uc);
    assert_eq!(ret, 0, "getcontext failed");

    (*uc).uc_stack.ss_sp = stack.limit().get() as *mut libc::c_void;
    (*uc).uc_stack.ss_size = stack.size();
    (*uc).uc_stack.ss_flags = 0;
    (*uc).uc_link = ptr::null_mut();

    let (func_hi, func_lo) = split_ptr(func as usize);
    let (arg_hi, arg_lo) = split_ptr(arg as usize);
    let entry = mem::transmute::<extern "C" fn(c_uint, c_uint, c_uint, c_uint), extern "C" fn()>(
        ucontext_trampoline,
    );
    libc::makecontext(uc, entry, 4, func_hi, func_lo, arg_hi, arg_lo);

    ctx.valid.set(true);
}

/// Suspends the current context into `save` and resumes `load`.
///
/// Returns once some other context switches back to `save`.
#[inline]
pub unsafe fn swap_context(save: &MachineContext, load: &MachineContext) {
    save.valid.set(true);
    let ret = libc::swapcontext(save.uc.get(), load.uc.get());
    debug_assert_eq!(ret, 0);
}
