//! Machine-context switching.
//!
//! Every backend exposes the same small surface:
//! - `MachineContext`, the saved state of a suspended execution context.
//! - `init_context` to arrange for `func(arg)` to run on a stack the first
//!   time the context is resumed.
//! - `swap_context` to save the running context and resume another one.
//!
//! The assembly backends only save the registers that the platform ABI
//! declares callee-saved: `swap_context` is an ordinary `extern "C"` call as
//! far as the compiler is concerned, so everything else is already assumed
//! to be clobbered.

#![allow(unused_macros)]

// Symbol naming and function directives differ between Mach-O and ELF.
cfg_if::cfg_if! {
    if #[cfg(target_vendor = "apple")] {
        macro_rules! symbol {
            ($name:literal) => { concat!("_", $name) };
        }
        macro_rules! fn_visibility {
            ($name:literal) => { concat!(".private_extern ", symbol!($name)) };
        }
        macro_rules! fn_size {
            ($name:literal) => { "" };
        }
    } else {
        macro_rules! symbol {
            ($name:literal) => { $name };
        }
        macro_rules! fn_visibility {
            ($name:literal) => { concat!(".type ", symbol!($name), ", @function") };
        }
        macro_rules! fn_size {
            ($name:literal) => { concat!(".size ", symbol!($name), ", . - ", symbol!($name)) };
        }
    }
}

/// Emits a global assembly function `$name` made of the given lines, aligned
/// to `$align` bytes.
macro_rules! global_fn {
    ($name:literal, align = $align:literal, $($line:literal),* $(,)?) => {
        core::arch::global_asm!(
            concat!(".balign ", $align),
            concat!(".globl ", symbol!($name)),
            fn_visibility!($name),
            concat!(symbol!($name), ":"),
            $($line,)*
            fn_size!($name),
        );
    };
}

/// Function that a fresh context starts executing. It receives the argument
/// given to `init_context` and must never return.
pub type InitialFunc = unsafe extern "C" fn(arg: *const ()) -> !;

cfg_if::cfg_if! {
    if #[cfg(any(
        feature = "ucontext",
        all(unix, not(any(target_arch = "x86_64", target_arch = "aarch64"))),
    ))] {
        mod ucontext;
        pub use self::ucontext::*;
    } else if #[cfg(all(target_arch = "x86_64", unix))] {
        mod x86_64;
        pub use self::x86_64::*;
    } else if #[cfg(all(target_arch = "aarch64", unix))] {
        mod aarch64;
        pub use self::aarch64::*;
    } else {
        compile_error!("Unsupported target");
    }
}

/// Stores `val` below `sp` and moves `sp` down to it.
#[cfg(all(
    not(feature = "ucontext"),
    any(target_arch = "x86_64", target_arch = "aarch64"),
))]
#[inline]
unsafe fn push(sp: &mut usize, val: StackWord) {
    *sp -= core::mem::size_of::<StackWord>();
    *(*sp as *mut StackWord) = val;
}
