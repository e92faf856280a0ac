//! Fatal error paths.
//!
//! None of these conditions can be recovered from: by the time they are
//! detected a context switch is already underway, or the stack they would
//! unwind through has no caller frame. Each prints a diagnostic, calls a
//! no-op hook that a debugger can break on, then aborts the process.

use std::process;

/// Called before aborting on a transfer to a coroutine that cannot be
/// resumed. Break on this symbol to debug.
#[no_mangle]
#[inline(never)]
pub extern "C" fn coro_yield_error() {
    core::hint::black_box(());
}

/// Called before aborting when a start function returns or unwinds instead
/// of calling `Coro::finish`. Break on this symbol to debug.
#[no_mangle]
#[inline(never)]
pub extern "C" fn coro_return_error() {
    core::hint::black_box(());
}

/// Called before aborting when a running coroutine loses its last handle.
/// Break on this symbol to debug.
#[no_mangle]
#[inline(never)]
pub extern "C" fn coro_release_error() {
    core::hint::black_box(());
}

#[cold]
fn die(message: &str, hook: extern "C" fn()) -> ! {
    eprintln!("coroutine error: {message}");
    hook();
    process::abort()
}

/// `suspend` or `finish` on a coroutine that was never `call`ed into.
#[cold]
pub fn no_caller() -> ! {
    die(
        "attempt to yield to undefined coro (no caller set). break on coro_yield_error to debug",
        coro_yield_error,
    )
}

/// Transfer to a bare coroutine that has never suspended, so there is
/// nothing to resume.
#[cold]
pub fn undefined_target() -> ! {
    die(
        "attempt to yield to undefined coro. break on coro_yield_error to debug",
        coro_yield_error,
    )
}

/// The start function returned normally.
#[cold]
pub fn start_returned() -> ! {
    die(
        "returned from a coroutine, use finish to return. break on coro_return_error to debug",
        coro_return_error,
    )
}

/// The start function unwound.
#[cold]
pub fn start_unwound() -> ! {
    die(
        "panic escaped a coroutine start function. break on coro_return_error to debug",
        coro_return_error,
    )
}

/// The last handle to the running coroutine was dropped, which would free the
/// stack it is executing on.
#[cold]
pub fn released_while_running() -> ! {
    die(
        "released the running coro. break on coro_release_error to debug",
        coro_release_error,
    )
}
