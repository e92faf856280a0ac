//! *Stackful, cooperative coroutines with explicit control transfer.*
//!
//! ## Overview
//!
//! This crate provides [coroutines] that each run on their own machine stack
//! and hand control to one another explicitly. There is no scheduler and no
//! preemption: a coroutine runs until it invokes one of the transfer
//! operations, and exactly one execution context is running at a time.
//!
//! A [`Coro`] is created with a start function. Control moves between
//! coroutines with four operations:
//!
//! - [`call`](Coro::call) enters another coroutine and records the current
//!   one as its caller.
//! - [`suspend`](Coro::suspend) goes back to the caller, to be resumed later
//!   from the same point.
//! - [`finish`](Coro::finish) goes back to the caller and resets the
//!   coroutine, so that the next entry starts the start function over.
//! - [`yield_to`](Coro::yield_to) enters another coroutine without
//!   recording a caller, for peer-to-peer rings.
//!
//! [`run`](Coro::run) calls into a coroutine from a throwaway anchor, and
//! [`Coro::bare`] creates an anchor that represents the current flow of
//! control, typically `main`.
//!
//! [coroutines]: https://en.wikipedia.org/wiki/Coroutine
//!
//! ## Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use coro::Coro;
//!
//! let number = Rc::new(Cell::new(0));
//! let out = number.clone();
//! let fib = Coro::new(move |co| {
//!     let (mut previous, mut current) = (0, 1);
//!     out.set(1);
//!     co.suspend();
//!     loop {
//!         out.set(current + previous);
//!         previous = current;
//!         current = out.get();
//!         co.suspend();
//!     }
//! });
//!
//! let mut seen = Vec::new();
//! while number.get() < 20 {
//!     fib.run();
//!     seen.push(number.get());
//! }
//! assert_eq!(seen, [1, 1, 2, 3, 5, 8, 13, 21]);
//! ```
//!
//! ## Supported targets
//!
//! | Architecture | Context switch                     |
//! |--------------|------------------------------------|
//! | x86_64       | Hand-written assembly (System V)   |
//! | AArch64      | Hand-written assembly (AAPCS64)    |
//! | Other Unix   | `getcontext`/`swapcontext` (libc)  |
//!
//! Windows is not supported.
//!
//! ## Cargo features
//!
//! #### `ucontext`
//!
//! Uses the C library's `ucontext` functions for context switching even on
//! targets with an assembly implementation. Switches are slower since they
//! also save and restore the signal mask.
//!
//! ## Environment
//!
//! `CORO_STACK_SIZE` overrides the default stack size (128 KiB) of
//! coroutines created without an explicit [`Builder::stack_size`].

#![warn(missing_docs)]

mod arch;
mod builder;
mod coroutine;
mod fatal;
mod observer;
pub mod stack;
mod util;

pub use builder::{Builder, STACK_SIZE_ENV};
pub use coroutine::Coro;
pub use observer::{AllocCounter, Observer};
