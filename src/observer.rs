//! Allocation observers.
//!
//! An [`Observer`] is attached to a coroutine when it is built and is told
//! when the coroutine object is created and destroyed. This replaces global
//! allocation counters: a test attaches its own [`AllocCounter`] and checks
//! that it balances, without sharing state with anything else in the
//! process.

use core::cell::Cell;

/// Receives creation and destruction events for the coroutines it is
/// attached to.
pub trait Observer {
    /// A coroutine object was created.
    fn allocated(&self);

    /// A coroutine object was destroyed.
    fn deallocated(&self);
}

/// Observer that counts creations and destructions.
///
/// ```
/// use std::rc::Rc;
/// use coro::{AllocCounter, Builder};
///
/// let counter = Rc::new(AllocCounter::new());
/// let co = Builder::new()
///     .observer(counter.clone())
///     .build(|co| co.finish())
///     .unwrap();
/// co.run();
/// drop(co);
/// assert!(counter.balanced());
/// ```
#[derive(Debug, Default)]
pub struct AllocCounter {
    allocs: Cell<usize>,
    deallocs: Cell<usize>,
}

impl AllocCounter {
    /// Creates a counter with both counts at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of coroutines created so far.
    pub fn allocs(&self) -> usize {
        self.allocs.get()
    }

    /// Number of coroutines destroyed so far.
    pub fn deallocs(&self) -> usize {
        self.deallocs.get()
    }

    /// Whether every coroutine created so far has been destroyed.
    pub fn balanced(&self) -> bool {
        self.allocs() == self.deallocs()
    }
}

impl Observer for AllocCounter {
    fn allocated(&self) {
        self.allocs.set(self.allocs.get() + 1);
    }

    fn deallocated(&self) {
        self.deallocs.set(self.deallocs.get() + 1);
    }
}
