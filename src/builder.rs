//! Coroutine configuration.

use std::env;
use std::io;
use std::rc::Rc;
use std::str::FromStr;

use crate::coroutine::{Coro, StartFn};
use crate::observer::Observer;
use crate::stack::{DefaultStack, Stack, DEFAULT_STACK_SIZE};

/// Environment variable overriding the default stack size, in bytes.
pub const STACK_SIZE_ENV: &str = "CORO_STACK_SIZE";

/// Reads an environment variable parsed as `T`, or returns `default` if it
/// is unset or does not parse.
fn env_get<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Coroutine factory, which can be used to configure the properties of a new
/// coroutine.
///
/// ```
/// use coro::Builder;
///
/// let co = Builder::new()
///     .stack_size(64 * 1024)
///     .build(|co| {
///         println!("hello from a 64 KiB stack");
///         co.finish();
///     })
///     .unwrap();
/// co.run();
/// ```
#[derive(Clone)]
pub struct Builder {
    stack_size: usize,
    observer: Option<Rc<dyn Observer>>,
}

impl Builder {
    /// Creates a builder with the default configuration: a stack of
    /// `CORO_STACK_SIZE` bytes if that environment variable is set to a
    /// number, [`DEFAULT_STACK_SIZE`] otherwise, and no observer.
    pub fn new() -> Self {
        Self {
            stack_size: env_get(STACK_SIZE_ENV, DEFAULT_STACK_SIZE),
            observer: None,
        }
    }

    /// Sets the size of the stack allocated for the coroutine. It is rounded
    /// up to a whole number of pages.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    /// Attaches an observer that is notified when the coroutine is created
    /// and destroyed.
    pub fn observer(mut self, observer: Rc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Creates a coroutine which runs `start` on a newly allocated stack each
    /// time it is entered from the top.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the stack could not be allocated.
    pub fn build<F>(self, start: F) -> io::Result<Coro>
    where
        F: FnMut(&Coro) + 'static,
    {
        let stack = DefaultStack::new(self.stack_size)?;
        Ok(self.build_with_stack(stack, start))
    }

    /// Creates a coroutine which runs `start` on the given stack. The
    /// configured stack size is ignored.
    pub fn build_with_stack<S, F>(self, stack: S, start: F) -> Coro
    where
        S: Stack + 'static,
        F: FnMut(&Coro) + 'static,
    {
        let stack: Box<dyn Stack> = Box::new(stack);
        let start: Box<StartFn> = Box::new(start);
        Coro::from_parts(Some((stack, start)), self.observer)
    }

    /// Creates a bare coroutine: it has no stack and no start function, and
    /// only serves as an anchor that other coroutines can return to.
    pub fn build_bare(self) -> Coro {
        Coro::from_parts(None, self.observer)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
