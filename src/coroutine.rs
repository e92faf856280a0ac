use core::cell::{Cell, UnsafeCell};
use core::fmt;
use core::mem::ManuallyDrop;
use core::ptr;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::arch::{self, MachineContext};
use crate::builder::Builder;
use crate::fatal;
use crate::observer::Observer;
use crate::stack::Stack;
use crate::util;

/// Start function of a coroutine, see [`Coro::new`].
pub(crate) type StartFn = dyn FnMut(&Coro);

thread_local! {
    // Coroutine whose stack this thread is executing on, or null when it is
    // executing on a stack that no coroutine owns.
    static RUNNING: Cell<*const Inner> = const { Cell::new(ptr::null()) };
}

/// A stackful coroutine: an execution context with its own machine stack,
/// which control is explicitly transferred into and out of.
///
/// `Coro` is a reference-counted handle. Cloning it retains the coroutine and
/// dropping it releases it; the coroutine is destroyed as soon as the last
/// handle, including the caller links held by other coroutines, goes away.
/// Destroying a suspended coroutine does not unwind its stack, so anything
/// owned by a suspended invocation of its start function is leaked.
///
/// At any time exactly one execution context is running on a thread and all
/// others are suspended. The transfer operations ([`call`](Coro::call),
/// [`yield_to`](Coro::yield_to), [`suspend`](Coro::suspend) and
/// [`finish`](Coro::finish)) must be invoked on the handle of the running
/// context; they return once another context transfers control back.
///
/// # Fatal errors
///
/// Misuse that would leave no valid context to run aborts the process after
/// printing a diagnostic:
/// - transferring to a coroutine that has nothing to resume (a bare
///   coroutine that never suspended, or a coroutine that is already running),
/// - [`suspend`](Coro::suspend) or [`finish`](Coro::finish) without a caller,
/// - a start function that returns or panics instead of calling
///   [`finish`](Coro::finish),
/// - dropping the last handle of the coroutine that is running.
///
/// Caller links are strong references, so a coroutine that ends up in its own
/// caller chain is never freed.
///
/// # `Send`
///
/// The reference count and the caller links are not thread-safe, so `Coro`
/// cannot be sent to another thread.
/// ```compile_fail
/// fn send<T: Send>() {}
/// send::<coro::Coro>();
/// ```
#[derive(Clone)]
pub struct Coro {
    inner: Rc<Inner>,
}

struct Inner {
    // Released first on destruction, before the stack is freed.
    caller: Cell<Option<Coro>>,

    // Saved machine state while suspended. Stale while running.
    context: MachineContext,

    // Set while the next transfer in must start from the entry point: from
    // creation until first entry, and again after finish(). The frame is only
    // built at that transfer since finish() is still executing on the stack
    // it would overwrite.
    rearm: Cell<bool>,

    // Value of RUNNING when this context last suspended. For a bare coroutine
    // this identifies the stack it actually suspended on.
    host: Cell<*const Inner>,

    // None for bare coroutines.
    entry: Option<Entry>,

    observer: Option<Rc<dyn Observer>>,
}

struct Entry {
    stack: Box<dyn Stack>,
    start: UnsafeCell<Box<StartFn>>,
}

impl Coro {
    /// Creates a coroutine which runs `start` on a new stack of the default
    /// size.
    ///
    /// `start` is not run until the coroutine is first entered with
    /// [`call`](Coro::call), [`yield_to`](Coro::yield_to) or
    /// [`run`](Coro::run). It receives the coroutine's own handle and must
    /// leave through a transfer operation: after [`finish`](Coro::finish) the
    /// next entry runs `start` again from the top. State that has to survive
    /// across such restarts belongs in the closure's captures.
    ///
    /// # Panics
    ///
    /// Panics if the stack can't be allocated. Use [`Builder::build`] to
    /// handle that case.
    pub fn new<F>(start: F) -> Self
    where
        F: FnMut(&Coro) + 'static,
    {
        Builder::new()
            .build(start)
            .expect("failed to allocate coroutine stack")
    }

    /// Creates a bare coroutine, which has no stack and no start function.
    ///
    /// A bare coroutine stands for whatever context transfers out of it
    /// first, typically the thread's main flow, so that others can
    /// [`suspend`](Coro::suspend) back to it.
    pub fn bare() -> Self {
        Builder::new().build_bare()
    }

    pub(crate) fn from_parts(
        entry: Option<(Box<dyn Stack>, Box<StartFn>)>,
        observer: Option<Rc<dyn Observer>>,
    ) -> Self {
        let stackful = entry.is_some();
        let inner = Rc::new(Inner {
            caller: Cell::new(None),
            context: MachineContext::new(),
            rearm: Cell::new(stackful),
            host: Cell::new(ptr::null()),
            entry: entry.map(|(stack, start)| Entry {
                stack,
                start: UnsafeCell::new(start),
            }),
            observer,
        });
        if let Some(observer) = &inner.observer {
            observer.allocated();
        }
        Self { inner }
    }

    /// Suspends `self` and enters `next`, recording `self` as the caller of
    /// `next` so that `next` can [`suspend`](Coro::suspend) or
    /// [`finish`](Coro::finish) back to it.
    ///
    /// Returns once some context transfers back to `self`.
    pub fn call(&self, next: &Coro) {
        next.set_caller(self);
        self.switch_to(&next.inner);
    }

    /// Suspends `self` and enters `next` without changing the caller of
    /// `next`.
    ///
    /// `next` can only [`suspend`](Coro::suspend) or
    /// [`finish`](Coro::finish) if something [`call`](Coro::call)ed it
    /// earlier, and then it returns to that caller rather than to `self`.
    ///
    /// Returns once some context transfers back to `self`.
    pub fn yield_to(&self, next: &Coro) {
        self.switch_to(&next.inner);
    }

    /// Suspends `self` and resumes its caller.
    ///
    /// Returns once some context transfers back to `self`. Aborts the
    /// process if `self` has never been [`call`](Coro::call)ed.
    pub fn suspend(&self) {
        let caller = self.caller_inner();
        self.switch_to(caller);
    }

    /// Resumes the caller of `self` and resets `self`, so that the next
    /// transfer into it runs its start function again from the top.
    ///
    /// For a coroutine with a start function this never returns: locals of
    /// the current invocation are abandoned without being dropped. On a bare
    /// coroutine it behaves exactly like [`suspend`](Coro::suspend).
    ///
    /// Aborts the process if `self` has never been [`call`](Coro::call)ed.
    pub fn finish(&self) {
        let caller = self.caller_inner();
        self.inner.rearm.set(self.inner.entry.is_some());
        self.switch_to(caller);
    }

    /// Calls into `self` from a temporary bare coroutine, which is released
    /// once control comes back.
    ///
    /// The temporary coroutine stays alive as the caller of `self` until the
    /// next [`call`](Coro::call) into `self` replaces it.
    pub fn run(&self) {
        let anchor = Self::from_parts(None, self.inner.observer.clone());
        anchor.call(self);
    }

    /// Estimates how many bytes of stack `self` has left.
    ///
    /// When called from the coroutine itself this measures from the current
    /// call depth, otherwise from where it last suspended. Returns `None` for
    /// bare coroutines and where the suspension point can't be determined.
    /// This is a debugging aid only.
    pub fn stack_remaining(&self) -> Option<usize> {
        let entry = self.inner.entry.as_ref()?;
        let stack = &*entry.stack;
        if self.inner.rearm.get() {
            return Some(stack.size());
        }

        let here = util::current_stack_address();
        let sp = if stack.contains(here) {
            here
        } else {
            self.inner.context.stack_pointer()?
        };

        if util::stack_grows_down() {
            sp.checked_sub(stack.limit().get())
        } else {
            stack.base().get().checked_sub(sp)
        }
    }

    /// Returns the coroutine that [`suspend`](Coro::suspend) and
    /// [`finish`](Coro::finish) would transfer to.
    pub fn caller(&self) -> Option<Coro> {
        let caller = self.inner.caller.take();
        let ret = caller.clone();
        self.inner.caller.set(caller);
        ret
    }

    /// Whether this coroutine was created without a start function.
    pub fn is_bare(&self) -> bool {
        self.inner.entry.is_none()
    }

    /// Size of the coroutine's stack, or `None` for a bare coroutine.
    pub fn stack_size(&self) -> Option<usize> {
        self.inner.entry.as_ref().map(|entry| entry.stack.size())
    }

    /// Number of strong references to this coroutine, including caller links
    /// held by other coroutines.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    /// Whether both handles refer to the same coroutine.
    pub fn ptr_eq(this: &Coro, other: &Coro) -> bool {
        Rc::ptr_eq(&this.inner, &other.inner)
    }

    /// Replaces the caller link of `self`, leaving it untouched if it already
    /// refers to `caller`.
    fn set_caller(&self, caller: &Coro) {
        let old = self.inner.caller.take();
        match old {
            Some(old) if Coro::ptr_eq(&old, caller) => self.inner.caller.set(Some(old)),
            old => {
                self.inner.caller.set(Some(caller.clone()));
                drop(old);
            }
        }
    }

    /// Looks up the caller without touching its reference count. Nothing that
    /// holds a count may stay on a stack across a switch: the switch may never
    /// return.
    fn caller_inner(&self) -> &Inner {
        let caller = self.inner.caller.take();
        let ptr = caller.as_ref().map(|caller| Rc::as_ptr(&caller.inner));
        self.inner.caller.set(caller);
        match ptr {
            // The caller link keeps the caller alive for as long as it isn't
            // replaced, which can only happen after we've switched away.
            Some(ptr) => unsafe { &*ptr },
            None => fatal::no_caller(),
        }
    }

    fn switch_to(&self, next: &Inner) {
        let running = RUNNING.with(Cell::get);
        let next_ptr = next as *const Inner;
        if next.entry.is_some() && running == next_ptr && !ptr::eq(&*self.inner, next) {
            fatal::undefined_target();
        }

        if next.rearm.replace(false) {
            next.arm();
        }
        if !next.context.is_resumable() {
            fatal::undefined_target();
        }

        self.inner.host.set(running);
        let resumed = if next.entry.is_some() {
            next_ptr
        } else {
            next.host.get()
        };
        RUNNING.with(|r| r.set(resumed));

        unsafe {
            arch::swap_context(&self.inner.context, &next.context);
        }
    }
}

impl Inner {
    /// Points the machine context at the entry trampoline on a fresh stack.
    fn arm(&self) {
        if let Some(entry) = &self.entry {
            unsafe {
                arch::init_context(
                    &self.context,
                    &*entry.stack,
                    coroutine_entry,
                    self as *const Inner as *const (),
                );
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if self.entry.is_some() && RUNNING.with(Cell::get) == self as *const Inner {
            fatal::released_while_running();
        }
        if let Some(observer) = &self.observer {
            observer.deallocated();
        }
    }
}

/// First Rust code executed on a coroutine stack after the architecture
/// trampoline. `arg` is the `Inner` of the coroutine being entered.
unsafe extern "C" fn coroutine_entry(arg: *const ()) -> ! {
    // Borrow a handle without taking a reference: this frame is abandoned
    // without running destructors whenever the coroutine finishes.
    let this = ManuallyDrop::new(Coro {
        inner: Rc::from_raw(arg as *const Inner),
    });
    let entry = match &this.inner.entry {
        Some(entry) => entry,
        None => fatal::undefined_target(),
    };

    // Nothing above this frame can catch a panic: the trampoline ends the
    // unwind tables.
    let start = &mut *entry.start.get();
    match panic::catch_unwind(AssertUnwindSafe(|| start(&*this))) {
        Ok(()) => fatal::start_returned(),
        Err(_) => fatal::start_unwound(),
    }
}

impl PartialEq for Coro {
    fn eq(&self, other: &Self) -> bool {
        Coro::ptr_eq(self, other)
    }
}

impl Eq for Coro {}

impl fmt::Debug for Coro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coro")
            .field("ptr", &Rc::as_ptr(&self.inner))
            .field("bare", &self.is_bare())
            .field("refs", &self.ref_count())
            .finish()
    }
}
