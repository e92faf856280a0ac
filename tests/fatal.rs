//! Misuse that aborts the process. Each scenario re-runs this test binary
//! filtered down to itself, with `CORO_FATAL_CHILD` set so that the child
//! performs the misuse instead of spawning again.

use std::cell::RefCell;
use std::env;
use std::process::Command;
use std::rc::Rc;

use coro::Coro;

const CHILD_ENV: &str = "CORO_FATAL_CHILD";

fn expect_abort(name: &str, scenario: fn(), message: &str) {
    if env::var_os(CHILD_ENV).is_some() {
        scenario();
        unreachable!("scenario returned");
    }

    let output = Command::new(env::current_exe().unwrap())
        .args([name, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, "1")
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "child exited cleanly: {stderr}");
    assert!(
        stderr.contains(message),
        "missing {message:?} in child stderr:\n{stderr}"
    );
}

#[test]
fn suspend_without_caller() {
    expect_abort(
        "suspend_without_caller",
        || {
            let main = Coro::bare();
            let co = Coro::new(|co| {
                co.suspend();
                co.finish();
            });
            main.yield_to(&co);
        },
        "no caller set",
    );
}

#[test]
fn suspend_on_bare_main() {
    expect_abort(
        "suspend_on_bare_main",
        || Coro::bare().suspend(),
        "no caller set",
    );
}

#[test]
fn start_returns() {
    expect_abort(
        "start_returns",
        || Coro::new(|_| {}).run(),
        "returned from a coroutine",
    );
}

#[test]
fn start_panics() {
    expect_abort(
        "start_panics",
        || Coro::new(|_| panic!("boom")).run(),
        "panic escaped",
    );
}

#[test]
fn transfer_to_fresh_bare() {
    expect_abort(
        "transfer_to_fresh_bare",
        || {
            let main = Coro::bare();
            let nowhere = Coro::bare();
            main.yield_to(&nowhere);
        },
        "yield to undefined coro",
    );
}

#[test]
fn call_running_coroutine() {
    expect_abort(
        "call_running_coroutine",
        || {
            let outer = Coro::new(|co| {
                let anchor = Coro::bare();
                anchor.call(co);
                co.finish();
            });
            outer.run();
        },
        "yield to undefined coro",
    );
}

#[test]
fn release_running_coroutine() {
    expect_abort(
        "release_running_coroutine",
        || {
            let helper: Rc<RefCell<Option<Coro>>> = Rc::new(RefCell::new(None));
            let helper2 = helper.clone();
            let target = Coro::new(move |co| {
                let h = helper2.borrow().clone().unwrap();
                co.call(&h);
                drop(h);
                co.suspend();
                // Back here through h's caller link, which is by now the only
                // handle to this coroutine. Calling h from elsewhere replaces
                // that link.
                helper2.borrow().as_ref().unwrap().run();
            });
            *helper.borrow_mut() = Some(Coro::new(|co| loop {
                co.suspend();
            }));

            target.run();
            drop(target);
            let h = helper.borrow().clone().unwrap();
            Coro::bare().yield_to(&h);
        },
        "released the running coro",
    );
}
