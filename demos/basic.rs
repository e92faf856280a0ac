use std::cell::{Cell, RefCell};
use std::rc::Rc;

use coro::{AllocCounter, Builder, Coro};

const FIBONACCI_MAX: u64 = 20;
const ALTERNATE_MAX: u32 = 5;

fn main() {
    let counter = Rc::new(AllocCounter::new());
    let builder = Builder::new().observer(counter.clone());
    let main = builder.clone().build_bare();

    // A coroutine that finishes every time can be entered any number of
    // times, both through run and through call.
    let simple = builder
        .clone()
        .build(|co| {
            println!("[simple] running");
            co.finish();
        })
        .unwrap();
    simple.run();
    main.call(&simple);
    drop(simple);

    // Generator: each run produces the next number.
    let number = Rc::new(Cell::new(0));
    let out = number.clone();
    let fib = builder
        .clone()
        .build(move |co| {
            let (mut previous, mut current) = (0, 1);
            out.set(1);
            co.suspend();
            loop {
                out.set(current + previous);
                previous = current;
                current = out.get();
                co.suspend();
            }
        })
        .unwrap();
    while number.get() < FIBONACCI_MAX {
        fib.run();
        println!("[main] fibonacci: {}", number.get());
    }
    drop(fib);

    // Nesting: the outer coroutine drives a short-lived inner one twice
    // before suspending back to main.
    let inner_builder = builder.clone();
    let nest = builder
        .clone()
        .build(move |co| loop {
            print!("[outer] two inners: ");
            let inner = inner_builder
                .clone()
                .build(|co| {
                    print!(".");
                    co.finish();
                })
                .unwrap();
            co.call(&inner);
            inner.run();
            drop(inner);
            println!();
            println!("[outer] complete");
            co.suspend();
        })
        .unwrap();
    nest.run();
    drop(nest);

    // Two peers hand control back and forth with yield_to until one runs
    // out and yields straight back to main.
    let peers: Rc<RefCell<Vec<Coro>>> = Rc::new(RefCell::new(Vec::new()));
    let peer = move |name: &'static str, other: usize, peers: Rc<RefCell<Vec<Coro>>>| {
        move |co: &Coro| {
            let mut num = 1;
            let stack = co.stack_remaining();
            loop {
                assert_eq!(stack, co.stack_remaining(), "stack is shrinking");
                println!("[{name}] {num}");
                num += 1;
                let next = peers.borrow()[other].clone();
                co.yield_to(&next);
                drop(next);
                if num > ALTERNATE_MAX {
                    let main = peers.borrow()[2].clone();
                    co.yield_to(&main);
                    drop(main);
                    co.finish();
                }
            }
        }
    };
    let first = builder
        .clone()
        .build(peer("first", 1, peers.clone()))
        .unwrap();
    let second = builder
        .clone()
        .build(peer("second", 0, peers.clone()))
        .unwrap();
    peers
        .borrow_mut()
        .extend([first.clone(), second.clone(), main.clone()]);
    main.call(&first);
    println!("[main] peers done");

    // Both peers are still parked inside a yield_to; call each until it
    // finishes so that nothing is left on their stacks.
    main.call(&first);
    main.call(&second);
    main.call(&second);
    peers.borrow_mut().clear();
    drop((first, second));

    drop(main);
    println!(
        "[main] coroutines cleaned up ({}/{})",
        counter.deallocs(),
        counter.allocs()
    );
    assert!(counter.balanced());
}

#[test]
fn basic() {
    main()
}
