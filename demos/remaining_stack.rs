use std::hint::black_box;

use coro::{Builder, Coro};

#[inline(never)]
fn recurse(co: &Coro, depth: usize) {
    let frame = black_box([0u8; 512]);
    if depth == 0 {
        println!(
            "[coroutine] bottom of recursion, {:?} bytes left",
            co.stack_remaining()
        );
        co.suspend();
    } else {
        recurse(co, depth - 1);
    }
    black_box(&frame);
}

fn main() {
    let co = Builder::new()
        .stack_size(64 * 1024)
        .build(|co| {
            println!("[coroutine] entry, {:?} bytes left", co.stack_remaining());
            for depth in [4, 16, 64] {
                recurse(co, depth);
            }
            co.finish();
        })
        .unwrap();

    let size = co.stack_size().unwrap();
    println!("[main] stack of {size} bytes");
    assert_eq!(co.stack_remaining(), Some(size));

    let mut last = size;
    for _ in 0..3 {
        co.run();
        // Measured at the suspension point, so deeper recursion leaves less.
        if let Some(remaining) = co.stack_remaining() {
            println!("[main] suspended with {remaining} bytes left");
            assert!(remaining < last);
            last = remaining;
        }
    }

    co.run();
    assert_eq!(co.stack_remaining(), Some(size));
    assert_eq!(Coro::bare().stack_remaining(), None);
}

#[test]
fn remaining_stack() {
    main()
}
