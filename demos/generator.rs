//! A typed generator built on top of `Coro`: the coroutine hands each value
//! to its caller through a shared slot and suspends.

use std::cell::Cell;
use std::rc::Rc;

use coro::Coro;

struct Generator<T> {
    co: Coro,
    slot: Rc<Cell<Option<T>>>,
    done: Rc<Cell<bool>>,
}

struct Yielder<'a, T> {
    co: &'a Coro,
    slot: &'a Cell<Option<T>>,
}

impl<T> Yielder<'_, T> {
    fn yield_(&self, value: T) {
        self.slot.set(Some(value));
        self.co.suspend();
    }
}

impl<T: 'static> Generator<T> {
    fn new<F>(mut body: F) -> Self
    where
        F: FnMut(&Yielder<'_, T>) + 'static,
    {
        let slot = Rc::new(Cell::new(None));
        let done = Rc::new(Cell::new(false));
        let (slot2, done2) = (slot.clone(), done.clone());
        let co = Coro::new(move |co| {
            body(&Yielder { co, slot: &slot2 });
            done2.set(true);
            co.finish();
        });
        Self { co, slot, done }
    }
}

impl<T> Iterator for Generator<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.done.get() {
            return None;
        }
        self.co.run();
        self.slot.take()
    }
}

fn main() {
    let squares = Generator::new(|y| {
        for i in 1..=5u32 {
            println!("[generator] producing {}", i * i);
            y.yield_(i * i);
        }
    });
    let collected: Vec<u32> = squares.collect();
    println!("[main] got {:?}", collected);
    assert_eq!(collected, [1, 4, 9, 16, 25]);

    let words = Generator::new(|y| {
        for word in "the quick brown fox".split(' ') {
            y.yield_(word.to_uppercase());
        }
    });
    let words: Vec<String> = words.take(2).collect();
    println!("[main] got {:?}", words);
    assert_eq!(words, ["THE", "QUICK"]);
}

#[test]
fn generator() {
    main()
}
