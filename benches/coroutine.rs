use coro::{Builder, Coro};
use criterion::measurement::Measurement;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn coroutine_switch<M: Measurement + 'static>(name: &str, c: &mut Criterion<M>) {
    let main = Coro::bare();
    let identity = Coro::new(|co| loop {
        co.suspend()
    });

    c.bench_function(name, |b| b.iter(|| main.call(black_box(&identity))));
}

fn coroutine_run<M: Measurement + 'static>(name: &str, c: &mut Criterion<M>) {
    // Each run also allocates and releases a bare anchor.
    let identity = Coro::new(|co| loop {
        co.suspend()
    });

    c.bench_function(name, |b| b.iter(|| black_box(&identity).run()));
}

fn coroutine_create<M: Measurement + 'static>(name: &str, c: &mut Criterion<M>) {
    let builder = Builder::new().stack_size(16 * 1024);

    c.bench_function(name, move |b| {
        b.iter(|| {
            let co = builder.clone().build(|co| co.finish()).unwrap();
            co.run();
            co
        })
    });
}

fn coroutine_switch_time(c: &mut Criterion) {
    coroutine_switch("coroutine_switch_time", c);
}
fn coroutine_run_time(c: &mut Criterion) {
    coroutine_run("coroutine_run_time", c);
}
fn coroutine_create_time(c: &mut Criterion) {
    coroutine_create("coroutine_create_time", c);
}

criterion_group!(
    name = time;
    config = Criterion::default();
    targets = coroutine_switch_time, coroutine_run_time, coroutine_create_time
);

cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
        use criterion_cycles_per_byte::CyclesPerByte;

        fn coroutine_switch_cycles(c: &mut Criterion<CyclesPerByte>) {
            coroutine_switch("coroutine_switch_cycles", c);
        }
        fn coroutine_run_cycles(c: &mut Criterion<CyclesPerByte>) {
            coroutine_run("coroutine_run_cycles", c);
        }

        criterion_group!(
            name = cycles;
            config = Criterion::default().with_measurement(CyclesPerByte);
            targets = coroutine_switch_cycles, coroutine_run_cycles
        );

        criterion_main!(cycles, time);
    } else {
        criterion_main!(time);
    }
}
