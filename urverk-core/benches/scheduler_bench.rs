#[macro_use]
extern crate criterion;

use criterion::{BatchSize, Criterion};

use urverk_core::clock::{ClockSettings, TrustedClock, VirtualMonotonic, VirtualWallClock};
use urverk_core::domain::{DomainKind, Domains};
use urverk_core::heap::IndexedMinHeap;
use urverk_core::storage::MemoryStore;
use urverk_core::timer::{TimerLabels, TimerScheduler};

fn bench_heap_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("heap_throughput");

    for size in [128u64, 1024, 16384] {
        group.throughput(criterion::Throughput::Elements(size)); // Entries per second
        group.bench_function(format!("size_{}", size), |b| {
            b.iter(|| {
                let mut heap = IndexedMinHeap::with_capacity(size as usize);
                for id in 0..size {
                    // Scatter due times so sifting does real work.
                    heap.push(id, ((id * 7919) % size) as i64);
                }
                while heap.pop().is_some() {}
            });
        });
    }
    group.finish();
}

fn scheduler_with(timers: usize) -> TimerScheduler {
    let clock = TrustedClock::open(
        ClockSettings::default(),
        VirtualMonotonic::millis(),
        VirtualWallClock::new(0),
        MemoryStore::shared(),
    );
    let mut scheduler = TimerScheduler::new(Domains::new(clock));
    scheduler.callbacks_mut().register_fn("noop", || {});
    for i in 0..timers {
        scheduler.schedule_after(DomainKind::App, (i % 1_000) as i64, "noop", TimerLabels::none());
    }
    scheduler
}

fn bench_scheduler_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_tick");

    for timers in [1_000usize, 10_000] {
        group.throughput(criterion::Throughput::Elements(timers as u64));
        group.bench_function(format!("timers_{}", timers), |b| {
            b.iter_batched(
                || {
                    let mut scheduler = scheduler_with(timers);
                    scheduler.domains_mut().app.advance_ms(1_000);
                    scheduler
                },
                |mut scheduler| scheduler.tick(DomainKind::App, usize::MAX),
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_heap_push_pop, bench_scheduler_tick);
criterion_main!(benches);
