use criterion::{black_box, criterion_group, criterion_main, Criterion};

use surge::sched::global::{ExactPq, MultiQueue};
use surge::sched::obim::Obim;
use surge::sched::stealing::StealingMultiQueue;
use surge::sched::{Item, Worklist};

const N: u32 = 100_000;

fn drive<W: Worklist>(wl: &W) {
    for i in 0..N {
        wl.push(0, Item::new(i, u64::from(i.wrapping_mul(2_654_435_761) >> 8)));
    }
    while let Some(item) = wl.pop(0) {
        black_box(item);
    }
}

fn bench_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("sched_push_pop");
    group.sample_size(20);

    group.bench_function("obim_delta10", |b| {
        b.iter(|| drive(&Obim::<64>::new(1, 10, false)));
    });
    group.bench_function("obim_delta4", |b| {
        b.iter(|| drive(&Obim::<64>::new(1, 4, false)));
    });
    group.bench_function("smq_8_1", |b| {
        b.iter(|| drive(&StealingMultiQueue::new(1, 8, 1)));
    });
    group.bench_function("mq2", |b| {
        b.iter(|| drive(&MultiQueue::<2>::new(1, 2)));
    });
    group.bench_function("exact_pq", |b| {
        b.iter(|| drive(&ExactPq::new(1)));
    });

    group.finish();
}

criterion_group!(benches, bench_push_pop);
criterion_main!(benches);
