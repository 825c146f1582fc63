use std::hint::black_box;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use fbsp::device::{SimulatedSensor, SimulatedSensorConfig, SyntheticFinger};
use fbsp::template::Purpose;
use fbsp::{EngineContext, SecurityLevel, Template, UserId};

const USERS: u32 = 200;

fn ready() -> EngineContext<SimulatedSensor> {
    let mut ctx = EngineContext::new(SimulatedSensor::new(SimulatedSensorConfig::default()));
    ctx.open().expect("open");
    ctx.initialize().expect("initialize");
    ctx
}

fn enrolled(users: u32) -> EngineContext<SimulatedSensor> {
    let mut ctx = ready();
    for user in 0..users {
        ctx.driver_mut().present(SyntheticFinger::new(u64::from(user)));
        let handle = ctx.capture(Purpose::Enroll, 5).expect("capture").handle;
        ctx.insert(UserId(user), &Template::Handle(handle))
            .expect("insert");
        ctx.release(handle);
    }
    ctx
}

fn capture_bench(c: &mut Criterion) {
    let mut ctx = ready();
    c.bench_function("capture_and_encode", |b| {
        b.iter(|| {
            ctx.driver_mut().present(SyntheticFinger::new(7));
            let text = ctx
                .capture_with_payload(Purpose::Enroll, 5, b"bench")
                .expect("capture");
            black_box(text);
        });
    });
}

fn enroll_bench(c: &mut Criterion) {
    c.bench_function("enroll_into_fresh_index", |b| {
        b.iter_batched(
            ready,
            |mut ctx| {
                ctx.driver_mut().present(SyntheticFinger::new(11));
                let handle = ctx.capture(Purpose::Enroll, 5).expect("capture").handle;
                ctx.insert(UserId(11), &Template::Handle(handle))
                    .expect("insert");
                black_box(ctx);
            },
            BatchSize::SmallInput,
        );
    });
}

fn identify_bench(c: &mut Criterion) {
    let mut ctx = enrolled(USERS);
    let level = SecurityLevel::NORMAL;

    c.bench_function("capture_and_identify_200_users", |b| {
        b.iter(|| {
            ctx.driver_mut().present(SyntheticFinger::new(u64::from(USERS / 2)));
            let result = ctx.capture_and_identify(level, 5).expect("identify");
            black_box(result);
        });
    });

    c.bench_function("capture_and_identify_unknown_200_users", |b| {
        b.iter(|| {
            ctx.driver_mut().present(SyntheticFinger::new(u64::from(USERS) * 10));
            let result = ctx.capture_and_identify(level, 5).expect("identify");
            black_box(result);
        });
    });
}

criterion_group!(benches, capture_bench, enroll_bench, identify_bench);
criterion_main!(benches);
