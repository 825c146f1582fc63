//! Shared access to one session's search index from several threads

use std::thread;

use fbsp::device::{SimulatedSensor, SimulatedSensorConfig, SyntheticFinger};
use fbsp::template::Purpose;
use fbsp::{EngineContext, SecurityLevel, Template, UserId};

const USERS: u32 = 16;

fn enrolled() -> (EngineContext<SimulatedSensor>, Vec<Template>) {
    let mut ctx = EngineContext::new(SimulatedSensor::new(SimulatedSensorConfig::default()));
    ctx.open().unwrap();
    ctx.initialize().unwrap();

    let mut probes = Vec::new();
    for user in 1..=USERS {
        let finger = SyntheticFinger::new(u64::from(user) * 97);
        ctx.driver_mut().present(finger);
        let enrolled = ctx.capture(Purpose::Enroll, 5).unwrap().handle;
        ctx.insert(UserId(user), &Template::Handle(enrolled)).unwrap();

        ctx.driver_mut().present(finger);
        let probe = ctx.capture(Purpose::Identify, 5).unwrap().handle;
        probes.push(Template::Text(ctx.create_template(probe, b"").unwrap()));
    }
    (ctx, probes)
}

#[test]
fn concurrent_identification_agrees() {
    let (ctx, probes) = enrolled();
    let search = ctx.search().unwrap();

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for (i, probe) in probes.iter().enumerate() {
                    let result = search.identify(probe, SecurityLevel::NORMAL).unwrap();
                    assert_eq!(result.user_id(), Some(UserId(i as u32 + 1)));
                }
            });
        }
    });
}

#[test]
fn readers_and_writers_interleave_safely() {
    let (ctx, probes) = enrolled();
    let search = ctx.search().unwrap();
    let extra = &probes[0];

    thread::scope(|s| {
        s.spawn(|| {
            for round in 0..20u32 {
                let user = UserId(1_000 + round);
                search.insert(user, extra).unwrap();
                assert!(search.remove(user));
            }
        });
        for _ in 0..3 {
            s.spawn(|| {
                for (i, probe) in probes.iter().enumerate().skip(1) {
                    let result = search.identify(probe, SecurityLevel::NORMAL).unwrap();
                    assert_eq!(result.user_id(), Some(UserId(i as u32 + 1)));
                }
            });
        }
    });

    assert_eq!(search.stats().users, USERS as usize);
}

#[test]
fn search_engine_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<fbsp::SearchEngine>();
}
