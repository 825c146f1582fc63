use std::error::Error;

use fbsp::device::{SimulatedSensor, SimulatedSensorConfig, SyntheticFinger};
use fbsp::template::Purpose;
use fbsp::{BspConfig, EngineContext, Identification, Template, UserId};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Enroll a few simulated fingers, persist the index, reload it and run
/// identification and verification against it.
///
/// Usage: `fbsp-demo [config.yaml]`
fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => BspConfig::from_file(path)?,
        None => BspConfig::default(),
    };
    let timeout = config.device.capture_timeout_secs;

    let sensor = SimulatedSensor::new(SimulatedSensorConfig::default());
    let mut ctx = EngineContext::with_config(sensor, config)?;
    let device = ctx.open()?;
    info!(
        name = %device.name,
        width = device.image_width,
        height = device.image_height,
        "opened"
    );
    ctx.initialize()?;

    let mut enrolled = Vec::new();
    for (user, finger) in [(1u32, 101u64), (2, 202), (3, 303)] {
        ctx.driver_mut().present(SyntheticFinger::new(finger));
        let payload = format!("user-{user}");
        let text = ctx.capture_with_payload(Purpose::Enroll, timeout, payload.as_bytes())?;
        ctx.insert(UserId(user), &Template::Text(text.clone()))?;
        enrolled.push((user, finger, text));
    }
    info!(stats = ?ctx.stats()?, "enrolled");

    let db_path = std::env::temp_dir().join(format!("fbsp-demo-{}.fbdb", std::process::id()));
    ctx.save(&db_path)?;
    ctx.terminate()?;
    ctx.initialize()?;
    ctx.load(&db_path)?;
    info!(path = %db_path.display(), stats = ?ctx.stats()?, "reloaded");

    let level = ctx.default_identify_level();
    for (user, finger, text) in &enrolled {
        ctx.driver_mut().present(SyntheticFinger::new(*finger));
        match ctx.capture_and_identify(level, timeout)? {
            Identification::Found { user_id, score } => {
                println!("finger {finger}: identified as user {user_id} (score {score})")
            }
            Identification::NotFound => println!("finger {finger}: not identified"),
        }

        ctx.driver_mut().present(SyntheticFinger::new(*finger));
        let result = ctx.capture_and_verify(&Template::Text(text.clone()), timeout)?;
        println!(
            "finger {finger}: verify against user {user} -> matched={} payload={:?}",
            result.matched,
            String::from_utf8_lossy(&result.payload)
        );
    }

    ctx.driver_mut().present(SyntheticFinger::new(999));
    let stranger = ctx.capture_and_identify(level, timeout)?;
    println!("unknown finger: {stranger:?}");

    ctx.terminate()?;
    ctx.close();
    std::fs::remove_file(&db_path)?;
    Ok(())
}
