//! Deterministic synthetic sensor.
//!
//! Each synthetic finger owns a fixed set of minutiae derived from its id and
//! the sensor seed. Every capture perturbs that set slightly (position and
//! direction jitter, a few dropped points) so that two reads of the same
//! finger are close but never identical, which is what a matcher sees from
//! real hardware.

use std::collections::VecDeque;

use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64_with_seed;

use template::{FirDataType, FirRecord, Minutia, MinutiaKind};

use crate::{CaptureError, CaptureRequest, DeviceError, DeviceInfo, RawCapture, SensorDriver};

/// Pixels kept clear of minutiae along each image border.
const BORDER: u16 = 8;

/// Tunables of the simulated unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedSensorConfig {
    /// Number of enumerated units; zero simulates an unplugged sensor.
    pub units: u32,
    /// Simulate a driver that cannot initialize.
    pub fail_init: bool,
    pub device_id: u16,
    pub image_width: u16,
    pub image_height: u16,
    /// Minutiae per synthetic finger before per-capture drops.
    pub minutiae_per_finger: usize,
    /// Maximum positional jitter per capture, in pixels.
    pub jitter_px: u16,
    /// Maximum angular jitter per capture, in 1/256 turns.
    pub angle_jitter: u8,
    /// Maximum number of minutiae dropped per capture.
    pub max_dropped: usize,
    /// Emit unprocessed records with duplicated feature points.
    pub emit_raw: bool,
    pub seed: u64,
}

impl Default for SimulatedSensorConfig {
    fn default() -> Self {
        Self {
            units: 1,
            fail_init: false,
            device_id: 1,
            image_width: 260,
            image_height: 300,
            minutiae_per_finger: 36,
            jitter_px: 2,
            angle_jitter: 3,
            max_dropped: 2,
            emit_raw: false,
            seed: 0x5EED_F1A9_0000_0001,
        }
    }
}

impl SimulatedSensorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_units(mut self, units: u32) -> Self {
        self.units = units;
        self
    }

    pub fn with_fail_init(mut self, fail_init: bool) -> Self {
        self.fail_init = fail_init;
        self
    }

    pub fn with_image_size(mut self, width: u16, height: u16) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    pub fn with_minutiae_per_finger(mut self, count: usize) -> Self {
        self.minutiae_per_finger = count;
        self
    }

    pub fn with_jitter(mut self, jitter_px: u16, angle_jitter: u8) -> Self {
        self.jitter_px = jitter_px;
        self.angle_jitter = angle_jitter;
        self
    }

    pub fn with_max_dropped(mut self, max_dropped: usize) -> Self {
        self.max_dropped = max_dropped;
        self
    }

    pub fn with_emit_raw(mut self, emit_raw: bool) -> Self {
        self.emit_raw = emit_raw;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// A finger that can be placed on the simulated sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticFinger {
    pub id: u64,
    /// Reported capture quality in `0..=100`.
    pub quality: u8,
}

impl SyntheticFinger {
    pub fn new(id: u64) -> Self {
        Self { id, quality: 85 }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.min(100);
        self
    }
}

#[derive(Debug, Clone)]
enum Presentation {
    Finger(SyntheticFinger),
    Fault(String),
}

/// In-memory sensor producing reproducible captures.
///
/// Presentations are consumed in FIFO order, one per capture. A capture with
/// nothing queued times out immediately instead of blocking.
pub struct SimulatedSensor {
    cfg: SimulatedSensorConfig,
    info: Option<DeviceInfo>,
    queue: VecDeque<Presentation>,
    captures: u64,
}

impl SimulatedSensor {
    pub fn new(cfg: SimulatedSensorConfig) -> Self {
        Self {
            cfg,
            info: None,
            queue: VecDeque::new(),
            captures: 0,
        }
    }

    pub fn config(&self) -> &SimulatedSensorConfig {
        &self.cfg
    }

    /// Queue a finger for the next capture.
    pub fn present(&mut self, finger: SyntheticFinger) {
        self.queue.push_back(Presentation::Finger(finger));
    }

    /// Make the next capture fail with a hardware fault.
    pub fn inject_fault(&mut self, reason: impl Into<String>) {
        self.queue.push_back(Presentation::Fault(reason.into()));
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_open(&self) -> bool {
        self.info.is_some()
    }

    /// Total captures served since construction.
    pub fn captures(&self) -> u64 {
        self.captures
    }

    /// Minutiae a finger carries before any per-capture perturbation.
    pub fn base_minutiae(&self, finger_id: u64) -> Vec<Minutia> {
        let mut rng = SplitMix::new(xxh3_64_with_seed(&finger_id.to_le_bytes(), self.cfg.seed));
        let span_x = self.cfg.image_width.saturating_sub(2 * BORDER).max(1);
        let span_y = self.cfg.image_height.saturating_sub(2 * BORDER).max(1);

        (0..self.cfg.minutiae_per_finger)
            .map(|_| {
                let x = BORDER + (rng.next_u64() % u64::from(span_x)) as u16;
                let y = BORDER + (rng.next_u64() % u64::from(span_y)) as u16;
                let angle = rng.next_u64() as u8;
                let kind = if rng.next_u64() & 1 == 0 {
                    MinutiaKind::Ending
                } else {
                    MinutiaKind::Bifurcation
                };
                Minutia::new(x, y, angle, kind)
            })
            .collect()
    }

    fn perturbed_minutiae(&self, finger_id: u64) -> Vec<Minutia> {
        let mut rng = SplitMix::new(
            xxh3_64_with_seed(&finger_id.to_le_bytes(), self.cfg.seed)
                ^ splitmix64(self.captures),
        );
        let max_x = self.cfg.image_width.saturating_sub(1);
        let max_y = self.cfg.image_height.saturating_sub(1);

        let mut minutiae: Vec<Minutia> = self
            .base_minutiae(finger_id)
            .into_iter()
            .map(|m| Minutia {
                x: jitter_u16(m.x, self.cfg.jitter_px, &mut rng).min(max_x),
                y: jitter_u16(m.y, self.cfg.jitter_px, &mut rng).min(max_y),
                angle: jitter_angle(m.angle, self.cfg.angle_jitter, &mut rng),
                kind: m.kind,
            })
            .collect();

        let dropped = (rng.next_u64() % (self.cfg.max_dropped as u64 + 1)) as usize;
        for _ in 0..dropped.min(minutiae.len()) {
            let idx = (rng.next_u64() % minutiae.len() as u64) as usize;
            minutiae.remove(idx);
        }
        minutiae
    }

    fn render(&self, minutiae: &[Minutia]) -> Vec<u8> {
        let width = usize::from(self.cfg.image_width);
        let height = usize::from(self.cfg.image_height);
        let mut image = vec![0xFF_u8; width * height];
        for m in minutiae {
            let (cx, cy) = (usize::from(m.x), usize::from(m.y));
            for y in cy.saturating_sub(1)..=(cy + 1).min(height.saturating_sub(1)) {
                for x in cx.saturating_sub(1)..=(cx + 1).min(width.saturating_sub(1)) {
                    image[y * width + x] = 0x00;
                }
            }
        }
        image
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new(SimulatedSensorConfig::default())
    }
}

impl SensorDriver for SimulatedSensor {
    fn open(&mut self) -> Result<DeviceInfo, DeviceError> {
        if self.cfg.fail_init {
            return Err(DeviceError::InitFailed("simulated driver init failure".into()));
        }
        if self.cfg.units == 0 {
            return Err(DeviceError::NotFound);
        }
        if self.info.is_some() {
            return Err(DeviceError::OpenFailed("unit already open".into()));
        }
        let info = DeviceInfo {
            device_id: self.cfg.device_id,
            name: "simulated sensor".into(),
            image_width: self.cfg.image_width,
            image_height: self.cfg.image_height,
        };
        info!(device_id = info.device_id, "simulated sensor opened");
        self.info = Some(info.clone());
        Ok(info)
    }

    fn close(&mut self) {
        if self.info.take().is_some() {
            info!(device_id = self.cfg.device_id, "simulated sensor closed");
        }
    }

    fn capture(&mut self, request: &CaptureRequest) -> Result<RawCapture, CaptureError> {
        let info = self.info.as_ref().ok_or(CaptureError::NotOpen)?;
        request.validate(info)?;

        let presentation = self.queue.pop_front().ok_or(CaptureError::Timeout {
            timeout_secs: request.timeout.as_secs(),
        })?;
        self.captures += 1;

        let finger = match presentation {
            Presentation::Finger(finger) => finger,
            Presentation::Fault(reason) => return Err(CaptureError::HardwareFault(reason)),
        };

        let mut minutiae = self.perturbed_minutiae(finger.id);
        let image = self.render(&minutiae);

        let mut record = FirRecord::processed(
            request.purpose,
            finger.quality,
            self.cfg.image_width,
            self.cfg.image_height,
            Vec::new(),
        );
        if self.cfg.emit_raw {
            // Unfiltered output repeats every fourth point one pixel off.
            let doubled: Vec<Minutia> = minutiae
                .iter()
                .step_by(4)
                .map(|m| Minutia {
                    x: m.x.saturating_add(1),
                    ..*m
                })
                .collect();
            minutiae.extend(doubled);
            record.data_type = FirDataType::Raw;
        }
        record.minutiae = minutiae;

        debug!(
            finger = finger.id,
            purpose = ?request.purpose,
            minutiae = record.minutiae.len(),
            "simulated capture"
        );
        Ok(RawCapture { image, record })
    }
}

/// Small deterministic generator over the splitmix64 sequence.
struct SplitMix(u64);

impl SplitMix {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        splitmix64(self.0)
    }
}

#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn jitter_u16(value: u16, max: u16, rng: &mut SplitMix) -> u16 {
    if max == 0 {
        return value;
    }
    let span = u64::from(max) * 2 + 1;
    let offset = (rng.next_u64() % span) as i32 - i32::from(max);
    (i32::from(value) + offset).clamp(0, i32::from(u16::MAX)) as u16
}

fn jitter_angle(angle: u8, max: u8, rng: &mut SplitMix) -> u8 {
    if max == 0 {
        return angle;
    }
    let span = u64::from(max) * 2 + 1;
    let offset = (rng.next_u64() % span) as i16 - i16::from(max);
    angle.wrapping_add(offset as u8)
}
