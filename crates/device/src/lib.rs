//! # FBSP Device
//!
//! The boundary between the engine and a physical fingerprint sensor.
//!
//! A [`SensorDriver`] enumerates and opens one unit, reports its image
//! geometry, and performs blocking captures that return both the raw 8-bit
//! grayscale image and the feature record extracted by the vendor firmware.
//! Capture is synchronous: the call returns once a finger was read, the
//! device faulted, or the timeout elapsed. There is no callback registration
//! and no mid-capture cancellation.
//!
//! [`SimulatedSensor`] is a deterministic stand-in used by tests, benches and
//! the demo binary.

mod error;
mod simulated;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use template::{FirRecord, Purpose};

pub use crate::error::{CaptureError, DeviceError};
pub use crate::simulated::{SimulatedSensor, SimulatedSensorConfig, SyntheticFinger};

/// Geometry and identity of an opened unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: u16,
    pub name: String,
    pub image_width: u16,
    pub image_height: u16,
}

/// Parameters of one capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Must equal the opened device's image width.
    pub width: u16,
    /// Must equal the opened device's image height.
    pub height: u16,
    pub purpose: Purpose,
    pub timeout: Duration,
}

impl CaptureRequest {
    /// Request sized for `info` with a timeout in whole seconds.
    pub fn for_device(info: &DeviceInfo, purpose: Purpose, timeout_secs: u64) -> Self {
        Self {
            width: info.image_width,
            height: info.image_height,
            purpose,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Check the request against the opened device.
    pub fn validate(&self, info: &DeviceInfo) -> Result<(), CaptureError> {
        if self.width != info.image_width || self.height != info.image_height {
            return Err(CaptureError::InvalidParameters(format!(
                "requested {}x{} but device reports {}x{}",
                self.width, self.height, info.image_width, info.image_height
            )));
        }
        if self.timeout.is_zero() {
            return Err(CaptureError::InvalidParameters(
                "timeout must be at least one second".into(),
            ));
        }
        Ok(())
    }
}

/// Result of a completed capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCapture {
    /// Row-major 8-bit grayscale pixels, `width * height` bytes.
    pub image: Vec<u8>,
    pub record: FirRecord,
}

/// A fingerprint sensor driver.
///
/// Implementations are bound to a single unit and are not safe for
/// concurrent use; callers serialize access (the engine context owns its
/// driver exclusively).
pub trait SensorDriver: Send {
    /// Initialize the driver and open the first available unit.
    fn open(&mut self) -> Result<DeviceInfo, DeviceError>;

    /// Close the unit. Closing an unopened driver does nothing.
    fn close(&mut self);

    /// Block until a sample is read, the device fails, or the timeout elapses.
    ///
    /// Test doubles such as [`SimulatedSensor`] may report `Timeout` at once
    /// when nothing is presented instead of waiting out the timeout.
    fn capture(&mut self, request: &CaptureRequest) -> Result<RawCapture, CaptureError>;
}

impl<D: SensorDriver + ?Sized> SensorDriver for Box<D> {
    fn open(&mut self) -> Result<DeviceInfo, DeviceError> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn capture(&mut self, request: &CaptureRequest) -> Result<RawCapture, CaptureError> {
        (**self).capture(request)
    }
}
