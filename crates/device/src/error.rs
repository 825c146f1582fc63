use thiserror::Error;

/// Failures while enumerating or opening a sensor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceError {
    #[error("no fingerprint sensor found")]
    NotFound,
    #[error("sensor driver failed to initialize: {0}")]
    InitFailed(String),
    #[error("cannot open sensor: {0}")]
    OpenFailed(String),
}

/// Failures of a single capture.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CaptureError {
    #[error("no finger presented within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("sensor hardware fault: {0}")]
    HardwareFault(String),
    #[error("invalid capture parameters: {0}")]
    InvalidParameters(String),
    #[error("sensor is not open")]
    NotOpen,
}
