/// Error types for the light meter
use std::time::Duration;

/// Errors produced while decoding a raw sensor report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The leading type byte is not a sensor report.
    #[error("Unrecognized frame type 0x{0:02x}")]
    UnrecognizedFrameType(u8),

    /// The frame is shorter than a full sensor report.
    #[error("Truncated frame ({len} bytes)")]
    Truncated {
        /// Number of bytes received.
        len: usize,
    },
}

/// Errors raised by a [`Device`](crate::bluetooth::Device) implementation.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Bluetooth stack error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] bluer::Error),

    /// No matching light meter was discovered before the timeout.
    #[error("No light meter named '{0}' found")]
    NotFound(String),

    /// The configured MAC address could not be parsed.
    #[error("Invalid MAC address '{0}'")]
    InvalidAddress(String),

    /// The device did not become connected in time.
    #[error("Failed to connect to {0}")]
    ConnectFailed(String),

    /// The expected GATT service or characteristic is missing.
    #[error("Missing GATT {0}")]
    MissingCharacteristic(&'static str),

    /// A read did not complete in time.
    #[error("Device read timed out after {0:?}")]
    Timeout(Duration),

    /// The device was already closed.
    #[error("Device closed")]
    Closed,
}

/// Errors terminating the acquisition loop.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    /// Transport failure, never retried by the loop.
    #[error("Device failure: {0}")]
    Device(#[from] DeviceError),

    /// Too many consecutive undecodable reports.
    #[error("{count} consecutive undecodable frames, last: {last}")]
    PersistentDecodeFailure {
        /// Number of consecutive failures.
        count: u32,
        /// The most recent decode error.
        last: DecodeError,
    },
}

/// Invalid configuration value.
#[derive(Debug, thiserror::Error)]
#[error("Invalid value '{value}' for {key}: {reason}")]
pub struct ConfigError {
    /// Environment variable name.
    pub key: &'static str,
    /// The rejected value.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}
