/// Value types shared between the acquisition loop and its consumers
use tokio::time::Instant;

/// Sensor integration time selector, as carried in the low two bits of the
/// status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegrationMode {
    /// 13.7 ms
    Fast = 0,
    /// 101 ms
    Medium = 1,
    /// 402 ms
    Slow = 2,
    /// Integration time given in milliseconds by `int_time`
    Custom = 3,
}

impl IntegrationMode {
    /// Build a mode from the low two bits of `bits`. Higher bits are ignored.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => IntegrationMode::Fast,
            1 => IntegrationMode::Medium,
            2 => IntegrationMode::Slow,
            _ => IntegrationMode::Custom,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Human readable label used in logs
    pub fn label(self) -> &'static str {
        match self {
            IntegrationMode::Fast => "13.7ms",
            IntegrationMode::Medium => "101ms",
            IntegrationMode::Slow => "402ms",
            IntegrationMode::Custom => "custom",
        }
    }
}

/// One decoded sensor report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorState {
    /// Report counter maintained by the firmware, wraps at 255
    pub sequence: u8,
    /// Broadband (visible + infrared) channel
    pub ch0: u16,
    /// Infrared channel
    pub ch1: u16,
    pub mode: IntegrationMode,
    pub high_gain: bool,
    /// Integration time in milliseconds, only meaningful in custom mode
    pub int_time: u16,
}

/// Gain and integration settings written to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub mode: IntegrationMode,
    pub high_gain: bool,
    pub int_time: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mode: IntegrationMode::Slow,
            high_gain: false,
            int_time: 500,
        }
    }
}

/// A single rung of an auto-ranging profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GainStep {
    pub high_gain: bool,
    pub mode: IntegrationMode,
}

impl GainStep {
    pub const fn new(high_gain: bool, mode: IntegrationMode) -> Self {
        GainStep { high_gain, mode }
    }

    /// Combine with the integration time of the current manual settings
    pub fn with_int_time(self, int_time: u16) -> Settings {
        Settings {
            mode: self.mode,
            high_gain: self.high_gain,
            int_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LuxSample {
    pub timestamp: Instant,
    /// Illuminance in lux, `-1.0` when the sensor is over range
    pub value: f64,
}

/// Message published by the acquisition loop once per decoded report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    pub lux: f64,
    pub max_lux: f64,
    /// Mean over the rolling window
    pub med_lux: f64,
    pub state: SensorState,
}

/// Message sent by a consumer to the acquisition loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    /// Select a profile. `settings` is only applied when `profile` is `manual`.
    Set { profile: String, settings: Settings },
}
