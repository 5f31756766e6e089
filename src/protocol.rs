/// BlueLightMeter report decoding and configuration encoding
use crate::error::DecodeError;
use crate::models::{IntegrationMode, SensorState, Settings};

/// Type byte of a sensor report
pub const SENSOR_REPORT_TAG: u8 = 0x11;
/// Length of a sensor report in bytes
pub const REPORT_LEN: usize = 9;
/// High gain flag in the status and configuration bytes
pub const HIGH_GAIN_BIT: u8 = 0x10;

/// Decode a sensor report frame
///
/// Report layout (9 bytes, multi-byte fields little-endian):
/// - Byte 0: Type tag (0x11)
/// - Byte 1: Report sequence number
/// - Bytes 2-3: Channel 0 count
/// - Bytes 4-5: Channel 1 count
/// - Byte 6: Status, bits 0-1 integration mode, bit 4 high gain
/// - Bytes 7-8: Custom integration time in milliseconds
///
/// Trailing bytes beyond the report are ignored.
pub fn decode(frame: &[u8]) -> Result<SensorState, DecodeError> {
    let tag = *frame.first().ok_or(DecodeError::Truncated { len: 0 })?;
    if tag != SENSOR_REPORT_TAG {
        return Err(DecodeError::UnrecognizedFrameType(tag));
    }
    if frame.len() < REPORT_LEN {
        return Err(DecodeError::Truncated { len: frame.len() });
    }

    let status = frame[6];
    Ok(SensorState {
        sequence: frame[1],
        ch0: u16::from_le_bytes([frame[2], frame[3]]),
        ch1: u16::from_le_bytes([frame[4], frame[5]]),
        mode: IntegrationMode::from_bits(status),
        high_gain: status & HIGH_GAIN_BIT != 0,
        int_time: u16::from_le_bytes([frame[7], frame[8]]),
    })
}

impl Settings {
    /// Encode as the 3-byte configuration write: mode byte with the gain
    /// flag, then the integration time little-endian.
    pub fn encode(&self) -> [u8; 3] {
        let mut mode = self.mode.bits();
        if self.high_gain {
            mode |= HIGH_GAIN_BIT;
        }
        let [lsb, msb] = self.int_time.to_le_bytes();
        [mode, lsb, msb]
    }
}
