/// Illuminance computation from raw TSL2561 channel counts
use crate::models::{IntegrationMode, SensorState};

/// Returned when the sensor is saturated or the reading cannot be converted
pub const OVER_RANGE: f64 = -1.0;

/// Channel value reported by the sensor on overflow
const CHANNEL_OVERFLOW: u16 = 0xffff;
/// Integration time the empirical coefficients are calibrated for
const REFERENCE_MS: f64 = 402.0;
/// Low gain is 16 times less sensitive than high gain
const LOW_GAIN_SCALE: f64 = 16.0;

/// Integration time in milliseconds for a reported mode
pub fn integration_time_ms(mode: IntegrationMode, int_time: u16) -> f64 {
    match mode {
        IntegrationMode::Fast => 13.7,
        IntegrationMode::Medium => 101.0,
        IntegrationMode::Slow => 402.0,
        IntegrationMode::Custom => f64::from(int_time),
    }
}

/// Estimate illuminance in lux
///
/// Returns [`OVER_RANGE`] if either channel overflowed and `0.0` if either
/// channel reads zero. Otherwise both channels are normalized to 402 ms at
/// high gain and one of the datasheet's piecewise formulas is selected by
/// the ratio of the raw counts.
pub fn estimate(state: &SensorState, integration_time_ms: f64) -> f64 {
    if state.ch0 == CHANNEL_OVERFLOW || state.ch1 == CHANNEL_OVERFLOW {
        return OVER_RANGE;
    }
    if state.ch0 == 0 || state.ch1 == 0 {
        return 0.0;
    }
    // Custom mode with a zero integration time has no meaningful scale
    if integration_time_ms <= 0.0 {
        return OVER_RANGE;
    }

    let ratio = f64::from(state.ch1) / f64::from(state.ch0);
    let mut scale = REFERENCE_MS / integration_time_ms;
    if !state.high_gain {
        scale *= LOW_GAIN_SCALE;
    }
    let d0 = f64::from(state.ch0) * scale;
    let d1 = f64::from(state.ch1) * scale;

    if ratio < 0.5 {
        0.0304 * d0 - 0.062 * d0 * ratio.powf(1.4)
    } else if ratio < 0.61 {
        0.0224 * d0 - 0.031 * d1
    } else if ratio < 0.80 {
        0.0128 * d0 - 0.0153 * d1
    } else if ratio < 1.30 {
        0.00146 * d0 - 0.00112 * d1
    } else {
        0.0
    }
}

/// Estimate illuminance using the integration time implied by the report
pub fn lux_of(state: &SensorState) -> f64 {
    estimate(state, integration_time_ms(state.mode, state.int_time))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(ch0: u16, ch1: u16, high_gain: bool) -> SensorState {
        SensorState {
            sequence: 0,
            ch0,
            ch1,
            mode: IntegrationMode::Slow,
            high_gain,
            int_time: 0,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_integration_times() {
        assert_eq!(integration_time_ms(IntegrationMode::Fast, 999), 13.7);
        assert_eq!(integration_time_ms(IntegrationMode::Medium, 999), 101.0);
        assert_eq!(integration_time_ms(IntegrationMode::Slow, 999), 402.0);
        assert_eq!(integration_time_ms(IntegrationMode::Custom, 250), 250.0);
    }

    #[test]
    fn test_overflow_sentinel() {
        assert_eq!(estimate(&state(0xffff, 10, true), 402.0), -1.0);
        assert_eq!(estimate(&state(10, 0xffff, true), 402.0), -1.0);
        // Overflow wins over zero
        assert_eq!(estimate(&state(0xffff, 0, true), 402.0), -1.0);
    }

    #[test]
    fn test_zero_channel() {
        assert_eq!(estimate(&state(0, 10, true), 402.0), 0.0);
        assert_eq!(estimate(&state(10, 0, false), 13.7), 0.0);
    }

    #[test]
    fn test_zero_integration_time() {
        let mut s = state(100, 50, true);
        s.mode = IntegrationMode::Custom;
        assert_eq!(lux_of(&s), -1.0);
    }

    #[test]
    fn test_golden_low_gain_402ms() {
        // ratio 0.75, third branch: 0.0128 * 3200 - 0.0153 * 2400
        assert_close(lux_of(&state(200, 150, false)), 4.24);
    }

    #[test]
    fn test_branch_below_half() {
        assert_close(
            estimate(&state(100, 25, true), 402.0),
            2.149_758_774_877_297_7,
        );
    }

    #[test]
    fn test_ratio_boundaries() {
        // Each boundary belongs to the next branch up
        assert_close(estimate(&state(200, 100, true), 402.0), 1.38);
        assert_close(estimate(&state(100, 61, true), 402.0), 0.3467);
        assert_close(estimate(&state(100, 80, true), 402.0), 0.0564);
        assert_eq!(estimate(&state(100, 130, true), 402.0), 0.0);
        assert_eq!(estimate(&state(100, 400, true), 402.0), 0.0);
    }

    #[test]
    fn test_integration_time_scaling() {
        let slow = estimate(&state(200, 150, true), 402.0);
        let fast = estimate(&state(200, 150, true), 101.0);
        assert_close(fast, slow * 402.0 / 101.0);
    }

    #[test]
    fn test_finite_and_non_negative() {
        let values = [1u16, 2, 3, 7, 50, 99, 100, 101, 1000, 4999, 30000, 0xfffe];
        for &ch0 in &values {
            for &ch1 in &values {
                for high_gain in [false, true] {
                    let lux = estimate(&state(ch0, ch1, high_gain), 13.7);
                    assert!(lux.is_finite(), "ch0={} ch1={}", ch0, ch1);
                    assert!(lux >= 0.0, "ch0={} ch1={} lux={}", ch0, ch1, lux);
                }
            }
        }
    }
}
