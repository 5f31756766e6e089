/// Utility functions for formatting readings in logs
use time::{format_description, OffsetDateTime};

use crate::exposure::EV_OUT_OF_RANGE;

/// Session timestamp as `day.month.year - hh:mm:ss`, or the `Display`
/// form of the timestamp when the pattern cannot be applied
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Format a lux value, spelling out the over-range marker
pub fn format_lux(lux: f64) -> String {
    if lux < 0.0 {
        "over range".to_string()
    } else {
        format!("{:.2} lx", lux)
    }
}

/// Format an exposure value with one decimal, `--` when out of range
pub fn format_ev(ev: f64) -> String {
    if ev <= EV_OUT_OF_RANGE {
        "--".to_string()
    } else {
        format!("{:.1}", ev)
    }
}
