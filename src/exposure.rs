/// Exposure equivalence: lux to aperture / shutter / ISO
///
/// Exposure values are on a log2 scale, `EV = log2(Av² / Tv)` at ISO 100,
/// with incident light `EV = log2(lux / 2.5)`. Computed settings are snapped
/// to the nearest entry of the standard full-stop tables.
use std::fmt;
use std::str::FromStr;

/// EV reported for lux readings that cannot be converted (zero, over range)
pub const EV_OUT_OF_RANGE: f64 = -100.0;

/// Incident light meter calibration constant
const CALIBRATION: f64 = 2.5;

pub const APERTURES: [&str; 11] = [
    "1", "1.4", "2", "2.8", "4", "5.6", "8", "11", "16", "22", "32",
];

pub const SHUTTER_SPEEDS: [&str; 19] = [
    "30", "15", "8", "4", "2", "1", "1/2", "1/4", "1/8", "1/15", "1/30", "1/60", "1/125",
    "1/250", "1/500", "1/1000", "1/2000", "1/4000", "1/8000",
];

pub const ISO_SPEEDS: [&str; 7] = ["100", "200", "400", "800", "1600", "3200", "6400"];

/// EV at ISO 100 for an illuminance in lux
pub fn ev_from_lux(lux: f64) -> f64 {
    if lux <= 0.0 {
        return EV_OUT_OF_RANGE;
    }
    (lux / CALIBRATION).log2()
}

/// EV of an aperture / shutter time pair
pub fn ev(av: f64, tv: f64) -> f64 {
    (av.powi(2) / tv).log2()
}

/// Parse a table entry, `1/125` meaning 1/125 s
pub fn parse_setting(value: &str) -> Option<f64> {
    match value.strip_prefix("1/") {
        Some(denominator) => denominator.parse::<f64>().ok().map(|d| 1.0 / d),
        None => value.parse().ok(),
    }
}

/// Table entry closest to `value`, first entry wins on ties
pub fn nearest(value: f64, table: &'static [&'static str]) -> &'static str {
    let mut best = table[0];
    let mut best_diff = f64::INFINITY;
    for &entry in table {
        if let Some(parsed) = parse_setting(entry) {
            let diff = (parsed - value).abs();
            if diff < best_diff {
                best = entry;
                best_diff = diff;
            }
        }
    }
    best
}

/// Which light reading drives the calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeteringMode {
    /// Mean over the rolling window
    #[default]
    Ambient,
    /// Peak over the rolling window, for flash
    Flash,
}

impl MeteringMode {
    pub fn lux(self, med_lux: f64, max_lux: f64) -> f64 {
        match self {
            MeteringMode::Ambient => med_lux,
            MeteringMode::Flash => max_lux,
        }
    }
}

impl FromStr for MeteringMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ambient" | "normal" => Ok(MeteringMode::Ambient),
            "flash" => Ok(MeteringMode::Flash),
            _ => Err("expected ambient or flash".to_string()),
        }
    }
}

/// The setting to compute from the other two
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Solve {
    Aperture,
    #[default]
    Shutter,
    Iso,
}

impl FromStr for Solve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "av" | "aperture" => Ok(Solve::Aperture),
            "tv" | "shutter" => Ok(Solve::Shutter),
            "iso" => Ok(Solve::Iso),
            _ => Err("expected av, tv or iso".to_string()),
        }
    }
}

/// Aperture (f-number), shutter time in seconds and ISO speed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exposure {
    pub av: f64,
    pub tv: f64,
    pub iso: f64,
}

/// Snapped result of [`solve`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    pub solved: Solve,
    /// Table entry, e.g. `1/125`
    pub setting: &'static str,
    /// Continuous value before snapping
    pub exact: f64,
    /// ISO 100 EV of the snapped settings
    pub ev: f64,
    /// `ev` minus the metered EV
    pub residual: f64,
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.solved {
            Solve::Aperture => write!(f, "f/{}", self.setting)?,
            Solve::Shutter => write!(f, "{} s", self.setting)?,
            Solve::Iso => write!(f, "{} ISO", self.setting)?,
        }
        write!(f, " (Ev={:.1})", self.ev)
    }
}

/// Solve for the missing setting given the metered EV at ISO 100
///
/// The field of `known` matching `target` is ignored.
pub fn solve(metered_ev: f64, known: Exposure, target: Solve) -> Solution {
    let iso_shift = (known.iso / 100.0).log2();
    let light = 2f64.powf(metered_ev + iso_shift);

    let (setting, exact) = match target {
        Solve::Shutter => {
            let tv = known.av.powi(2) / light;
            (nearest(tv, &SHUTTER_SPEEDS), tv)
        }
        Solve::Aperture => {
            let av = (light * known.tv).sqrt();
            (nearest(av, &APERTURES), av)
        }
        Solve::Iso => {
            let iso = 2f64.powf(ev(known.av, known.tv) - metered_ev) * 100.0;
            (nearest(iso, &ISO_SPEEDS), iso)
        }
    };

    // Table entries always parse
    let snapped = parse_setting(setting).unwrap_or(exact);
    let effective = match target {
        Solve::Shutter => ev(known.av, snapped) - iso_shift,
        Solve::Aperture => ev(snapped, known.tv) - iso_shift,
        Solve::Iso => ev(known.av, known.tv) - (snapped / 100.0).log2(),
    };

    Solution {
        solved: target,
        setting,
        exact,
        ev: effective,
        residual: effective - metered_ev,
    }
}
