use log::{debug, info};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::acquisition::AcquisitionConfig;
use crate::bluetooth::DeviceConfig;
use crate::controller::{ProfileSelection, MANUAL_PROFILE};
use crate::error::ConfigError;
use crate::exposure::{parse_setting, Exposure, MeteringMode, Solve};
use crate::models::{Command, IntegrationMode, Settings};

/// Inputs of the exposure suggestion shown alongside each reading
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureConfig {
    pub solve: Solve,
    pub known: Exposure,
    pub metering: MeteringMode,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        ExposureConfig {
            solve: Solve::Shutter,
            known: Exposure {
                av: 8.0,
                tv: 1.0 / 125.0,
                iso: 100.0,
            },
            metering: MeteringMode::Ambient,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub acquisition: AcquisitionConfig,
    /// Profile requested once the loop is running
    pub profile: String,
    pub exposure: ExposureConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();
        Ok(Self::from_lookup(|key| env::var(key).ok())?)
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout = Duration::from_secs(parse_or(&lookup, "BLM_TIMEOUT_SECS", 10u64)?);

        let device = DeviceConfig {
            mac_address: lookup("BLM_MAC_ADDRESS")
                .map(|mac| mac.trim().to_uppercase())
                .filter(|mac| !mac.is_empty()),
            name: lookup("BLM_NAME").unwrap_or_else(|| "RFduino".to_string()),
            adapter: lookup("BLM_ADAPTER").unwrap_or_else(|| "hci0".to_string()),
            timeout,
        };
        match &device.mac_address {
            Some(mac) => info!("Light meter address: {}", mac),
            None => info!("Light meter name: {}", device.name),
        }

        let mode_bits: u8 = parse_or(&lookup, "BLM_MODE", 2u8)?;
        if mode_bits > 3 {
            return Err(invalid("BLM_MODE", mode_bits, "expected 0-3"));
        }
        let initial_settings = Settings {
            mode: IntegrationMode::from_bits(mode_bits),
            high_gain: parse_or(&lookup, "BLM_HIGH_GAIN", false)?,
            int_time: parse_or(&lookup, "BLM_INT_TIME", 500u16)?,
        };

        let max_decode_failures: u32 = parse_or(&lookup, "BLM_MAX_DECODE_FAILURES", 20u32)?;
        let acquisition = AcquisitionConfig {
            initial_settings,
            read_timeout: Some(timeout),
            // 0 disables the limit
            max_decode_failures: Some(max_decode_failures).filter(|&n| n > 0),
            ..AcquisitionConfig::default()
        };

        let profile = lookup("BLM_PROFILE").unwrap_or_else(|| MANUAL_PROFILE.to_string());
        if let ProfileSelection::Unknown(name) = ProfileSelection::lookup(&profile) {
            return Err(invalid("BLM_PROFILE", name, "expected manual, all, fast or logain"));
        }

        let exposure = ExposureConfig {
            solve: parse_or(&lookup, "BLM_SOLVE", Solve::Shutter)?,
            known: Exposure {
                av: setting_or(&lookup, "BLM_APERTURE", 8.0)?,
                tv: setting_or(&lookup, "BLM_SHUTTER", 1.0 / 125.0)?,
                iso: setting_or(&lookup, "BLM_ISO", 100.0)?,
            },
            metering: parse_or(&lookup, "BLM_METERING", MeteringMode::Ambient)?,
        };

        debug!(
            "Profile {}, initial settings {:?}, exposure {:?}",
            profile, initial_settings, exposure
        );

        Ok(AppConfig {
            device,
            acquisition,
            profile,
            exposure,
        })
    }

    /// The command selecting the configured profile and manual settings
    pub fn initial_command(&self) -> Command {
        Command::Set {
            profile: self.profile.clone(),
            settings: self.acquisition.initial_settings,
        }
    }
}

fn invalid(key: &'static str, value: impl Display, reason: &str) -> ConfigError {
    ConfigError {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
        None => Ok(default),
    }
}

/// Aperture, shutter or ISO value, shutter accepting the `1/125` form
fn setting_or<F>(lookup: &F, key: &'static str, default: f64) -> Result<f64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match parse_setting(raw.trim()) {
            Some(value) if value.is_finite() && value > 0.0 => Ok(value),
            _ => Err(invalid(key, &raw, "expected a positive number or 1/N")),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.device, DeviceConfig::default());
        assert_eq!(config.profile, "manual");
        assert_eq!(config.acquisition.initial_settings, Settings::default());
        assert_eq!(config.acquisition.max_decode_failures, Some(20));
        assert_eq!(config.acquisition.read_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.exposure, ExposureConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("BLM_MAC_ADDRESS", " aa:bb:cc:dd:ee:ff "),
            ("BLM_PROFILE", "fast"),
            ("BLM_MODE", "3"),
            ("BLM_HIGH_GAIN", "true"),
            ("BLM_INT_TIME", "250"),
            ("BLM_MAX_DECODE_FAILURES", "0"),
            ("BLM_SOLVE", "iso"),
            ("BLM_SHUTTER", "1/60"),
            ("BLM_METERING", "flash"),
        ])
        .unwrap();
        assert_eq!(config.device.mac_address.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(config.profile, "fast");
        assert_eq!(
            config.acquisition.initial_settings,
            Settings {
                mode: IntegrationMode::Custom,
                high_gain: true,
                int_time: 250,
            }
        );
        assert_eq!(config.acquisition.max_decode_failures, None);
        assert_eq!(config.exposure.solve, Solve::Iso);
        assert_eq!(config.exposure.known.tv, 1.0 / 60.0);
        assert_eq!(config.exposure.metering, MeteringMode::Flash);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert_eq!(config(&[("BLM_MODE", "4")]).unwrap_err().key, "BLM_MODE");
        assert_eq!(config(&[("BLM_PROFILE", "turbo")]).unwrap_err().key, "BLM_PROFILE");
        assert_eq!(config(&[("BLM_INT_TIME", "-5")]).unwrap_err().key, "BLM_INT_TIME");
        assert_eq!(config(&[("BLM_SHUTTER", "1/0x")]).unwrap_err().key, "BLM_SHUTTER");
        assert_eq!(config(&[("BLM_SOLVE", "zoom")]).unwrap_err().key, "BLM_SOLVE");
    }
}
