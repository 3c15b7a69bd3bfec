//! Configuration loading and management.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Instrument configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Which instrument profile to run.
    pub instrument: InstrumentConfig,
    /// Identity reported by *IDN?.
    pub identity: Identity,
    /// ADC front-end settings (hall-probe profile).
    #[serde(default)]
    pub adc: AdcConfig,
}

/// Profile selection.
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    /// Profile name.
    pub profile: Profile,
}

/// The concrete instrument types this build can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Command engine plus diagnostics only.
    Diag,
    /// Three-channel LED/PWM output instrument.
    Led,
    /// Hall-probe ADC instrument with display.
    HallProbe,
}

/// Identity strings reported by *IDN?.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    /// Manufacturer field.
    pub manufacturer: String,
    /// Model field.
    pub model: String,
    /// Serial number field.
    pub serial: String,
    /// Firmware revision field.
    pub firmware: String,
}

impl Identity {
    /// The comma-joined *IDN? response.
    pub fn idn_string(&self) -> String {
        format!(
            "{},{},{},{}",
            self.manufacturer, self.model, self.serial, self.firmware
        )
    }
}

/// ADC front-end configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AdcConfig {
    /// Where the field calibration persists across restarts.
    #[serde(default = "default_calibration_path")]
    pub calibration_path: String,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            calibration_path: default_calibration_path(),
        }
    }
}

fn default_calibration_path() -> String {
    "calibration.txt".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let config: Config = toml::from_str(
            r#"
            [instrument]
            profile = "hall-probe"

            [identity]
            manufacturer = "Straylight"
            model = "HP-1220"
            serial = "0042"
            firmware = "0.3.0"
            "#,
        )
        .unwrap();
        assert_eq!(config.instrument.profile, Profile::HallProbe);
        assert_eq!(config.adc.calibration_path, "calibration.txt");
        assert_eq!(
            config.identity.idn_string(),
            "Straylight,HP-1220,0042,0.3.0"
        );
    }
}
