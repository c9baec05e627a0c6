//! Bench configuration.
//!
//! One JSON document describes every GPIO line and the serial buses of a
//! setup. Each section validates itself; [`HardwareConfig::validate`]
//! adds the checks that span sections.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::gpio::digital::{ButtonConfig, RelayConfig};
use crate::gpio::pwm::PwmConfig;
use crate::gpio::Backend;
use crate::rs485::{ModbusSerialConnectionConfig, SerialConnectionConfig};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub relays: Vec<RelayConfig>,
    pub buttons: Vec<ButtonConfig>,
    pub pwms: Vec<PwmConfig>,
    /// Plain serial bus (Erstevak gauges).
    pub serial: Option<SerialConnectionConfig>,
    /// Modbus bus (QTM, VFD).
    pub modbus: Option<ModbusSerialConnectionConfig>,
}

impl HardwareConfig {
    /// Parse and validate.
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(text).map_err(|e| {
            log::warn!("config: {e}");
            ConfigError::Parse
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|_| ConfigError::Parse.into())
    }

    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        for r in &self.relays {
            r.validate()?;
        }
        for b in &self.buttons {
            b.validate()?;
        }
        for p in &self.pwms {
            p.validate()?;
        }
        if let Some(s) = &self.serial {
            s.validate()?;
        }
        if let Some(m) = &self.modbus {
            m.validate()?;
        }

        // A BCM line can only be claimed once.
        let mut lines: Vec<u8> = self
            .relays
            .iter()
            .map(|r| r.pin_number)
            .chain(self.buttons.iter().map(|b| b.pin_number))
            .chain(
                self.pwms
                    .iter()
                    .filter(|p| p.backend != Backend::RpiHardwarePwm)
                    .map(|p| p.pin_number),
            )
            .collect();
        lines.sort_unstable();
        if lines.windows(2).any(|w| w[0] == w[1]) {
            return Err(ConfigError::ValidationFailed("GPIO pin used more than once"));
        }

        let mut channels: Vec<(u8, u8)> = self
            .pwms
            .iter()
            .filter(|p| p.backend == Backend::RpiHardwarePwm)
            .map(|p| (p.chip, p.channel))
            .collect();
        channels.sort_unstable();
        if channels.windows(2).any(|w| w[0] == w[1]) {
            return Err(ConfigError::ValidationFailed("hardware PWM channel used more than once"));
        }

        if let (Some(s), Some(m)) = (&self.serial, &self.modbus) {
            if s.port == m.port {
                return Err(ConfigError::ValidationFailed(
                    "serial and modbus buses share a port",
                ));
            }
        }
        Ok(())
    }
}
