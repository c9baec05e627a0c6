//! GPIO device factories.
//!
//! Config structs describe a pin; the `get_*` functions turn them into
//! something that implements the `embedded-hal` traits.  Relays and
//! actuators take any such pin, so boards with a real HAL pass their
//! own pins in directly and skip these factories.

pub mod digital;
pub mod mock;
pub mod pwm;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BackendName, GpioError};

pub use digital::{ButtonConfig, DigitalInput, Edge, RelayConfig, get_button, get_relay};
pub use mock::{MockInputPin, MockOutputPin, MockPwmPin};
pub use pwm::{HardwarePwm, HwPwm, PwmConfig, PwmDevice, StubHardwarePwm, SysfsPwm, get_pwm};

/// Driver library a pin is created with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Backend {
    /// Generic pins; with `emulation` set they are in-memory mock pins.
    #[default]
    Gpiozero,
    /// Kernel PWM channels under `/sys/class/pwm`.
    RpiHardwarePwm,
    /// libgpiod character device.
    Gpiod,
    Other(String),
}

impl Backend {
    /// Name used in config files and error messages.
    pub fn name(&self) -> &str {
        match self {
            Self::Gpiozero => "gpiozero",
            Self::RpiHardwarePwm => "rpi_hardware_pwm",
            Self::Gpiod => "gpiod",
            Self::Other(s) => s,
        }
    }

    /// Error for a backend that cannot create pins here.
    pub fn unsupported(&self) -> GpioError {
        match self {
            Self::Gpiozero => GpioError::Unsupported("gpiozero hardware pins"),
            Self::RpiHardwarePwm => GpioError::Unsupported("rpi_hardware_pwm"),
            Self::Gpiod => GpioError::Unsupported("gpiod"),
            Self::Other(s) => GpioError::UnknownBackend(BackendName::new(s)),
        }
    }
}

impl From<String> for Backend {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpiozero" => Self::Gpiozero,
            "rpi_hardware_pwm" => Self::RpiHardwarePwm,
            "gpiod" => Self::Gpiod,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for Backend {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

impl From<Backend> for String {
    fn from(b: Backend) -> Self {
        match b {
            Backend::Other(s) => s,
            known => known.name().to_owned(),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_roundtrip() {
        for b in [Backend::Gpiozero, Backend::RpiHardwarePwm, Backend::Gpiod] {
            assert_eq!(Backend::from(String::from(b.clone())), b);
        }
        assert_eq!(
            Backend::from("some_backend"),
            Backend::Other("some_backend".into())
        );
        assert_eq!(Backend::from(" GPIOZERO "), Backend::Gpiozero);
    }

    #[test]
    fn unknown_backend_error_keeps_the_configured_name() {
        let err = Backend::from("lgpio").unsupported();
        assert_eq!(err, GpioError::UnknownBackend(BackendName::new("lgpio")));
        assert_eq!(err.to_string(), "unknown GPIO backend \"lgpio\"");
        assert_eq!(Backend::Gpiod.unsupported(), GpioError::Unsupported("gpiod"));
    }

    #[test]
    fn backend_serializes_as_plain_string() {
        let json = serde_json::to_string(&Backend::RpiHardwarePwm).unwrap();
        assert_eq!(json, "\"rpi_hardware_pwm\"");
        let b: Backend = serde_json::from_str("\"lgpio\"").unwrap();
        assert_eq!(b.to_string(), "lgpio");
    }
}
