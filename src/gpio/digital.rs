//! Digital inputs and outputs.

use embedded_hal::digital::InputPin;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::Backend;
use super::mock::{MockInputPin, MockOutputPin};
use crate::error::{ConfigError, GpioError, Result};

fn default_true() -> bool {
    true
}

fn default_relay_label() -> String {
    "Relay".to_owned()
}

fn default_button_label() -> String {
    "Button".to_owned()
}

// ───────────────────────────────────────────────────────────────
// Relay (digital output)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub pin_number: u8,
    #[serde(default = "default_relay_label")]
    pub label: String,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_true")]
    pub emulation: bool,
    #[serde(default = "default_true")]
    pub active_high: bool,
    #[serde(default)]
    pub initial_value: bool,
}

impl RelayConfig {
    pub fn new(pin_number: u8) -> Self {
        Self {
            pin_number,
            label: default_relay_label(),
            backend: Backend::Gpiozero,
            emulation: true,
            active_high: true,
            initial_value: false,
        }
    }

    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.pin_number > 53 {
            return Err(ConfigError::ValidationFailed("relay pin_number must be 0-53"));
        }
        Ok(())
    }
}

/// Build the output pin for a relay.
///
/// Only emulated pins can be created here; boards with real GPIO pass
/// their HAL's `OutputPin` straight to [`Relay`](crate::relay::Relay).
pub fn get_relay(relay: &RelayConfig) -> Result<MockOutputPin> {
    match &relay.backend {
        Backend::Gpiozero if relay.emulation => {
            debug!("{}: emulated output on pin {}", relay.label, relay.pin_number);
            Ok(MockOutputPin::new(
                relay.pin_number,
                relay.active_high,
                relay.initial_value,
            ))
        }
        Backend::Gpiozero => Err(Backend::Gpiozero.unsupported().into()),
        other => {
            warn!("{}: backend {other} is not available", relay.label);
            Err(other.unsupported().into())
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Button (digital input)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonConfig {
    pub pin_number: u8,
    #[serde(default = "default_button_label")]
    pub label: String,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_true")]
    pub emulation: bool,
    #[serde(default = "default_true")]
    pub pull_up: bool,
    /// Debounce window in seconds; 0 disables debouncing.
    #[serde(default)]
    pub bounce_time: f64,
}

impl ButtonConfig {
    pub fn new(pin_number: u8) -> Self {
        Self {
            pin_number,
            label: default_button_label(),
            backend: Backend::Gpiozero,
            emulation: true,
            pull_up: true,
            bounce_time: 0.0,
        }
    }

    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.pin_number > 53 {
            return Err(ConfigError::ValidationFailed("button pin_number must be 0-53"));
        }
        if !(0.0..=10.0).contains(&self.bounce_time) {
            return Err(ConfigError::ValidationFailed("bounce_time must be 0-10 s"));
        }
        Ok(())
    }

    fn bounce_ms(&self) -> u32 {
        if self.bounce_time > 0.0 {
            (self.bounce_time * 1000.0).round() as u32
        } else {
            0
        }
    }
}

pub fn get_button(button: &ButtonConfig) -> Result<DigitalInput<MockInputPin>> {
    match &button.backend {
        Backend::Gpiozero if button.emulation => {
            debug!("{}: emulated input on pin {}", button.label, button.pin_number);
            let pin = MockInputPin::new(button.pin_number, button.pull_up);
            Ok(DigitalInput::new(pin, button.pull_up, button.bounce_ms()))
        }
        Backend::Gpiozero => Err(Backend::Gpiozero.unsupported().into()),
        other => {
            warn!("{}: backend {other} is not available", button.label);
            Err(other.unsupported().into())
        }
    }
}

/// Debounced change reported by [`DigitalInput::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Activated,
    Deactivated,
}

/// Debounced digital input.
///
/// With a pull-up the input is active when the line is pulled low.
pub struct DigitalInput<I> {
    pin: I,
    pull_up: bool,
    bounce_ms: u32,
    stable: bool,
    pending_since: Option<u32>,
}

impl<I: InputPin> DigitalInput<I> {
    pub fn new(pin: I, pull_up: bool, bounce_ms: u32) -> Self {
        Self {
            pin,
            pull_up,
            bounce_ms,
            stable: false,
            pending_since: None,
        }
    }

    pub fn pin(&self) -> &I {
        &self.pin
    }

    pub fn bounce_ms(&self) -> u32 {
        self.bounce_ms
    }

    /// Undebounced active state.
    pub fn is_active_raw(&mut self) -> Result<bool> {
        let high = self.pin.is_high().map_err(|_| GpioError::ReadFailed)?;
        Ok(high != self.pull_up)
    }

    /// Last debounced state.
    pub fn is_active(&self) -> bool {
        self.stable
    }

    /// Sample the pin.  `now_ms` is a monotonic millisecond clock.
    pub fn update(&mut self, now_ms: u32) -> Result<Option<Edge>> {
        let raw = self.is_active_raw()?;
        if raw == self.stable {
            self.pending_since = None;
            return Ok(None);
        }

        let settled = match self.pending_since {
            _ if self.bounce_ms == 0 => true,
            None => {
                self.pending_since = Some(now_ms);
                false
            }
            Some(since) => now_ms.wrapping_sub(since) >= self.bounce_ms,
        };
        if !settled {
            return Ok(None);
        }

        self.stable = raw;
        self.pending_since = None;
        Ok(Some(if raw {
            Edge::Activated
        } else {
            Edge::Deactivated
        }))
    }
}
