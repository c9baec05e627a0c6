//! Two-state relay driven by the switch state machine.
//!
//! ```text
//!   set_value(x) ──▶ x < 0.5 ? 0 : 1 ──changed?──▶ switch ──▶ pin
//!   switch_on()  ──▶ only from OFF ──────────────▶ switch ──▶ set_high
//!   switch_off() ──▶ only from ON  ──────────────▶ switch ──▶ set_low
//! ```
//!
//! The relay owns any `embedded-hal` output pin.  [`NoPin`] stands in
//! when only the state bookkeeping is wanted.

use core::convert::Infallible;

use embedded_hal::digital::{self, OutputPin};
use log::{Level, log};
use serde::{Deserialize, Serialize};

use crate::error::{GpioError, Result};
use crate::fsm::{Event, Flags, Machine, RELAY_TABLE, State};

pub const DEFAULT_LABEL: &str = "RELAY";
pub const GPIO_LABEL: &str = "GPIO Relay";

/// Resting state and trace level shared by relays and actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchOptions {
    pub normally_off: bool,
    pub verbose: bool,
}

impl Default for SwitchOptions {
    fn default() -> Self {
        Self {
            normally_off: true,
            verbose: false,
        }
    }
}

impl SwitchOptions {
    pub fn normally_off(mut self, normally_off: bool) -> Self {
        self.normally_off = normally_off;
        self
    }

    pub fn normally_on(mut self, normally_on: bool) -> Self {
        self.normally_off = !normally_on;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub(crate) fn level(&self) -> Level {
        if self.verbose { Level::Info } else { Level::Debug }
    }
}

/// Output that accepts every write and drives nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoPin;

impl digital::ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> core::result::Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Infallible> {
        Ok(())
    }
}

/// Upper-case, centred event tag used in transition traces.
pub(crate) fn event_tag(event: Event) -> String {
    format!("[{:^10}]", event.name().to_ascii_uppercase())
}

pub struct Relay<P = NoPin> {
    label: String,
    options: SwitchOptions,
    value: u8,
    machine: Machine,
    pin: P,
}

impl Relay<NoPin> {
    /// Relay without a pin, labelled `RELAY`.
    pub fn detached(options: SwitchOptions) -> Result<Self> {
        Self::with_label(NoPin, DEFAULT_LABEL, options)
    }
}

impl<P: OutputPin> Relay<P> {
    /// GPIO relay with default options.
    pub fn new(pin: P) -> Result<Self> {
        Self::with_label(pin, GPIO_LABEL, SwitchOptions::default())
    }

    pub fn with_options(pin: P, options: SwitchOptions) -> Result<Self> {
        Self::with_label(pin, GPIO_LABEL, options)
    }

    /// Build and initialise: the pin is driven to the resting state.
    pub fn with_label(pin: P, label: impl Into<String>, options: SwitchOptions) -> Result<Self> {
        let mut relay = Self {
            label: label.into(),
            options,
            value: 0,
            machine: Machine::new(&RELAY_TABLE),
            pin,
        };
        relay.fire(Event::Initialize)?;
        Ok(relay)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn normally_off(&self) -> bool {
        self.options.normally_off
    }

    pub fn normally_on(&self) -> bool {
        !self.options.normally_off
    }

    pub fn verbose(&self) -> bool {
        self.options.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.options.verbose = verbose;
    }

    pub fn state(&self) -> State {
        self.machine.current_state()
    }

    pub fn is_on(&self) -> bool {
        self.state() == State::On
    }

    /// 1 when on, 0 when off.
    pub fn value(&self) -> u8 {
        self.value
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }

    /// Anything below 0.5 means off.  Switches only on a change.
    pub fn set_value(&mut self, value: f64) -> Result<()> {
        let wanted = u8::from(value >= 0.5);
        if wanted != self.value {
            self.fire(Event::Switch)?;
        }
        Ok(())
    }

    pub fn switch_on(&mut self) -> Result<()> {
        if self.state() == State::Off {
            self.fire(Event::Switch)?;
        }
        Ok(())
    }

    pub fn switch_off(&mut self) -> Result<()> {
        if self.state() == State::On {
            self.fire(Event::Switch)?;
        }
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<()> {
        self.fire(Event::Switch)
    }

    fn fire(&mut self, event: Event) -> Result<()> {
        let flags = Flags {
            normally_off: self.options.normally_off,
            is_on: self.value == 1,
        };
        let level = self.options.level();
        let tag = event_tag(event);
        let label = &self.label;
        let pin = &mut self.pin;

        let transition = self.machine.send_with(event, &flags, |t| {
            log!(
                level,
                "{tag} {label} is going to {} from {} to {}",
                event.name(),
                t.source.name().to_ascii_uppercase(),
                t.target.name().to_ascii_uppercase()
            );
            match t.target {
                State::On => pin.set_high().map_err(|_| GpioError::WriteFailed)?,
                State::Off => pin.set_low().map_err(|_| GpioError::WriteFailed)?,
                State::Initialization => {}
            }
            Ok(())
        })?;

        self.value = u8::from(transition.target == State::On);
        log!(
            level,
            "{tag} {} is {}.",
            self.label,
            transition.target.name().to_ascii_uppercase()
        );
        Ok(())
    }
}
