//! Actuators: outputs that hold a value rather than just on/off.
//!
//! ```text
//!   set_value(x) ─▶ Mode::check ─changed?─▶ change_value ─▶ output.apply
//!                                              │
//!                              value > 0 ? ON : OFF
//! ```
//!
//! An [`Actuator`] owns the state machine and the value bookkeeping.
//! What the value does to the hardware is up to its [`ActuatorOutput`]:
//! a GPIO line, a PWM pin or a hardware PWM channel.

pub mod proportional;

use embedded_hal::digital::OutputPin;
use log::log;

use crate::error::{GpioError, Result};
use crate::fsm::{ACTUATOR_TABLE, Event, Flags, Machine, State};
use crate::relay::{SwitchOptions, event_tag};

pub use proportional::{
    GpioProportionalActuator, HwPwmOutput, HwPwmProportionalActuator, PwmOutput,
};

pub const DEFAULT_LABEL: &str = "ACTUATOR";

/// Lowest PWM frequency accepted by [`Actuator::set_frequency`].
pub const MIN_FREQUENCY_HZ: f64 = 0.1;
/// Highest PWM frequency accepted by [`Actuator::set_frequency`].
pub const MAX_FREQUENCY_HZ: f64 = 20e3;

/// Value domain of an actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 0 or 1.
    TwoState,
    /// Anything in `[0, 1]`.
    Proportional,
}

impl Mode {
    /// Coerce a requested value into the domain.
    pub fn check(self, value: f64) -> f64 {
        match self {
            Self::TwoState => {
                if value >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Proportional if value.is_nan() => 0.0,
            Self::Proportional => value.clamp(0.0, 1.0),
        }
    }
}

/// Hardware side of an actuator.
pub trait ActuatorOutput {
    /// Label an actuator gets when none is given.
    const DEFAULT_LABEL: &'static str;

    fn mode(&self) -> Mode;

    /// Drive the hardware to `value`, already checked against `mode()`.
    fn apply(&mut self, value: f64, normally_on: bool) -> Result<()>;

    /// Change the PWM carrier frequency.  `hz` is already clamped.
    fn set_frequency(&mut self, hz: f64) -> Result<()> {
        let _ = hz;
        Err(GpioError::Unsupported("frequency control on this output").into())
    }
}

/// Output that only keeps the value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoOutput {
    mode: Mode,
    frequency: Option<f64>,
}

impl NoOutput {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            frequency: None,
        }
    }

    pub fn frequency(&self) -> Option<f64> {
        self.frequency
    }
}

impl ActuatorOutput for NoOutput {
    const DEFAULT_LABEL: &'static str = DEFAULT_LABEL;

    fn mode(&self) -> Mode {
        self.mode
    }

    fn apply(&mut self, _value: f64, _normally_on: bool) -> Result<()> {
        Ok(())
    }

    fn set_frequency(&mut self, hz: f64) -> Result<()> {
        self.frequency = Some(hz);
        Ok(())
    }
}

/// On/off GPIO line.  Normally-on outputs are inverted.
#[derive(Debug)]
pub struct GpioOutput<P> {
    pin: P,
}

impl<P: OutputPin> GpioOutput<P> {
    /// Takes the pin and drives it low.
    pub fn new(mut pin: P) -> Result<Self> {
        pin.set_low().map_err(|_| GpioError::WriteFailed)?;
        Ok(Self { pin })
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }
}

impl<P: OutputPin> ActuatorOutput for GpioOutput<P> {
    const DEFAULT_LABEL: &'static str = "GPIO ACTUATOR";

    fn mode(&self) -> Mode {
        Mode::TwoState
    }

    fn apply(&mut self, value: f64, normally_on: bool) -> Result<()> {
        let level = if normally_on { 1.0 - value } else { value };
        let res = if level < 0.5 {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        };
        res.map_err(|_| GpioError::WriteFailed.into())
    }
}

pub type GpioActuator<P> = Actuator<GpioOutput<P>>;

// ───────────────────────────────────────────────────────────────
// Actuator
// ───────────────────────────────────────────────────────────────

pub struct Actuator<O> {
    label: String,
    options: SwitchOptions,
    value: f64,
    stored_value: f64,
    machine: Machine,
    output: O,
}

impl Actuator<NoOutput> {
    /// Actuator without hardware, labelled `ACTUATOR`.
    pub fn detached(mode: Mode, options: SwitchOptions) -> Result<Self> {
        Self::new(NoOutput::new(mode), options)
    }
}

impl<O: ActuatorOutput> Actuator<O> {
    pub fn new(output: O, options: SwitchOptions) -> Result<Self> {
        Self::with_label(output, O::DEFAULT_LABEL, options)
    }

    /// Build and initialise.  The resting value (0, or 1 when normally on)
    /// is applied to the output before the machine leaves `Initialization`.
    pub fn with_label(output: O, label: impl Into<String>, options: SwitchOptions) -> Result<Self> {
        let value = if options.normally_off { 0.0 } else { 1.0 };
        let mut actuator = Self {
            label: label.into(),
            options,
            value,
            stored_value: value,
            machine: Machine::new(&ACTUATOR_TABLE),
            output,
        };
        actuator.fire(Event::Initialize, value)?;
        Ok(actuator)
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

    pub fn mode(&self) -> Mode {
        self.output.mode()
    }

    pub fn state(&self) -> State {
        self.machine.current_state()
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    /// Set a new value; the output is only touched when it changes.
    pub fn set_value(&mut self, value: f64) -> Result<()> {
        let value = self.mode().check(value);
        if value != self.value {
            self.fire(Event::ChangeValue, value)?;
        }
        Ok(())
    }

    /// From `Off`, restore the value held before the last `switch_off`
    /// (or full scale if there was none).
    pub fn switch_on(&mut self) -> Result<()> {
        if self.state() == State::Off {
            let value = if self.stored_value > 0.0 {
                self.stored_value
            } else {
                1.0
            };
            self.fire(Event::ChangeValue, value)?;
        }
        Ok(())
    }

    /// From `On`, remember the value and drop to 0.
    pub fn switch_off(&mut self) -> Result<()> {
        if self.state() == State::On {
            self.stored_value = self.value;
            self.fire(Event::ChangeValue, 0.0)?;
        }
        Ok(())
    }

    /// Clamp to [0.1 Hz, 20 kHz] and hand the frequency to the output.
    pub fn set_frequency(&mut self, hz: f64) -> Result<f64> {
        let hz = if hz.is_nan() {
            MIN_FREQUENCY_HZ
        } else {
            hz.clamp(MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ)
        };
        self.output.set_frequency(hz)?;
        log!(self.options.level(), "{}: PWM frequency {hz} Hz", self.label);
        Ok(hz)
    }

    fn fire(&mut self, event: Event, value: f64) -> Result<()> {
        let flags = Flags {
            normally_off: self.options.normally_off,
            is_on: value > 0.0,
        };
        let level = self.options.level();
        let tag = event_tag(event);
        let label = &self.label;
        let normally_on = !self.options.normally_off;
        let output = &mut self.output;

        let transition = self.machine.send_with(event, &flags, |t| {
            log!(
                level,
                "{tag} {label} is going to {} from {} to {}",
                event.name(),
                t.source.name().to_ascii_uppercase(),
                t.target.name().to_ascii_uppercase()
            );
            output.apply(value, normally_on)
        })?;

        self.value = value;
        if transition.is_self_loop() {
            log!(level, "{tag} {} value is {value}", self.label);
        } else {
            log!(
                level,
                "{tag} {} state changed from {} to {}, value is {value}",
                self.label,
                transition.source.name().to_ascii_uppercase(),
                transition.target.name().to_ascii_uppercase()
            );
        }
        Ok(())
    }
}
