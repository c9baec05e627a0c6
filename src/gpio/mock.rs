//! Emulated pins for running without GPIO hardware.
//!
//! Every emulated pin is a cheap handle onto shared atomic state, so a
//! test can keep a clone and watch what a relay or actuator does with
//! the pin it was given.  They implement the `embedded-hal` 1.0 traits
//! and nothing else, so drivers can't tell them apart from real pins.
//!
//! Levels follow gpiozero semantics: `set_high` *activates* the output,
//! and the physical line is high only when the pin is `active_high`.

use core::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use embedded_hal::digital::{self, InputPin, OutputPin, StatefulOutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};

// ───────────────────────────────────────────────────────────────
// Output pin
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MockOutputPin {
    pin: u8,
    active_high: bool,
    active: Arc<AtomicBool>,
    writes: Arc<AtomicU32>,
}

impl MockOutputPin {
    pub fn new(pin: u8, active_high: bool, initial_active: bool) -> Self {
        Self {
            pin,
            active_high,
            active: Arc::new(AtomicBool::new(initial_active)),
            writes: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn pin_number(&self) -> u8 {
        self.pin
    }

    pub fn active_high(&self) -> bool {
        self.active_high
    }

    /// Logical state: true when the output is switched on.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Electrical level of the line.
    pub fn physical_level(&self) -> bool {
        self.is_active() == self.active_high
    }

    /// Number of level writes since construction.
    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::Acquire)
    }

    fn write(&self, active: bool) {
        self.active.store(active, Ordering::Release);
        self.writes.fetch_add(1, Ordering::AcqRel);
    }
}

impl digital::ErrorType for MockOutputPin {
    type Error = Infallible;
}

impl OutputPin for MockOutputPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.write(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.write(true);
        Ok(())
    }
}

impl StatefulOutputPin for MockOutputPin {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.is_active())
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.is_active())
    }
}

// ───────────────────────────────────────────────────────────────
// Input pin
// ───────────────────────────────────────────────────────────────

/// Emulated input line.  With a pull-up the line idles high.
#[derive(Debug, Clone)]
pub struct MockInputPin {
    pin: u8,
    level: Arc<AtomicBool>,
}

impl MockInputPin {
    pub fn new(pin: u8, pull_up: bool) -> Self {
        Self {
            pin,
            level: Arc::new(AtomicBool::new(pull_up)),
        }
    }

    pub fn pin_number(&self) -> u8 {
        self.pin
    }

    /// Drive the line from outside (test stimulus).
    pub fn drive(&self, high: bool) {
        self.level.store(high, Ordering::Release);
    }
}

impl digital::ErrorType for MockInputPin {
    type Error = Infallible;
}

impl InputPin for MockInputPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.level.load(Ordering::Acquire))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.level.load(Ordering::Acquire))
    }
}

// ───────────────────────────────────────────────────────────────
// PWM pin
// ───────────────────────────────────────────────────────────────

/// Duty resolution of the emulated PWM: 0.01 %.
pub const MOCK_PWM_MAX_DUTY: u16 = 10_000;

#[derive(Debug, Clone)]
pub struct MockPwmPin {
    pin: u8,
    active_high: bool,
    duty: Arc<AtomicU16>,
}

impl MockPwmPin {
    pub fn new(pin: u8, active_high: bool, initial_value: f64) -> Self {
        let duty = (initial_value.clamp(0.0, 1.0) * f64::from(MOCK_PWM_MAX_DUTY)).round() as u16;
        Self {
            pin,
            active_high,
            duty: Arc::new(AtomicU16::new(duty)),
        }
    }

    pub fn pin_number(&self) -> u8 {
        self.pin
    }

    /// Logical duty as a fraction in `[0, 1]`.
    pub fn value(&self) -> f64 {
        f64::from(self.duty.load(Ordering::Acquire)) / f64::from(MOCK_PWM_MAX_DUTY)
    }

    /// Duty fraction seen on the line.
    pub fn physical_value(&self) -> f64 {
        if self.active_high {
            self.value()
        } else {
            1.0 - self.value()
        }
    }
}

impl pwm::ErrorType for MockPwmPin {
    type Error = Infallible;
}

impl SetDutyCycle for MockPwmPin {
    fn max_duty_cycle(&self) -> u16 {
        MOCK_PWM_MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.duty
            .store(duty.min(MOCK_PWM_MAX_DUTY), Ordering::Release);
        Ok(())
    }
}
