//! Proportional outputs: the value becomes a PWM duty cycle.

use embedded_hal::pwm::SetDutyCycle;
use log::debug;

use super::{Actuator, ActuatorOutput, Mode};
use crate::error::{GpioError, Result};
use crate::gpio::HardwarePwm;

/// Duty-cycle pin (`embedded-hal` PWM).
///
/// `SetDutyCycle` has no notion of frequency, so a requested frequency is
/// only recorded; the carrier is whatever the HAL configured.
#[derive(Debug)]
pub struct PwmOutput<P> {
    pin: P,
    requested_frequency: Option<f64>,
}

impl<P: SetDutyCycle> PwmOutput<P> {
    /// Takes the pin and sets its duty to 0.
    pub fn new(mut pin: P) -> Result<Self> {
        pin.set_duty_cycle_fully_off()
            .map_err(|_| GpioError::PwmWriteFailed)?;
        Ok(Self {
            pin,
            requested_frequency: None,
        })
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }

    pub fn requested_frequency(&self) -> Option<f64> {
        self.requested_frequency
    }
}

impl<P: SetDutyCycle> ActuatorOutput for PwmOutput<P> {
    const DEFAULT_LABEL: &'static str = "GPIO ACTUATOR";

    fn mode(&self) -> Mode {
        Mode::Proportional
    }

    fn apply(&mut self, value: f64, normally_on: bool) -> Result<()> {
        let fraction = if normally_on { 1.0 - value } else { value };
        let max = self.pin.max_duty_cycle();
        let duty = (fraction * f64::from(max)).round() as u16;
        self.pin
            .set_duty_cycle(duty.min(max))
            .map_err(|_| GpioError::PwmWriteFailed.into())
    }

    fn set_frequency(&mut self, hz: f64) -> Result<()> {
        debug!("pwm: frequency {hz} Hz requested, carrier is fixed by the HAL");
        self.requested_frequency = Some(hz);
        Ok(())
    }
}

/// Kernel hardware PWM channel.
///
/// The channel is stopped whenever the duty reaches 0 and restarted on the
/// next non-zero value.
#[derive(Debug)]
pub struct HwPwmOutput<H> {
    pwm: H,
    disabled: bool,
}

impl<H: HardwarePwm> HwPwmOutput<H> {
    pub fn new(pwm: H) -> Self {
        Self {
            pwm,
            disabled: true,
        }
    }

    pub fn pwm(&self) -> &H {
        &self.pwm
    }

    pub fn is_running(&self) -> bool {
        !self.disabled
    }
}

impl<H: HardwarePwm> ActuatorOutput for HwPwmOutput<H> {
    const DEFAULT_LABEL: &'static str = "HWPWM ACTUATOR";

    fn mode(&self) -> Mode {
        Mode::Proportional
    }

    fn apply(&mut self, value: f64, normally_on: bool) -> Result<()> {
        let percent = if normally_on {
            100.0 - value * 100.0
        } else {
            value * 100.0
        };
        if percent <= 0.0 {
            self.pwm.stop()?;
            self.disabled = true;
        } else if self.disabled {
            self.pwm.start(percent)?;
            self.disabled = false;
        } else {
            self.pwm.change_duty_cycle(percent)?;
        }
        Ok(())
    }

    fn set_frequency(&mut self, hz: f64) -> Result<()> {
        self.pwm.change_frequency(hz)
    }
}

pub type GpioProportionalActuator<P> = Actuator<PwmOutput<P>>;
pub type HwPwmProportionalActuator<H> = Actuator<HwPwmOutput<H>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::State;
    use crate::gpio::{MockPwmPin, StubHardwarePwm};
    use crate::relay::SwitchOptions;

    #[test]
    fn pwm_pin_tracks_value() {
        let pin = MockPwmPin::new(12, true, 0.8);
        let out = PwmOutput::new(pin.clone()).unwrap();
        assert_eq!(pin.value(), 0.0);

        let mut act = GpioProportionalActuator::new(out, SwitchOptions::default()).unwrap();
        assert_eq!(act.label(), "GPIO ACTUATOR");
        act.set_value(0.25).unwrap();
        assert!((pin.value() - 0.25).abs() < 1e-9);
        assert_eq!(act.set_frequency(1000.0).unwrap(), 1000.0);
        assert_eq!(act.output().requested_frequency(), Some(1000.0));
    }

    #[test]
    fn normally_on_pwm_is_inverted() {
        let pin = MockPwmPin::new(12, true, 0.0);
        let opts = SwitchOptions::default().normally_on(true);
        let mut act = GpioProportionalActuator::new(PwmOutput::new(pin.clone()).unwrap(), opts)
            .unwrap();
        assert_eq!(act.value(), 1.0);
        assert_eq!(pin.value(), 0.0);
        act.set_value(0.3).unwrap();
        assert!((pin.value() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn hw_pwm_starts_stops_and_changes_duty() {
        let stub = StubHardwarePwm::new(0, 1000.0, 0);
        let mut act =
            HwPwmProportionalActuator::new(HwPwmOutput::new(stub.clone()), SwitchOptions::default())
                .unwrap();
        assert_eq!(act.label(), "HWPWM ACTUATOR");
        assert!(!stub.snapshot().running);

        act.set_value(0.5).unwrap();
        assert_eq!(act.state(), State::On);
        assert!(stub.snapshot().running);
        assert_eq!(stub.snapshot().duty_percent, 50.0);

        act.set_value(0.75).unwrap();
        assert_eq!(stub.snapshot().duty_percent, 75.0);
        assert!(act.output().is_running());

        act.set_value(-1.0).unwrap();
        assert_eq!(act.state(), State::Off);
        assert!(!stub.snapshot().running);
        assert!(!act.output().is_running());
    }

    #[test]
    fn hw_pwm_normally_on_is_inverted() {
        let stub = StubHardwarePwm::new(0, 1000.0, 0);
        let opts = SwitchOptions::default().normally_on(true);
        let mut act = HwPwmProportionalActuator::new(HwPwmOutput::new(stub.clone()), opts).unwrap();
        assert_eq!(act.value(), 1.0);
        assert_eq!(act.state(), State::On);
        assert!(!stub.snapshot().running);

        act.set_value(0.25).unwrap();
        assert_eq!(stub.snapshot().duty_percent, 75.0);
    }

    #[test]
    fn hw_pwm_frequency_is_clamped_and_forwarded() {
        let stub = StubHardwarePwm::new(0, 1000.0, 0);
        let mut act =
            HwPwmProportionalActuator::new(HwPwmOutput::new(stub.clone()), SwitchOptions::default())
                .unwrap();
        act.set_frequency(50e3).unwrap();
        assert_eq!(stub.snapshot().frequency_hz, 20e3);
        act.set_frequency(0.0).unwrap();
        assert_eq!(stub.snapshot().frequency_hz, 0.1);
    }
}
