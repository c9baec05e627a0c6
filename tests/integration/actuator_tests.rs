//! Relays and actuators built from config through the GPIO factories.

use nts_hardware::actuator::{Actuator, GpioOutput, HwPwmOutput, Mode, PwmOutput};
use nts_hardware::config::HardwareConfig;
use nts_hardware::fsm::State;
use nts_hardware::gpio::{self, Edge, HwPwm, PwmDevice};
use nts_hardware::relay::{Relay, SwitchOptions};

const BENCH: &str = r#"{
    "relays": [{"pin_number": 5, "label": "Valve", "active_high": false}],
    "buttons": [{"pin_number": 6, "bounce_time": 0.02}],
    "pwms": [
        {"pin_number": 12, "label": "Heater"},
        {"backend": "rpi_hardware_pwm", "chip": 0, "channel": 1, "frequency": 500}
    ]
}"#;

fn bench() -> HardwareConfig {
    HardwareConfig::from_json(BENCH).unwrap()
}

#[test]
fn relay_drives_an_active_low_line() {
    let cfg = bench();
    let pin = gpio::get_relay(&cfg.relays[0]).unwrap();
    let probe = pin.clone();
    let mut relay = Relay::with_label(pin, "Valve", SwitchOptions::default()).unwrap();
    assert_eq!(relay.state(), State::Off);
    assert!(probe.physical_level());

    relay.switch_on().unwrap();
    assert!(probe.is_active());
    assert!(!probe.physical_level());

    relay.toggle().unwrap();
    assert!(!probe.is_active());
    assert_eq!(relay.value(), 0);
}

#[test]
fn normally_on_relay_rests_on() {
    let pin = gpio::get_relay(&bench().relays[0]).unwrap();
    let probe = pin.clone();
    let mut relay = Relay::with_options(pin, SwitchOptions::default().normally_on(true)).unwrap();
    assert_eq!(relay.state(), State::On);
    assert!(probe.is_active());
    relay.switch_off().unwrap();
    assert_eq!(relay.state(), State::Off);
    assert!(!probe.is_active());
}

#[test]
fn two_state_actuator_on_a_relay_pin() {
    let pin = gpio::get_relay(&bench().relays[0]).unwrap();
    let probe = pin.clone();
    let mut act = Actuator::new(GpioOutput::new(pin).unwrap(), SwitchOptions::default()).unwrap();
    assert_eq!(act.mode(), Mode::TwoState);
    act.set_value(0.7).unwrap();
    assert_eq!(act.value(), 1.0);
    assert!(probe.is_active());
    act.set_value(0.2).unwrap();
    assert!(!probe.is_active());
}

#[test]
fn pwm_actuator_restores_its_level() {
    let PwmDevice::Pin(pin) = gpio::get_pwm(&bench().pwms[0]).unwrap() else {
        panic!("expected a duty-cycle pin");
    };
    let probe = pin.clone();
    let mut act = Actuator::new(PwmOutput::new(pin).unwrap(), SwitchOptions::default()).unwrap();
    act.set_value(0.25).unwrap();
    assert_eq!(probe.value(), 0.25);

    act.switch_off().unwrap();
    assert_eq!(probe.value(), 0.0);
    assert_eq!(act.state(), State::Off);

    act.switch_on().unwrap();
    assert_eq!(probe.value(), 0.25);
    assert_eq!(act.state(), State::On);
}

#[test]
fn hardware_pwm_actuator_starts_and_stops_the_channel() {
    let PwmDevice::Hardware(HwPwm::Stub(stub)) = gpio::get_pwm(&bench().pwms[1]).unwrap() else {
        panic!("expected an emulated hardware channel");
    };
    let probe = stub.clone();
    let mut act =
        Actuator::new(HwPwmOutput::new(HwPwm::Stub(stub)), SwitchOptions::default()).unwrap();
    assert!(!probe.snapshot().running);
    assert_eq!(probe.snapshot().frequency_hz, 500.0);

    act.set_value(0.6).unwrap();
    let s = probe.snapshot();
    assert!(s.running);
    assert!((s.duty_percent - 60.0).abs() < 1e-9);

    assert_eq!(act.set_frequency(50e3).unwrap(), 20e3);
    assert_eq!(probe.snapshot().frequency_hz, 20e3);

    act.set_value(0.0).unwrap();
    assert!(!probe.snapshot().running);
}

#[test]
fn button_is_debounced() {
    let mut button = gpio::get_button(&bench().buttons[0]).unwrap();
    assert_eq!(button.bounce_ms(), 20);
    button.pin().drive(false);
    assert_eq!(button.update(0).unwrap(), None);
    assert_eq!(button.update(10).unwrap(), None);
    assert_eq!(button.update(25).unwrap(), Some(Edge::Activated));
    assert!(button.is_active());
}
