//! Intek SPE-B drive against an emulated register map.

use core::time::Duration;

use futures_lite::future::block_on;
use nts_hardware::rs485::{Framer, RegisterClient};
use nts_hardware::vfd::intek::{REG_COMMAND, REG_FAULT, REG_FREQUENCY_SETPOINT};
use nts_hardware::vfd::{IntekSpeB, Vfd, VfdState};

use crate::mock_link::ModbusSlave;

/// Command register side effects of the drive.
fn drive_logic(s: &mut ModbusSlave, register: u16, value: u16) {
    if register != REG_COMMAND {
        return;
    }
    match value {
        1 => s.registers.insert(0x3000, 1),
        2 => s.registers.insert(0x3000, 2),
        5 => s.registers.insert(0x3000, 3),
        7 => s.registers.insert(REG_FAULT, 0),
        _ => None,
    };
}

fn drive() -> IntekSpeB<ModbusSlave> {
    let slave = ModbusSlave::new(Framer::Rtu, 1)
        .with_registers(0x1000, &[5000])
        .with_registers(0x3000, &[3, 0, 0, 0, 0])
        .with_registers(0x8000, &[14, 3])
        .with_hook(drive_logic);
    IntekSpeB::new(
        RegisterClient::new(slave, Framer::Rtu, 1)
            .with_retries(3)
            .with_response_delay(Duration::ZERO),
    )
}

#[test]
fn start_reverse_stop() {
    let mut vfd = drive();
    block_on(async {
        vfd.start().await.unwrap();
        assert_eq!(vfd.read_parameters().await.unwrap().state, VfdState::RunningForward);
        vfd.start_reverse().await.unwrap();
        assert_eq!(vfd.read_parameters().await.unwrap().state, VfdState::RunningReverse);
        vfd.stop().await.unwrap();
        let p = vfd.read_parameters().await.unwrap();
        assert_eq!(p.state, VfdState::Stopped);
        assert!(!p.started);
    });
    assert_eq!(vfd.client().link().register(REG_COMMAND), Some(5));
}

#[test]
fn reads_operating_point() {
    let mut vfd = drive();
    vfd.client_mut()
        .link_mut()
        .registers
        .extend([(0x3000, 1), (0x3001, 2500), (0x3002, 35), (0x3003, 230), (0x3004, 8)]);
    let p = block_on(vfd.read_parameters()).unwrap();
    assert_eq!(p.frequency, 25.0);
    assert_eq!(p.frequency_percent, 50.0);
    assert_eq!(p.output_current, 3.5);
    assert_eq!(p.output_voltage, 230.0);
    assert_eq!(p.output_power, 0.8);
    assert!(p.started);
}

#[test]
fn decodes_and_clears_faults() {
    let mut vfd = drive();
    block_on(async {
        assert_eq!(
            vfd.read_fault().await.unwrap().message,
            "Overheat of power converter"
        );
        assert_eq!(vfd.read_fault_com().await.unwrap().message, "CRC error");
        assert_eq!(vfd.clear_error().await.unwrap(), 0);
        assert!(!vfd.read_fault().await.unwrap().is_fault());
    });
}

#[test]
fn frequency_setpoint_is_a_clamped_percentage() {
    let mut vfd = drive();
    assert_eq!(block_on(vfd.set_frequency_percent(120.0)).unwrap(), 100.0);
    assert_eq!(vfd.client().link().register(REG_FREQUENCY_SETPOINT), Some(10_000));
    assert_eq!(block_on(vfd.set_frequency_percent(33.3)).unwrap(), 33.3);
    assert_eq!(block_on(vfd.get_frequency_percent()).unwrap(), 33.3);
}

#[test]
fn survives_dropped_requests() {
    let mut vfd = drive();
    vfd.client_mut().link_mut().drop_next = 2;
    assert_eq!(block_on(vfd.read_error_code()).unwrap(), 14);
    assert_eq!(vfd.client().link().requests.len(), 3);
}
