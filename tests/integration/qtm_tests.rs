//! TM106B thickness monitor against an emulated register map.

use core::time::Duration;

use futures_lite::future::block_on;
use nts_hardware::error::{Error, ProtocolError};
use nts_hardware::qcm::{Con, Material, Qtm, Run};
use nts_hardware::rs485::{Framer, RegisterClient};

use crate::mock_link::ModbusSlave;

/// Version 1.05, 123.45 Å, 2.5 Å/s, 5 999 123.45 Hz, CON 0x5110,
/// Al, 9600 baud.
const REGISTERS: [u16; 16] = [
    105, 0, 12_345, 0, 250, 0x23C1, 0xEF99, 0, 0x5110, 0, 270, 1080, 1000, 100, 1, 0x3000,
];

fn monitor(slave: ModbusSlave) -> Qtm<ModbusSlave> {
    let client = RegisterClient::new(slave, Framer::Ascii, 1)
        .with_retries(3)
        .with_response_delay(Duration::ZERO);
    Qtm::new(client)
}

fn bench() -> Qtm<ModbusSlave> {
    monitor(ModbusSlave::new(Framer::Ascii, 1).with_registers(0, &REGISTERS))
}

fn slave(qtm: &Qtm<ModbusSlave>) -> &ModbusSlave {
    qtm.client().link()
}

#[test]
fn reads_measurements() {
    let mut qtm = bench();
    block_on(async {
        assert_eq!(qtm.get_version().await.unwrap(), 1.05);
        assert_eq!(qtm.get_thickness().await.unwrap(), 123.45);
        assert_eq!(qtm.get_rate().await.unwrap(), 2.5);
        assert_eq!(qtm.get_frequency().await.unwrap(), 5_999_123.45);
        assert_eq!(qtm.get_con().await.unwrap(), Con::new(5, 1, 1));
        assert_eq!(qtm.get_run().await.unwrap(), Run::STOP);
        assert_eq!(qtm.get_baudrate().await.unwrap(), 9600);
        assert_eq!(qtm.get_range().await.unwrap(), 100);
    });
}

#[test]
fn state_in_one_request() {
    let mut qtm = bench();
    let state = block_on(qtm.get_state()).unwrap();
    assert_eq!(state.thickness, 123.45);
    assert_eq!(state.density, 2.7);
    assert_eq!(state.z_ratio, 1.08);
    assert_eq!(state.scale, 1.0);
    assert_eq!(state.address, 1);
    assert_eq!(slave(&qtm).requests.len(), 1);
}

#[test]
fn settings_are_clamped_before_writing() {
    let mut qtm = bench();
    block_on(async {
        assert_eq!(qtm.set_pwm(150.0).await.unwrap(), 99.99);
        assert_eq!(qtm.set_density(0.1).await.unwrap(), 0.4);
        assert_eq!(qtm.set_z_ratio(12.0).await.unwrap(), 9.999);
        assert_eq!(qtm.set_scale(100.0).await.unwrap(), 65.535);
        assert_eq!(qtm.set_range(20_000).await.unwrap(), 9999);
        qtm.set_con(Con::new(20, 1, 2)).await.unwrap();
    });
    let s = slave(&qtm);
    assert_eq!(s.register(7), Some(9999));
    assert_eq!(s.register(10), Some(40));
    assert_eq!(s.register(12), Some(65_535));
    assert_eq!(s.register(8), Some(0xB120));
}

#[test]
fn run_control() {
    let mut qtm = bench();
    block_on(qtm.start_measurement()).unwrap();
    assert_eq!(slave(&qtm).register(9), Some(0x0011));
    assert_eq!(block_on(qtm.get_run()).unwrap(), Run::START);
    block_on(qtm.stop_measurement()).unwrap();
    assert_eq!(slave(&qtm).register(9), Some(0));
}

#[test]
fn material_loads_density_and_z_ratio() {
    let mut qtm = bench();
    let gold = Material::by_symbol("au").unwrap();
    block_on(qtm.set_material(gold)).unwrap();
    assert_eq!(slave(&qtm).register(10), Some(1930));
    assert_eq!(slave(&qtm).register(11), Some(380));
}

#[test]
fn address_change_moves_the_client() {
    fn follow_address(s: &mut ModbusSlave, register: u16, value: u16) {
        if register == 14 {
            s.address = value as u8;
        }
    }
    let mut qtm = monitor(
        ModbusSlave::new(Framer::Ascii, 1)
            .with_registers(0, &REGISTERS)
            .with_hook(follow_address),
    );
    assert_eq!(block_on(qtm.set_address(0)).unwrap(), 1);
    assert_eq!(block_on(qtm.set_address(7)).unwrap(), 7);
    assert_eq!(qtm.address(), 7);
    assert_eq!(block_on(qtm.get_version()).unwrap(), 1.05);
}

#[test]
fn baud_rate_change_retunes_the_link() {
    let mut qtm = bench();
    assert_eq!(block_on(qtm.set_baudrate(19_200)).unwrap(), 19_200);
    assert_eq!(slave(&qtm).register(15), Some(0x4000));
    assert_eq!(slave(&qtm).baud, 19_200);

    // unsupported rates fall back to 9600
    assert_eq!(block_on(qtm.set_baudrate(57_600)).unwrap(), 9600);
}

#[test]
fn unconfirmed_baud_rate_leaves_the_link_alone() {
    let mut slave = ModbusSlave::new(Framer::Ascii, 1).with_registers(0, &REGISTERS);
    slave.silent_writes = true;
    let mut qtm = monitor(slave);
    let err = block_on(qtm.set_baudrate(4800)).unwrap_err();
    assert_eq!(err, Error::Protocol(ProtocolError::NoResponse));
    assert_eq!(qtm.client().link().baud, 9600);
}

#[test]
fn missing_echo_is_read_back() {
    let mut slave = ModbusSlave::new(Framer::Ascii, 1).with_registers(0, &REGISTERS);
    slave.silent_writes = true;
    let mut qtm = monitor(slave);
    assert_eq!(block_on(qtm.set_density(8.93)).unwrap(), 8.93);
    // three unanswered writes, then the read
    assert_eq!(qtm.client().link().requests.len(), 4);
}

#[test]
fn exception_reply_is_an_error() {
    let mut qtm = monitor(ModbusSlave::new(Framer::Ascii, 1).with_registers(0, &REGISTERS[..4]));
    let err = block_on(qtm.get_pwm()).unwrap_err();
    assert_eq!(
        err,
        Error::Protocol(ProtocolError::Exception {
            function: 3,
            code: 2
        })
    );
}

#[test]
fn works_over_rtu() {
    let slave = ModbusSlave::new(Framer::Rtu, 3).with_registers(0, &REGISTERS);
    let client = RegisterClient::new(slave, Framer::Rtu, 3).with_response_delay(Duration::ZERO);
    let mut qtm = Qtm::new(client);
    assert_eq!(block_on(qtm.get_thickness()).unwrap(), 123.45);
}

#[test]
fn silent_monitor_reads_zero() {
    let mut slave = ModbusSlave::new(Framer::Ascii, 1).with_registers(0, &REGISTERS);
    slave.drop_next = usize::MAX;
    let mut qtm = monitor(slave);
    assert_eq!(block_on(qtm.get_thickness()).unwrap(), 0.0);
    assert_eq!(block_on(qtm.get_state()).unwrap().version, 0.0);
    assert_eq!(qtm.client().link().requests.len(), 6);
}
