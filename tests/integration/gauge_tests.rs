//! Erstevak gauge client against scripted replies.

use core::time::Duration;

use futures_lite::future::block_on;
use nts_hardware::vacuum_gauge::ErstevakClient;
use nts_hardware::vacuum_gauge::erstevak::{PiraniGas, build_message};

use crate::mock_link::ScriptedLink;

fn reply(command: u8, data: &str) -> Vec<u8> {
    build_message(command, data, 1).unwrap()
}

fn gauge(link: ScriptedLink) -> ErstevakClient<ScriptedLink> {
    ErstevakClient::new(link)
        .with_retries(2)
        .with_response_delay(Duration::ZERO)
}

#[test]
fn reads_pressure() {
    let mut g = gauge(ScriptedLink::new().reply(reply(b'M', "500017")));
    let p = block_on(g.get_pressure()).unwrap();
    assert!((p - 5e-3).abs() < 1e-15);
    assert_eq!(g.link().writes, [b"001M^\r".to_vec()]);
}

#[test]
fn retries_after_a_corrupted_reply() {
    let mut bad = reply(b'M', "100023");
    bad[5] = b'9';
    let mut g = gauge(ScriptedLink::new().reply(bad).reply(reply(b'M', "100023")));
    assert_eq!(block_on(g.get_pressure()).unwrap(), 1000.0);
    assert_eq!(g.link().writes.len(), 2);
}

#[test]
fn ignores_replies_to_other_commands_and_addresses() {
    let foreign = build_message(b'M', "100023", 2).unwrap();
    let mut g = gauge(ScriptedLink::new().reply(reply(b'T', "MTP4D")).reply(foreign));
    assert_eq!(block_on(g.get_pressure()).unwrap(), 0.0);
    assert_eq!(g.link().writes.len(), 2);
}

#[test]
fn reads_gauge_type() {
    let mut g = gauge(ScriptedLink::new().reply(reply(b'T', "MTM9D")));
    assert_eq!(block_on(g.get_gauge_type()).unwrap(), "MTM9D");
}

#[test]
fn setpoint_is_unlocked_then_written() {
    let link = ScriptedLink::new()
        .reply(reply(b's', "2"))
        .reply(reply(b's', "500017"));
    let mut g = gauge(link);
    let p = block_on(g.set_setpoint(5e-3, 2)).unwrap();
    assert!((p - 5e-3).abs() < 1e-15);
    let writes = &g.link().writes;
    assert_eq!(writes[0], build_message(b's', "2", 1).unwrap());
    assert_eq!(writes[1], build_message(b's', "500017", 1).unwrap());
}

#[test]
fn refused_setpoint_falls_back_to_a_read() {
    let link = ScriptedLink::new()
        .silence()
        .silence()
        .reply(reply(b'S', "250015"));
    let mut g = gauge(link);
    let p = block_on(g.set_setpoint(1.0, 1)).unwrap();
    assert!((p - 2.5e-5).abs() < 1e-18);
    assert_eq!(g.link().writes.len(), 3);
    assert_eq!(g.link().writes[2], build_message(b'S', "1", 1).unwrap());
}

#[test]
fn calibration_accepts_a_gas() {
    let link = ScriptedLink::new()
        .reply(reply(b'c', "1"))
        .reply(reply(b'c', "000160"));
    let mut g = gauge(link);
    assert_eq!(block_on(g.set_calibration(PiraniGas::Ar, 1)).unwrap(), 1.6);
    assert_eq!(g.link().writes[1], build_message(b'c', "000160", 1).unwrap());
}

#[test]
fn atmosphere_and_zero_adjustment() {
    let link = ScriptedLink::new()
        .reply(reply(b'j', "1"))
        .reply(reply(b'j', "100023"));
    let mut g = gauge(link);
    assert_eq!(block_on(g.set_atmosphere()).unwrap(), 1000.0);

    // wrong unlock echo: nothing is written
    let link = ScriptedLink::new().reply(reply(b'j', "1")).silence();
    let mut g = gauge(link);
    assert_eq!(block_on(g.set_zero()).unwrap(), 0.0);
    assert_eq!(g.link().writes.len(), 1);
}

#[test]
fn penning_controls() {
    let link = ScriptedLink::new()
        .reply(reply(b'i', "1"))
        .reply(reply(b'w', "000001"))
        .reply(reply(b'W', "000000"));
    let mut g = gauge(link);
    assert!(block_on(g.set_penning_state(true)).unwrap());
    assert!(block_on(g.set_penning_sync(true)).unwrap());
    assert_eq!(g.link().writes[1], build_message(b'w', "000001", 1).unwrap());
    assert!(!block_on(g.get_penning_sync()).unwrap());
}
