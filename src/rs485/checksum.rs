//! Frame check sequences used on the bus.

/// Modbus RTU CRC-16 (init `0xFFFF`, reflected poly `0xA001`).
///
/// Sent low byte first.
pub fn crc16_modbus(payload: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in payload {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Modbus ASCII longitudinal redundancy check: two's complement of the
/// byte sum.
pub fn lrc(payload: &[u8]) -> u8 {
    payload
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b))
        .wrapping_neg()
}

/// True when the last byte of `message` is the LRC of the rest.
pub fn check_lrc(message: &[u8]) -> bool {
    match message.split_last() {
        Some((&cs, payload)) => lrc(payload) == cs,
        None => false,
    }
}
