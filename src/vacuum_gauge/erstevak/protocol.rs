//! Erstevak ASCII protocol.
//!
//! ```text
//! ┌──────────┬─────┬────────────┬────┬────┐
//! │ addr (3) │ cmd │ data (0-6) │ CS │ CR │
//! │ "001"    │ 'M' │ "500017"   │    │    │
//! └──────────┴─────┴────────────┴────┴────┘
//! CS = (sum of preceding bytes) mod 64 + 64
//! ```
//!
//! Pressures travel as `mmmmEE`: a 4-digit mantissa and an exponent
//! offset by 20, so `value = mmmm · 10^(EE − 23)`.

use log::warn;

use crate::error::ProtocolError;

pub const MAX_DATA_LEN: usize = 6;
pub const TERMINATOR: u8 = b'\r';

/// Commands the gauges understand.  Upper case reads, lower case writes.
pub const COMMANDS: &[u8] = b"TMSsCcjIiWw";

pub fn checksum(msg: &[u8]) -> u8 {
    let sum: u32 = msg.iter().map(|&b| u32::from(b)).sum();
    (sum % 64 + 64) as u8
}

/// Frame a request.
pub fn build_message(command: u8, data: &str, address: u8) -> Result<Vec<u8>, ProtocolError> {
    if data.len() > MAX_DATA_LEN {
        return Err(ProtocolError::PayloadTooLong { max: MAX_DATA_LEN });
    }
    if !COMMANDS.contains(&command) {
        return Err(ProtocolError::UnknownCommand(command));
    }
    let mut msg = format!("{address:03}").into_bytes();
    msg.push(command);
    msg.extend_from_slice(data.as_bytes());
    msg.push(checksum(&msg));
    msg.push(TERMINATOR);
    Ok(msg)
}

/// Smallest and largest pressures `mmmmEE` can carry.
pub const PRESSURE_MIN: &str = "100000";
pub const PRESSURE_MAX: &str = "999999";

/// Encode a pressure as `mmmmEE`.  Non-positive pressures encode as zero;
/// pressures outside 1.000e-20..=9.999e79 saturate to the nearest end.
pub fn pressure_to_data(pressure: f64) -> String {
    if pressure.is_nan() || pressure <= 0.0 {
        return "000020".to_owned();
    }
    if pressure.is_infinite() {
        warn!("erstevak: pressure {pressure} saturated to {PRESSURE_MAX}");
        return PRESSURE_MAX.to_owned();
    }
    let mut exponent = pressure.log10().floor() as i32;
    let mut mantissa = (pressure / 10f64.powi(exponent) * 1000.0).round() as u32;
    if mantissa >= 10_000 {
        mantissa /= 10;
        exponent += 1;
    }
    match exponent + 20 {
        offset @ 0..=99 => format!("{mantissa:04}{offset:02}"),
        offset if offset < 0 => {
            warn!("erstevak: pressure {pressure:e} saturated to {PRESSURE_MIN}");
            PRESSURE_MIN.to_owned()
        }
        _ => {
            warn!("erstevak: pressure {pressure:e} saturated to {PRESSURE_MAX}");
            PRESSURE_MAX.to_owned()
        }
    }
}

pub fn parse_pressure(data: &str) -> Option<f64> {
    let mantissa: u32 = data.get(..4)?.parse().ok()?;
    let offset: i32 = data.get(data.len().checked_sub(2)?..)?.parse().ok()?;
    Some(f64::from(mantissa) * 10f64.powi(offset - 23))
}

pub fn calibration_to_data(cal: f64) -> String {
    format!("{:06}", (cal * 100.0).round() as i64)
}

pub fn parse_calibration(data: &str) -> Option<f64> {
    data.trim().parse::<i64>().ok().map(|v| v as f64 / 100.0)
}

fn parse_flag(data: &str) -> Option<bool> {
    data.trim().parse::<i64>().ok().map(|v| v != 0)
}

/// Decoded gauge reply.  Only the field matching `command` is filled.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GaugeResponse {
    pub address: u8,
    pub command: u8,
    pub data: String,
    pub checksum: u8,
    pub pressure: Option<f64>,
    pub setpoint: Option<f64>,
    pub calibration: Option<f64>,
    pub gauge_model: Option<String>,
    pub penning_enabled: Option<bool>,
    pub penning_sync: Option<bool>,
}

/// Check and decode one reply.  A trailing CR/LF is ignored.
pub fn parse_response(resp: &[u8], address: u8) -> Result<GaugeResponse, ProtocolError> {
    let end = resp
        .iter()
        .rposition(|b| !matches!(b, b'\r' | b'\n'))
        .map_or(0, |i| i + 1);
    let resp = &resp[..end];
    let Some((&cs, body)) = resp.split_last() else {
        return Err(ProtocolError::NoResponse);
    };
    if checksum(body) != cs {
        return Err(ProtocolError::ChecksumMismatch);
    }
    let text = core::str::from_utf8(body).map_err(|_| ProtocolError::Malformed)?;
    if text.len() < 4 || !text.is_char_boundary(3) || !text.is_char_boundary(4) {
        return Err(ProtocolError::Malformed);
    }
    let got: u8 = text[..3].parse().map_err(|_| ProtocolError::Malformed)?;
    if got != address {
        return Err(ProtocolError::AddressMismatch {
            expected: address,
            got,
        });
    }

    let command = body[3];
    let data = &text[4..];
    let mut out = GaugeResponse {
        address: got,
        command,
        data: data.to_owned(),
        checksum: cs,
        ..GaugeResponse::default()
    };
    let has_value = data.len() > 1;
    match command {
        b'T' => out.gauge_model = Some(data.to_owned()),
        b'M' => out.pressure = parse_pressure(data),
        b'S' | b's' if has_value => out.setpoint = parse_pressure(data),
        b'C' | b'c' if has_value => out.calibration = parse_calibration(data),
        b'j' if has_value => out.pressure = parse_pressure(data),
        b'I' | b'i' => out.penning_enabled = parse_flag(data),
        b'W' | b'w' => out.penning_sync = parse_flag(data),
        _ => {}
    }
    Ok(out)
}
