//! Modbus serial framing and a register-level client.
//!
//! ## Wire format
//!
//! ```text
//! ASCII  ':' │ HEX( addr │ fn │ data… │ LRC ) │ CR LF
//! RTU         addr │ fn │ data… │ CRC16 (lo, hi)
//! ```
//!
//! Requests are always 6-byte PDUs: address, function, register and one
//! 16-bit operand (a count for `0x03`, a value for `0x06`).

use core::fmt::Write as _;
use core::time::Duration;

use log::{Level, debug, log, warn};
use serde::{Deserialize, Serialize};

use super::checksum::{check_lrc, crc16_modbus, lrc};
use super::link::SerialLink;
use super::{DEFAULT_RESPONSE_DELAY, DEFAULT_RETRIES, settle};
use crate::error::{ProtocolError, Result};

pub const READ_HOLDING_REGISTERS: u8 = 0x03;
pub const WRITE_SINGLE_REGISTER: u8 = 0x06;
/// Function codes at or above this value are exception replies.
pub const EXCEPTION_FLAG: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Framer {
    #[serde(rename = "ASCII", alias = "ascii")]
    Ascii,
    #[default]
    #[serde(rename = "RTU", alias = "rtu")]
    Rtu,
}

/// Build a request ADU body (without check sequence).
pub fn request(address: u8, function: u8, register: u16, operand: u16) -> [u8; 6] {
    let [rh, rl] = register.to_be_bytes();
    let [oh, ol] = operand.to_be_bytes();
    [address, function, rh, rl, oh, ol]
}

impl Framer {
    /// Wrap a body in the framer's check sequence and delimiters.
    pub fn encode(self, body: &[u8]) -> Vec<u8> {
        match self {
            Self::Ascii => {
                let mut out = String::with_capacity(body.len() * 2 + 5);
                out.push(':');
                for b in body.iter().chain(core::iter::once(&lrc(body))) {
                    let _ = write!(out, "{b:02X}");
                }
                out.push_str("\r\n");
                out.into_bytes()
            }
            Self::Rtu => {
                let mut out = Vec::with_capacity(body.len() + 2);
                out.extend_from_slice(body);
                out.extend_from_slice(&crc16_modbus(body).to_le_bytes());
                out
            }
        }
    }

    /// Strip delimiters and verify the check sequence.  Returns the body.
    pub fn decode(self, frame: &[u8]) -> core::result::Result<Vec<u8>, ProtocolError> {
        match self {
            Self::Ascii => {
                let Some(rest) = frame.strip_prefix(b":") else {
                    return Err(ProtocolError::Malformed);
                };
                let end = rest
                    .iter()
                    .rposition(|b| !matches!(b, b'\r' | b'\n'))
                    .map_or(0, |i| i + 1);
                let mut payload = hex_decode(&rest[..end]).ok_or(ProtocolError::Malformed)?;
                if payload.len() < 3 {
                    return Err(ProtocolError::Malformed);
                }
                if !check_lrc(&payload) {
                    return Err(ProtocolError::ChecksumMismatch);
                }
                payload.pop();
                Ok(payload)
            }
            Self::Rtu => {
                if frame.len() < 4 {
                    return Err(ProtocolError::Malformed);
                }
                let (body, crc) = frame.split_at(frame.len() - 2);
                if crc16_modbus(body).to_le_bytes() != [crc[0], crc[1]] {
                    return Err(ProtocolError::ChecksumMismatch);
                }
                Ok(body.to_vec())
            }
        }
    }
}

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn hex_decode(text: &[u8]) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    text.chunks_exact(2)
        .map(|p| Some(hex_nibble(p[0])? << 4 | hex_nibble(p[1])?))
        .collect()
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Parsed reply.  An empty response (no address) means nothing usable
/// arrived.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub address: Option<u8>,
    pub function: u8,
    /// Echoed register of a write reply.
    pub register: u16,
    /// Register words as sent on the wire.
    pub data: Vec<u16>,
    /// Exception code when `function >= 0x80`.
    pub exception: Option<u8>,
}

impl Response {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_none()
    }

    /// Parse a checked body (address, function, data).
    pub fn parse(body: &[u8]) -> core::result::Result<Self, ProtocolError> {
        let [address, function, rest @ ..] = body else {
            return Err(ProtocolError::Malformed);
        };
        let mut resp = Self {
            address: Some(*address),
            function: *function,
            ..Self::default()
        };
        match *function {
            READ_HOLDING_REGISTERS => {
                let [count, words @ ..] = rest else {
                    return Err(ProtocolError::Malformed);
                };
                // register data comes in whole words
                if count % 2 != 0 {
                    return Err(ProtocolError::Malformed);
                }
                let words = words
                    .get(..usize::from(*count))
                    .ok_or(ProtocolError::Malformed)?;
                resp.data = words
                    .chunks_exact(2)
                    .map(|w| u16::from_be_bytes([w[0], w[1]]))
                    .collect();
            }
            WRITE_SINGLE_REGISTER => {
                let [rh, rl, vh, vl, ..] = rest else {
                    return Err(ProtocolError::Malformed);
                };
                resp.register = u16::from_be_bytes([*rh, *rl]);
                resp.data = vec![u16::from_be_bytes([*vh, *vl])];
            }
            f if f >= EXCEPTION_FLAG => {
                resp.exception = Some(rest.first().copied().unwrap_or(0));
            }
            _ => {}
        }
        Ok(resp)
    }

    /// Word `i` as a two's-complement value.
    pub fn signed(&self, i: usize) -> Option<i16> {
        self.data.get(i).map(|&w| w as i16)
    }

    pub fn unsigned(&self, i: usize) -> Option<u16> {
        self.data.get(i).copied()
    }

    /// Words `i` and `i + 1` as one 32-bit value, high word first.
    /// The high word is signed.
    pub fn wide(&self, i: usize) -> Option<i32> {
        let hi = self.signed(i)?;
        let lo = self.unsigned(i + 1)?;
        Some((i32::from(hi) << 16) + i32::from(lo))
    }

    /// Turn an exception reply into an error.
    pub fn into_result(self) -> Result<Self> {
        match self.exception {
            Some(code) => Err(ProtocolError::Exception {
                function: self.function & !EXCEPTION_FLAG,
                code,
            }
            .into()),
            None => Ok(self),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Register-level Modbus client on one bus address.
pub struct RegisterClient<L> {
    link: L,
    framer: Framer,
    address: u8,
    retries: u8,
    response_delay: Duration,
    verbose: bool,
}

impl<L: SerialLink> RegisterClient<L> {
    pub fn new(link: L, framer: Framer, address: u8) -> Self {
        Self {
            link,
            framer,
            address,
            retries: DEFAULT_RETRIES,
            response_delay: DEFAULT_RESPONSE_DELAY,
            verbose: false,
        }
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries.max(1);
        self
    }

    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    pub fn framer(&self) -> Framer {
        self.framer
    }

    pub fn retries(&self) -> u8 {
        self.retries
    }

    pub fn response_delay(&self) -> Duration {
        self.response_delay
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    pub fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        self.link.set_baud_rate(baud)
    }

    fn level(&self) -> Level {
        if self.verbose { Level::Info } else { Level::Debug }
    }

    /// Read `count` holding registers starting at `start`.
    pub async fn read_registers(&mut self, start: u16, count: u16) -> Result<Response> {
        log!(
            self.level(),
            "modbus[{}]: read {count} register(s) from {start}",
            self.address
        );
        self.transact(READ_HOLDING_REGISTERS, start, count).await
    }

    pub async fn write_register(&mut self, register: u16, value: u16) -> Result<Response> {
        log!(
            self.level(),
            "modbus[{}]: write {value} to register {register}",
            self.address
        );
        self.transact(WRITE_SINGLE_REGISTER, register, value).await
    }

    /// Send a request until a reply from our address arrives.  After the
    /// last attempt an empty response is returned.
    async fn transact(&mut self, function: u8, register: u16, operand: u16) -> Result<Response> {
        let frame = self
            .framer
            .encode(&request(self.address, function, register, operand));
        for attempt in 1..=self.retries {
            log!(self.level(), "modbus: attempt {attempt} of {}", self.retries);
            self.link.discard_input()?;
            self.link.write_all(&frame)?;
            settle(self.response_delay).await;

            let mut raw = Vec::new();
            let n = match self.framer {
                Framer::Ascii => self.link.read_line(&mut raw)?,
                Framer::Rtu => self.link.read_frame(&mut raw)?,
            };
            if n == 0 {
                debug!("modbus[{}]: no reply", self.address);
                continue;
            }
            let parsed = self
                .framer
                .decode(&raw)
                .and_then(|body| Response::parse(&body));
            match parsed {
                Ok(resp) if resp.address == Some(self.address) => return Ok(resp),
                Ok(resp) => warn!(
                    "modbus: {}",
                    ProtocolError::AddressMismatch {
                        expected: self.address,
                        got: resp.address.unwrap_or(0),
                    }
                ),
                Err(e) => warn!("modbus[{}]: {e}", self.address),
            }
        }
        Ok(Response::empty())
    }

    /// Single signed register divided by `factor`; 0 when nothing came back.
    pub async fn read_single_register_float(&mut self, register: u16, factor: u16) -> Result<f64> {
        let resp = self.read_registers(register, 1).await?.into_result()?;
        Ok(resp
            .signed(0)
            .map_or(0.0, |v| f64::from(v) / f64::from(factor)))
    }

    /// Single unsigned register divided by `factor`.
    pub async fn read_single_register_unsigned(
        &mut self,
        register: u16,
        factor: u16,
    ) -> Result<f64> {
        let resp = self.read_registers(register, 1).await?.into_result()?;
        Ok(resp
            .unsigned(0)
            .map_or(0.0, |v| f64::from(v) / f64::from(factor)))
    }

    /// Write `round(value · factor)`.  Returns the echoed value, or reads
    /// the register back when the echo is missing.
    pub async fn write_single_register_float(
        &mut self,
        register: u16,
        value: f64,
        factor: u16,
    ) -> Result<f64> {
        let raw = to_word(value * f64::from(factor));
        let resp = self.write_register(register, raw).await?.into_result()?;
        if resp.function == WRITE_SINGLE_REGISTER {
            if let Some(v) = resp.unsigned(0) {
                return Ok(f64::from(v) / f64::from(factor));
            }
        }
        self.read_single_register_unsigned(register, factor).await
    }

    /// Value split over two registers, high word first, divided by `factor`.
    pub async fn read_two_registers(&mut self, start: u16, factor: u16) -> Result<f64> {
        let resp = self.read_registers(start, 2).await?.into_result()?;
        Ok(resp.wide(0).map_or(0.0, |v| f64::from(v) / f64::from(factor)))
    }
}

/// Round to a 16-bit register word.  Negative values wrap to two's
/// complement; anything out of range saturates.
pub(crate) fn to_word(value: f64) -> u16 {
    let v = value.round();
    if v.is_nan() {
        0
    } else if v < 0.0 {
        (v.max(f64::from(i16::MIN)) as i16) as u16
    } else {
        v.min(f64::from(u16::MAX)) as u16
    }
}
