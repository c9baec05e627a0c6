//! RS-485 connection settings, checksums, the serial port abstraction and
//! Modbus framing.
//!
//! ```text
//! ┌──────────────┐    ┌────────────────┐    ┌──────────────────┐
//! │ device client│───▶│ RegisterClient │───▶│ SerialLink       │
//! │ (Qtm, Vfd)   │    │ Modbus framer  │    │ serialport / mock│
//! └──────────────┘    └────────────────┘    └──────────────────┘
//! ```
//!
//! Devices with their own wire format (Erstevak gauges) talk to a
//! [`SerialLink`] directly.

pub mod checksum;
pub mod link;
pub mod modbus;

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub use checksum::{check_lrc, crc16_modbus, lrc};
#[cfg(feature = "serial")]
pub use link::SerialPortLink;
pub use link::{NullLink, SerialLink};
pub use modbus::{Framer, RegisterClient, Response};

/// Delay between a request and reading its response.
pub const DEFAULT_RESPONSE_DELAY: Duration = Duration::from_millis(5);
/// Request attempts before a client gives up.
pub const DEFAULT_RETRIES: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parity {
    #[default]
    #[serde(rename = "N")]
    None,
    #[serde(rename = "E")]
    Even,
    #[serde(rename = "O")]
    Odd,
    #[serde(rename = "M")]
    Mark,
    #[serde(rename = "S")]
    Space,
}

/// Plain serial line settings.  Timeouts are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConnectionConfig {
    pub port: String,
    pub baudrate: u32,
    pub bytesize: u8,
    pub parity: Parity,
    pub stopbits: u8,
    pub timeout: Option<f64>,
    pub write_timeout: Option<f64>,
    pub inter_byte_timeout: Option<f64>,
}

impl Default for SerialConnectionConfig {
    fn default() -> Self {
        Self {
            port: "/dev/serial0".to_owned(),
            baudrate: 9600,
            bytesize: 8,
            parity: Parity::None,
            stopbits: 1,
            timeout: None,
            write_timeout: None,
            inter_byte_timeout: None,
        }
    }
}

fn validate_line(baudrate: u32, bytesize: u8, stopbits: u8) -> Result<(), ConfigError> {
    if baudrate == 0 {
        return Err(ConfigError::ValidationFailed("baudrate must be positive"));
    }
    if !(5..=8).contains(&bytesize) {
        return Err(ConfigError::ValidationFailed("bytesize must be 5-8"));
    }
    if !(1..=2).contains(&stopbits) {
        return Err(ConfigError::ValidationFailed("stopbits must be 1 or 2"));
    }
    Ok(())
}

impl SerialConnectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_line(self.baudrate, self.bytesize, self.stopbits)?;
        let timeouts = [self.timeout, self.write_timeout, self.inter_byte_timeout];
        if timeouts.iter().flatten().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(ConfigError::ValidationFailed("timeouts must be >= 0 s"));
        }
        Ok(())
    }
}

/// Serial line settings for a Modbus device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusSerialConnectionConfig {
    pub framer: Framer,
    pub port: String,
    pub baudrate: u32,
    pub bytesize: u8,
    pub parity: Parity,
    pub stopbits: u8,
}

impl Default for ModbusSerialConnectionConfig {
    fn default() -> Self {
        Self {
            framer: Framer::Rtu,
            port: "/dev/serial0".to_owned(),
            baudrate: 9600,
            bytesize: 8,
            parity: Parity::None,
            stopbits: 1,
        }
    }
}

impl ModbusSerialConnectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_line(self.baudrate, self.bytesize, self.stopbits)
    }

    /// Inter-byte silence that ends a frame. Only RTU frames need one.
    pub fn frame_gap(&self) -> Option<Duration> {
        match self.framer {
            Framer::Rtu => Some(rtu_frame_gap(
                self.baudrate,
                self.bytesize,
                self.parity,
                self.stopbits,
            )),
            Framer::Ascii => None,
        }
    }
}

/// Fixed RTU gap above 19200 baud.
const RTU_FAST_GAP: Duration = Duration::from_micros(1750);

/// 3.5 character times on the given line, or 1.75 ms above 19200 baud.
pub fn rtu_frame_gap(baudrate: u32, bytesize: u8, parity: Parity, stopbits: u8) -> Duration {
    if baudrate > 19_200 {
        return RTU_FAST_GAP;
    }
    let parity_bit = u64::from(parity != Parity::None);
    let char_bits = 1 + u64::from(bytesize) + parity_bit + u64::from(stopbits);
    // 3.5 chars = 7 half-chars
    let micros = 7 * char_bits * 1_000_000 / (2 * u64::from(baudrate.max(1)));
    Duration::from_micros(micros)
}

impl From<&ModbusSerialConnectionConfig> for SerialConnectionConfig {
    fn from(m: &ModbusSerialConnectionConfig) -> Self {
        Self {
            port: m.port.clone(),
            baudrate: m.baudrate,
            bytesize: m.bytesize,
            parity: m.parity,
            stopbits: m.stopbits,
            ..Self::default()
        }
    }
}

impl From<&SerialConnectionConfig> for ModbusSerialConnectionConfig {
    /// Serial settings carry no framer; the RTU default applies.
    fn from(s: &SerialConnectionConfig) -> Self {
        Self {
            framer: Framer::Rtu,
            port: s.port.clone(),
            baudrate: s.baudrate,
            bytesize: s.bytesize,
            parity: s.parity,
            stopbits: s.stopbits,
        }
    }
}

/// Wait for the device to answer.  A zero delay returns immediately.
pub(crate) async fn settle(delay: Duration) {
    if !delay.is_zero() {
        async_io_mini::Timer::after(delay).await;
    }
}
