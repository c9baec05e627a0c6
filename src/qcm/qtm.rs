//! CYKY TM106B quartz thickness monitor.
//!
//! The monitor speaks Modbus (ASCII on its RS-485 port) and exposes 16
//! holding registers:
//!
//! | Reg  | Quantity            | Scale  | Range          |
//! |------|---------------------|--------|----------------|
//! | 0    | firmware version    | /100   |                |
//! | 1-2  | thickness, Å        | /100   | 32-bit         |
//! | 3-4  | rate, Å/s           | /100   | 32-bit         |
//! | 5-6  | frequency, Hz       | /100   | 32-bit         |
//! | 7    | PWM, %              | /100   | 0-99.99        |
//! | 8    | CON  `0xABC0`       | nibbles| a 0-11, b/c 0-2|
//! | 9    | RUN  `0x00YX`       | nibbles| 0-1            |
//! | 10   | density, g/cm³      | /100   | 0.4-99.99      |
//! | 11   | Z-ratio             | /1000  | 0.1-9.999      |
//! | 12   | scale factor        | /1000  | 1-65.535       |
//! | 13   | rate range, Å/s     | 1      | 0-9999         |
//! | 14   | bus address         | 1      | 1-254          |
//! | 15   | baud code `0xN000`  | nibble | 0-5            |
//!
//! All single registers are read unsigned.

use log::{info, warn};

use super::materials::Material;
use crate::error::{ProtocolError, Result};
use crate::rs485::modbus::Response;
use crate::rs485::{RegisterClient, SerialLink, settle};

pub const REG_VERSION: u16 = 0;
pub const REG_THICKNESS: u16 = 1;
pub const REG_RATE: u16 = 3;
pub const REG_FREQUENCY: u16 = 5;
pub const REG_PWM: u16 = 7;
pub const REG_CON: u16 = 8;
pub const REG_RUN: u16 = 9;
pub const REG_DENSITY: u16 = 10;
pub const REG_Z_RATIO: u16 = 11;
pub const REG_SCALE: u16 = 12;
pub const REG_RANGE: u16 = 13;
pub const REG_ADDRESS: u16 = 14;
pub const REG_BAUDRATE: u16 = 15;
pub const REGISTER_COUNT: u16 = 16;

const BAUD_RATES: [u32; 6] = [1200, 2400, 4800, 9600, 19200, 38400];
const DEFAULT_BAUD_CODE: u8 = 3;

/// Baud rate for a register code; 0 for unknown codes.
pub fn code_to_baudrate(code: u8) -> u32 {
    BAUD_RATES.get(usize::from(code)).copied().unwrap_or(0)
}

/// Register code for a baud rate; unsupported rates map to 9600.
pub fn baudrate_to_code(baud: u32) -> u8 {
    BAUD_RATES
        .iter()
        .position(|&b| b == baud)
        .map_or(DEFAULT_BAUD_CODE, |i| i as u8)
}

fn nibble(word: u16, index: u8) -> u8 {
    ((word >> (12 - 4 * index)) & 0xF) as u8
}

/// Measurement configuration (register 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Con {
    /// Gate time in 100 ms steps (0-11).
    pub gate: u8,
    /// Analog output: 0 stopped, 1 auto, 2 manual.
    pub analog_mode: u8,
    /// Rate algorithm: 0 immediate, 1 weighted, 2 ten-sample average.
    pub rate_mode: u8,
}

impl Con {
    pub fn new(gate: u8, analog_mode: u8, rate_mode: u8) -> Self {
        Self {
            gate: gate.min(11),
            analog_mode: analog_mode.min(2),
            rate_mode: rate_mode.min(2),
        }
    }

    pub fn gate_time_ms(&self) -> u32 {
        u32::from(self.gate) * 100
    }

    pub fn to_word(self) -> u16 {
        u16::from(self.gate) << 12 | u16::from(self.analog_mode) << 8 | u16::from(self.rate_mode) << 4
    }

    pub fn from_word(word: u16) -> Self {
        Self {
            gate: nibble(word, 0),
            analog_mode: nibble(word, 1),
            rate_mode: nibble(word, 2),
        }
    }
}

/// Run control (register 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Run {
    pub running: bool,
    /// Thickness is zeroed when the run starts.
    pub reset: bool,
}

impl Run {
    pub const START: Self = Self {
        running: true,
        reset: true,
    };
    pub const STOP: Self = Self {
        running: false,
        reset: false,
    };

    pub fn to_word(self) -> u16 {
        u16::from(self.reset) << 4 | u16::from(self.running)
    }

    pub fn from_word(word: u16) -> Self {
        Self {
            running: nibble(word, 3) != 0,
            reset: nibble(word, 2) != 0,
        }
    }
}

/// Every register decoded from one bulk read.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QtmState {
    pub version: f64,
    pub thickness: f64,
    pub rate: f64,
    pub frequency: f64,
    pub pwm: f64,
    pub con: Con,
    pub run: Run,
    pub density: f64,
    pub z_ratio: f64,
    pub scale: f64,
    pub range: u16,
    pub address: u8,
    pub baudrate: u32,
}

impl QtmState {
    /// Decode a 16-register read.  Short replies give the default state.
    pub fn from_response(resp: &Response) -> Self {
        let d = &resp.data;
        if d.len() < usize::from(REGISTER_COUNT) {
            return Self::default();
        }
        let wide = |i: usize| resp.wide(i).map_or(0.0, f64::from);
        Self {
            version: f64::from(d[0]) / 100.0,
            thickness: wide(1) / 100.0,
            rate: wide(3) / 100.0,
            frequency: wide(5) / 100.0,
            pwm: f64::from(d[7]) / 100.0,
            con: Con::from_word(d[8]),
            run: Run::from_word(d[9]),
            density: f64::from(d[10]) / 100.0,
            z_ratio: f64::from(d[11]) / 1000.0,
            scale: f64::from(d[12]) / 1000.0,
            range: d[13],
            address: d[14].min(255) as u8,
            baudrate: code_to_baudrate(nibble(d[15], 0)),
        }
    }
}

pub struct Qtm<L> {
    client: RegisterClient<L>,
    label: String,
}

impl<L: SerialLink> Qtm<L> {
    pub fn new(client: RegisterClient<L>) -> Self {
        Self {
            client,
            label: "QTM".to_owned(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn client(&self) -> &RegisterClient<L> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut RegisterClient<L> {
        &mut self.client
    }

    pub fn address(&self) -> u8 {
        self.client.address()
    }

    async fn read_word(&mut self, register: u16) -> Result<Option<u16>> {
        let resp = self.client.read_registers(register, 1).await?.into_result()?;
        Ok(resp.unsigned(0))
    }

    async fn read_scaled(&mut self, register: u16, factor: u16) -> Result<f64> {
        self.client
            .read_single_register_unsigned(register, factor)
            .await
    }

    pub async fn get_version(&mut self) -> Result<f64> {
        self.read_scaled(REG_VERSION, 100).await
    }

    /// Film thickness, Å.
    pub async fn get_thickness(&mut self) -> Result<f64> {
        self.client.read_two_registers(REG_THICKNESS, 100).await
    }

    /// Deposition rate, Å/s.
    pub async fn get_rate(&mut self) -> Result<f64> {
        self.client.read_two_registers(REG_RATE, 100).await
    }

    /// Crystal frequency, Hz.
    pub async fn get_frequency(&mut self) -> Result<f64> {
        self.client.read_two_registers(REG_FREQUENCY, 100).await
    }

    pub async fn get_pwm(&mut self) -> Result<f64> {
        self.read_scaled(REG_PWM, 100).await
    }

    pub async fn set_pwm(&mut self, pwm: f64) -> Result<f64> {
        let pwm = pwm.clamp(0.0, 99.99);
        self.client
            .write_single_register_float(REG_PWM, pwm, 100)
            .await
    }

    pub async fn get_con(&mut self) -> Result<Con> {
        let con = self.read_word(REG_CON).await?.map(Con::from_word).unwrap_or_default();
        if self.client.verbose() {
            info!(
                "{}: gate {} ms, analog mode {}, rate mode {}",
                self.label,
                con.gate_time_ms(),
                con.analog_mode,
                con.rate_mode
            );
        }
        Ok(con)
    }

    pub async fn set_con(&mut self, con: Con) -> Result<Response> {
        let con = Con::new(con.gate, con.analog_mode, con.rate_mode);
        self.client.write_register(REG_CON, con.to_word()).await
    }

    pub async fn get_run(&mut self) -> Result<Run> {
        Ok(self.read_word(REG_RUN).await?.map(Run::from_word).unwrap_or_default())
    }

    pub async fn set_run(&mut self, run: Run) -> Result<Response> {
        self.client.write_register(REG_RUN, run.to_word()).await
    }

    /// Start measuring with the thickness reset.
    pub async fn start_measurement(&mut self) -> Result<Response> {
        self.set_run(Run::START).await
    }

    pub async fn stop_measurement(&mut self) -> Result<Response> {
        self.set_run(Run::STOP).await
    }

    pub async fn get_density(&mut self) -> Result<f64> {
        self.read_scaled(REG_DENSITY, 100).await
    }

    pub async fn set_density(&mut self, density: f64) -> Result<f64> {
        let density = density.clamp(0.4, 99.99);
        self.client
            .write_single_register_float(REG_DENSITY, density, 100)
            .await
    }

    pub async fn get_z_ratio(&mut self) -> Result<f64> {
        self.read_scaled(REG_Z_RATIO, 1000).await
    }

    pub async fn set_z_ratio(&mut self, z_ratio: f64) -> Result<f64> {
        let z_ratio = z_ratio.clamp(0.1, 9.999);
        self.client
            .write_single_register_float(REG_Z_RATIO, z_ratio, 1000)
            .await
    }

    pub async fn get_scale(&mut self) -> Result<f64> {
        self.read_scaled(REG_SCALE, 1000).await
    }

    pub async fn set_scale(&mut self, scale: f64) -> Result<f64> {
        let scale = scale.clamp(1.0, 65.535);
        self.client
            .write_single_register_float(REG_SCALE, scale, 1000)
            .await
    }

    pub async fn get_range(&mut self) -> Result<u16> {
        Ok(self.read_word(REG_RANGE).await?.unwrap_or(0))
    }

    pub async fn set_range(&mut self, range: u16) -> Result<u16> {
        let range = range.min(9999);
        let v = self
            .client
            .write_single_register_float(REG_RANGE, f64::from(range), 1)
            .await?;
        Ok(v as u16)
    }

    pub async fn get_address(&mut self) -> Result<u8> {
        Ok(self.read_word(REG_ADDRESS).await?.map_or(0, |w| w.min(255) as u8))
    }

    /// Move the monitor to a new bus address.  The client follows when
    /// the monitor confirms an address in 1-254.
    pub async fn set_address(&mut self, address: u8) -> Result<u8> {
        let address = address.clamp(1, 254);
        let v = self
            .client
            .write_single_register_float(REG_ADDRESS, f64::from(address), 1)
            .await?;
        let confirmed = v as u8;
        if (1..=254).contains(&confirmed) {
            self.client.set_address(confirmed);
        } else {
            warn!("{}: address change to {address} not confirmed", self.label);
        }
        Ok(confirmed)
    }

    pub async fn get_baudrate(&mut self) -> Result<u32> {
        let code = self.read_word(REG_BAUDRATE).await?.map_or(0, |w| nibble(w, 0));
        Ok(code_to_baudrate(code))
    }

    /// Switch the monitor's baud rate and retune the link to match.
    pub async fn set_baudrate(&mut self, baud: u32) -> Result<u32> {
        let word = u16::from(baudrate_to_code(baud)) << 12;
        let echo = self.client.write_register(REG_BAUDRATE, word).await?.into_result()?;
        let Some(word) = echo.unsigned(0) else {
            warn!("{}: baud rate change not confirmed", self.label);
            return Err(ProtocolError::NoResponse.into());
        };
        let confirmed = code_to_baudrate(nibble(word, 0));
        if confirmed != 0 {
            self.client.set_baud_rate(confirmed)?;
        }
        Ok(confirmed)
    }

    /// All 16 registers in one request.
    pub async fn get_state(&mut self) -> Result<QtmState> {
        let resp = self
            .client
            .read_registers(REG_VERSION, REGISTER_COUNT)
            .await?
            .into_result()?;
        Ok(QtmState::from_response(&resp))
    }

    /// Load a material's density and Z-ratio.
    pub async fn set_material(&mut self, material: &Material) -> Result<()> {
        let delay = self.client.response_delay();
        self.set_density(material.density).await?;
        settle(delay).await;
        self.set_z_ratio(material.z_ratio).await?;
        settle(delay).await;
        info!("{}: material set to {}", self.label, material.symbol);
        Ok(())
    }
}
