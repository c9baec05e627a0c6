//! Intek SPE-B drive over Modbus.
//!
//! Register map:
//!
//! | Reg      | Access | Meaning                                         |
//! |----------|--------|-------------------------------------------------|
//! | `0x1000` | rw     | frequency setpoint, percent · 100               |
//! | `0x2000` | w      | command: 1 forward, 2 reverse, 5 stop, 7 reset  |
//! | `0x3000` | r      | status: 1 forward, 2 reverse, 3 stopped         |
//! | `0x3001` | r      | output frequency, Hz · 100                      |
//! | `0x3002` | r      | output current, A · 10                          |
//! | `0x3003` | r      | output voltage, V                               |
//! | `0x3004` | r      | output power, kW · 10                           |
//! | `0x8000` | r      | device fault code                               |
//! | `0x8001` | r      | communication fault code                        |

use log::{Level, log, warn};

use super::{Vfd, VfdFault, VfdParameters, VfdState};
use crate::error::Result;
use crate::rs485::{RegisterClient, SerialLink};

pub const REG_FREQUENCY_SETPOINT: u16 = 0x1000;
pub const REG_COMMAND: u16 = 0x2000;
pub const REG_STATUS: u16 = 0x3000;
pub const REG_FAULT: u16 = 0x8000;
pub const REG_FAULT_COM: u16 = 0x8001;

const STATUS_WORDS: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Command {
    Forward = 1,
    Reverse = 2,
    Stop = 5,
    FaultReset = 7,
}

pub static ERROR_CODES: [VfdFault; 38] = [
    VfdFault::NONE,
    VfdFault::new(1, "Reserved"),
    VfdFault::new(2, "Current overload during acceleration"),
    VfdFault::new(3, "Current overload during deceleration"),
    VfdFault::new(4, "Current overload at constant speed"),
    VfdFault::new(5, "Voltage overload during acceleration"),
    VfdFault::new(6, "Voltage overload during deceleration"),
    VfdFault::new(7, "Voltage overload at constant speed"),
    VfdFault::new(8, "Control circuits power failure"),
    VfdFault::new(9, "Undervoltage error"),
    VfdFault::new(10, "VFD overload"),
    VfdFault::new(11, "Motor overload"),
    VfdFault::new(12, "Input phase error"),
    VfdFault::new(13, "Output phase error"),
    VfdFault::new(14, "Overheat of power converter"),
    VfdFault::new(15, "External error"),
    VfdFault::new(16, "Remote connection error"),
    VfdFault::new(17, "Internal contactor failure"),
    VfdFault::new(18, "Current sensor failure"),
    VfdFault::new(19, "Automatic motor tuning failure"),
    VfdFault::new(21, "EEPROM IO error"),
    VfdFault::new(22, "VFD hardware error"),
    VfdFault::new(23, "Grounding failure"),
    VfdFault::new(24, "Reserved"),
    VfdFault::new(25, "Reserved"),
    VfdFault::new(26, "Total operation timeout"),
    VfdFault::new(27, "User error 1"),
    VfdFault::new(28, "User error 2"),
    VfdFault::new(29, "Power on timeout"),
    VfdFault::new(30, "Underloaded error"),
    VfdFault::new(31, "PID feedback connection loss"),
    VfdFault::new(40, "IGBT current limiter failure"),
    VfdFault::new(41, "Running motor switch error"),
    VfdFault::new(42, "Speed error"),
    VfdFault::new(43, "Over speed error"),
    VfdFault::new(45, "Motor overheat error"),
    VfdFault::new(92, "Positioning error"),
    VfdFault::new(94, "Calculated speed error"),
];

pub static ERROR_CODES_COM: [VfdFault; 9] = [
    VfdFault::NONE,
    VfdFault::new(1, "Wrong password"),
    VfdFault::new(2, "Command code error"),
    VfdFault::new(3, "CRC error"),
    VfdFault::new(4, "Invalid address"),
    VfdFault::new(5, "Invalid parameter"),
    VfdFault::new(6, "Parameter can not be edited"),
    VfdFault::new(7, "System is blocked"),
    VfdFault::new(8, "EEPROM write during operation"),
];

fn status_to_state(word: u16) -> VfdState {
    match word {
        1 => VfdState::RunningForward,
        2 => VfdState::RunningReverse,
        _ => VfdState::Stopped,
    }
}

pub struct IntekSpeB<L> {
    client: RegisterClient<L>,
}

impl<L: SerialLink> IntekSpeB<L> {
    pub fn new(client: RegisterClient<L>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RegisterClient<L> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut RegisterClient<L> {
        &mut self.client
    }

    fn level(&self) -> Level {
        if self.client.verbose() { Level::Info } else { Level::Debug }
    }

    async fn command(&mut self, command: Command) -> Result<()> {
        log!(
            self.level(),
            "intek[{}]: command {command:?}",
            self.client.address()
        );
        let resp = self
            .client
            .write_register(REG_COMMAND, command as u16)
            .await?
            .into_result()?;
        if resp.is_empty() {
            warn!("intek[{}]: {command:?} not acknowledged", self.client.address());
        }
        Ok(())
    }

    pub async fn start_reverse(&mut self) -> Result<()> {
        self.command(Command::Reverse).await
    }

    /// Write the frequency setpoint as a percentage of the maximum.
    pub async fn set_frequency_percent(&mut self, percent: f64) -> Result<f64> {
        let percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
        self.client
            .write_single_register_float(REG_FREQUENCY_SETPOINT, percent, 100)
            .await
    }

    pub async fn get_frequency_percent(&mut self) -> Result<f64> {
        self.client
            .read_single_register_unsigned(REG_FREQUENCY_SETPOINT, 100)
            .await
    }

    /// Read and decode the active device fault.
    pub async fn read_fault(&mut self) -> Result<VfdFault> {
        let code = self.read_error_code().await?;
        Ok(self.parse_error_code(code))
    }

    pub async fn read_fault_com(&mut self) -> Result<VfdFault> {
        let code = self.read_error_code_com().await?;
        Ok(self.parse_error_code_com(code))
    }

    async fn read_code(&mut self, register: u16) -> Result<u16> {
        let resp = self.client.read_registers(register, 1).await?.into_result()?;
        Ok(resp.unsigned(0).unwrap_or(0))
    }
}

impl<L: SerialLink> Vfd for IntekSpeB<L> {
    fn error_codes(&self) -> &'static [VfdFault] {
        &ERROR_CODES
    }

    fn error_codes_com(&self) -> &'static [VfdFault] {
        &ERROR_CODES_COM
    }

    async fn read_error_code(&mut self) -> Result<u16> {
        self.read_code(REG_FAULT).await
    }

    async fn read_error_code_com(&mut self) -> Result<u16> {
        self.read_code(REG_FAULT_COM).await
    }

    async fn clear_error(&mut self) -> Result<u16> {
        self.command(Command::FaultReset).await?;
        self.read_error_code().await
    }

    async fn read_parameters(&mut self) -> Result<VfdParameters> {
        let frequency_percent = self.get_frequency_percent().await?;
        let resp = self
            .client
            .read_registers(REG_STATUS, STATUS_WORDS)
            .await?
            .into_result()?;
        let word = |i: usize| f64::from(resp.unsigned(i).unwrap_or(0));
        let state = resp.unsigned(0).map_or(VfdState::Stopped, status_to_state);
        Ok(VfdParameters {
            frequency: word(1) / 100.0,
            frequency_percent,
            output_current: word(2) / 10.0,
            output_voltage: word(3),
            output_power: word(4) / 10.0,
            started: state.is_running(),
            state,
        })
    }

    async fn start(&mut self) -> Result<()> {
        self.command(Command::Forward).await
    }

    async fn stop(&mut self) -> Result<()> {
        self.command(Command::Stop).await
    }
}
