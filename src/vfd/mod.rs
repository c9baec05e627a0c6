//! Variable frequency drives.
//!
//! [`Vfd`] is the common control surface. [`IntekSpeB`] drives an Intek
//! SPE-B over Modbus; [`EmulatedVfd`] keeps the same state in memory for
//! benches without a drive attached.

pub mod intek;

use core::fmt;
use core::time::Duration;

use log::info;
use serde::Serialize;

use crate::error::Result;
use crate::rs485::{DEFAULT_RESPONSE_DELAY, settle};

pub use intek::IntekSpeB;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum VfdState {
    #[default]
    #[serde(rename = "Stopped")]
    Stopped,
    #[serde(rename = "Running forward")]
    RunningForward,
    #[serde(rename = "Running reverse")]
    RunningReverse,
}

impl VfdState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::RunningForward => "Running forward",
            Self::RunningReverse => "Running reverse",
        }
    }

    pub const fn is_running(self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

impl fmt::Display for VfdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fault code and its description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VfdFault {
    pub code: u16,
    pub message: &'static str,
}

impl VfdFault {
    pub const NONE: Self = Self::new(0, "No error");

    pub const fn new(code: u16, message: &'static str) -> Self {
        Self { code, message }
    }

    pub const fn unknown(code: u16) -> Self {
        Self::new(code, "Unknown error")
    }

    pub const fn is_fault(&self) -> bool {
        self.code != 0
    }

    /// Look `code` up in `table`.
    pub fn lookup(table: &[Self], code: u16) -> Self {
        table
            .iter()
            .find(|f| f.code == code)
            .copied()
            .unwrap_or(Self::unknown(code))
    }
}

impl fmt::Display for VfdFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Snapshot of the drive's operating point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct VfdParameters {
    /// Output frequency, Hz.
    pub frequency: f64,
    /// Frequency setpoint, percent of maximum.
    pub frequency_percent: f64,
    /// A.
    pub output_current: f64,
    /// V.
    pub output_voltage: f64,
    /// kW.
    pub output_power: f64,
    pub started: bool,
    pub state: VfdState,
}

const NO_FAULTS: &[VfdFault] = &[VfdFault::NONE];

/// Control surface shared by every drive.
#[allow(async_fn_in_trait)]
pub trait Vfd {
    /// Device fault table.
    fn error_codes(&self) -> &'static [VfdFault] {
        NO_FAULTS
    }

    /// Communication fault table.
    fn error_codes_com(&self) -> &'static [VfdFault] {
        NO_FAULTS
    }

    async fn read_error_code(&mut self) -> Result<u16>;

    async fn read_error_code_com(&mut self) -> Result<u16>;

    fn parse_error_code(&self, code: u16) -> VfdFault {
        VfdFault::lookup(self.error_codes(), code)
    }

    fn parse_error_code_com(&self, code: u16) -> VfdFault {
        VfdFault::lookup(self.error_codes_com(), code)
    }

    /// Reset the active fault.  Returns the fault code read afterwards.
    async fn clear_error(&mut self) -> Result<u16>;

    async fn read_parameters(&mut self) -> Result<VfdParameters>;

    async fn start(&mut self) -> Result<()>;

    async fn stop(&mut self) -> Result<()>;
}

/// In-memory drive.  Never faults; frequency follows the setpoint while
/// running.
#[derive(Debug, Clone)]
pub struct EmulatedVfd {
    label: String,
    response_delay: Duration,
    max_frequency: f64,
    frequency_percent: f64,
    state: VfdState,
}

impl Default for EmulatedVfd {
    fn default() -> Self {
        Self::new(50.0)
    }
}

impl EmulatedVfd {
    pub fn new(max_frequency: f64) -> Self {
        Self {
            label: "VFD".to_owned(),
            response_delay: DEFAULT_RESPONSE_DELAY,
            max_frequency,
            frequency_percent: 0.0,
            state: VfdState::Stopped,
        }
    }

    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    pub fn state(&self) -> VfdState {
        self.state
    }

    pub async fn start_reverse(&mut self) -> Result<()> {
        settle(self.response_delay).await;
        self.state = VfdState::RunningReverse;
        info!("{}: {}", self.label, self.state);
        Ok(())
    }

    pub async fn set_frequency_percent(&mut self, percent: f64) -> Result<f64> {
        settle(self.response_delay).await;
        self.frequency_percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
        Ok(self.frequency_percent)
    }
}

impl Vfd for EmulatedVfd {
    async fn read_error_code(&mut self) -> Result<u16> {
        settle(self.response_delay).await;
        Ok(0)
    }

    async fn read_error_code_com(&mut self) -> Result<u16> {
        settle(self.response_delay).await;
        Ok(0)
    }

    async fn clear_error(&mut self) -> Result<u16> {
        settle(self.response_delay).await;
        Ok(0)
    }

    async fn read_parameters(&mut self) -> Result<VfdParameters> {
        settle(self.response_delay).await;
        let running = self.state.is_running();
        Ok(VfdParameters {
            frequency: if running {
                self.max_frequency * self.frequency_percent / 100.0
            } else {
                0.0
            },
            frequency_percent: self.frequency_percent,
            started: running,
            state: self.state,
            ..VfdParameters::default()
        })
    }

    async fn start(&mut self) -> Result<()> {
        settle(self.response_delay).await;
        self.state = VfdState::RunningForward;
        info!("{}: {}", self.label, self.state);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        settle(self.response_delay).await;
        self.state = VfdState::Stopped;
        info!("{}: {}", self.label, self.state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::block_on;

    #[test]
    fn fault_lookup() {
        let table = [VfdFault::NONE, VfdFault::new(9, "Undervoltage error")];
        assert_eq!(VfdFault::lookup(&table, 9).message, "Undervoltage error");
        assert_eq!(VfdFault::lookup(&table, 77), VfdFault::unknown(77));
        assert!(!VfdFault::lookup(&table, 0).is_fault());
        assert_eq!(VfdFault::unknown(5).to_string(), "Unknown error (5)");
    }

    #[test]
    fn default_tables_know_only_no_error() {
        let vfd = EmulatedVfd::default();
        assert_eq!(vfd.parse_error_code(0), VfdFault::NONE);
        assert_eq!(vfd.parse_error_code_com(3).message, "Unknown error");
    }

    #[test]
    fn emulated_drive_runs_at_setpoint() {
        let mut vfd = EmulatedVfd::new(50.0).with_response_delay(Duration::ZERO);
        block_on(async {
            assert_eq!(vfd.set_frequency_percent(40.0).await.unwrap(), 40.0);
            let p = vfd.read_parameters().await.unwrap();
            assert_eq!(p.frequency, 0.0);
            assert!(!p.started);

            vfd.start().await.unwrap();
            let p = vfd.read_parameters().await.unwrap();
            assert_eq!(p.frequency, 20.0);
            assert_eq!(p.state, VfdState::RunningForward);

            vfd.start_reverse().await.unwrap();
            assert_eq!(vfd.state(), VfdState::RunningReverse);
            vfd.stop().await.unwrap();
            assert!(!vfd.state().is_running());
            assert_eq!(vfd.clear_error().await.unwrap(), 0);
        });
    }

    #[test]
    fn state_serialises_as_display_name() {
        let json = serde_json::to_string(&VfdState::RunningReverse).unwrap();
        assert_eq!(json, "\"Running reverse\"");
    }
}
