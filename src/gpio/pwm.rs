//! PWM outputs.
//!
//! Two kinds of PWM live here:
//!
//! - software/generic PWM pins behind `embedded_hal::pwm::SetDutyCycle`
//!   (emulated by [`MockPwmPin`]);
//! - kernel hardware PWM channels behind [`HardwarePwm`], driven through
//!   sysfs on a Raspberry Pi ([`SysfsPwm`]) or kept in memory
//!   ([`StubHardwarePwm`]) when emulating.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::Backend;
use super::mock::MockPwmPin;
use crate::error::{ConfigError, GpioError, Result};

/// Lowest frequency any PWM backend accepts.
pub const MIN_FREQUENCY_HZ: f64 = 0.1;

// ───────────────────────────────────────────────────────────────
// Config
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PwmConfig {
    pub pin_number: u8,
    pub chip: u8,
    pub channel: u8,
    pub label: String,
    pub backend: Backend,
    pub emulation: bool,
    pub frequency: u32,
    pub active_high: bool,
    pub initial_value: f64,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            pin_number: 12,
            chip: 0,
            channel: 0,
            label: "PWM".to_owned(),
            backend: Backend::Gpiozero,
            emulation: true,
            frequency: 8000,
            active_high: true,
            initial_value: 0.0,
        }
    }
}

impl PwmConfig {
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.frequency == 0 {
            return Err(ConfigError::ValidationFailed("PWM frequency must be positive"));
        }
        if !(0.0..=1.0).contains(&self.initial_value) {
            return Err(ConfigError::ValidationFailed("PWM initial_value must be 0-1"));
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Hardware PWM channel
// ───────────────────────────────────────────────────────────────

/// Kernel-managed PWM channel.  Duty cycles are percentages (0–100).
pub trait HardwarePwm {
    fn start(&mut self, duty_percent: f64) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn change_duty_cycle(&mut self, duty_percent: f64) -> Result<()>;
    fn change_frequency(&mut self, hz: f64) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StubPwmState {
    pub chip: u8,
    pub channel: u8,
    pub duty_percent: f64,
    pub frequency_hz: f64,
    pub running: bool,
}

/// In-memory hardware PWM used when emulating.  Clones share state.
#[derive(Debug, Clone)]
pub struct StubHardwarePwm {
    state: Arc<Mutex<StubPwmState>>,
}

impl StubHardwarePwm {
    pub fn new(channel: u8, hz: f64, chip: u8) -> Self {
        Self {
            state: Arc::new(Mutex::new(StubPwmState {
                chip,
                channel,
                duty_percent: 0.0,
                frequency_hz: hz,
                running: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StubPwmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> StubPwmState {
        *self.lock()
    }

    pub fn channel(&self) -> u8 {
        self.lock().channel
    }
}

impl HardwarePwm for StubHardwarePwm {
    fn start(&mut self, duty_percent: f64) -> Result<()> {
        self.change_duty_cycle(duty_percent)?;
        self.lock().running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.change_duty_cycle(0.0)?;
        self.lock().running = false;
        Ok(())
    }

    fn change_duty_cycle(&mut self, duty_percent: f64) -> Result<()> {
        self.lock().duty_percent = duty_percent;
        Ok(())
    }

    fn change_frequency(&mut self, hz: f64) -> Result<()> {
        self.lock().frequency_hz = hz.abs().max(MIN_FREQUENCY_HZ);
        Ok(())
    }
}

/// Hardware PWM channel under `/sys/class/pwm/pwmchip<chip>/pwm<channel>`.
///
/// Periods are written in nanoseconds.  The duty cycle is rewritten after
/// every period change since the kernel stores it as an absolute time.
#[derive(Debug)]
pub struct SysfsPwm {
    chip_dir: PathBuf,
    channel: u8,
    duty_percent: f64,
    frequency_hz: f64,
}

impl SysfsPwm {
    pub const SYSFS_ROOT: &'static str = "/sys/class/pwm";

    pub fn open(channel: u8, hz: f64, chip: u8) -> Result<Self> {
        Self::open_at(Path::new(Self::SYSFS_ROOT), channel, hz, chip)
    }

    /// Open under a custom sysfs root (tests, chroots).
    pub fn open_at(root: &Path, channel: u8, hz: f64, chip: u8) -> Result<Self> {
        let chip_dir = root.join(format!("pwmchip{chip}"));
        if !chip_dir.is_dir() {
            warn!("pwm: {} missing, is the overlay loaded?", chip_dir.display());
            return Err(GpioError::Unsupported("rpi_hardware_pwm without pwm overlay").into());
        }
        let mut pwm = Self {
            chip_dir,
            channel,
            duty_percent: 0.0,
            frequency_hz: hz.abs().max(MIN_FREQUENCY_HZ),
        };
        if !pwm.channel_dir().is_dir() {
            fs::write(pwm.chip_dir.join("export"), channel.to_string())?;
        }
        let hz = pwm.frequency_hz;
        pwm.change_frequency(hz)?;
        Ok(pwm)
    }

    fn channel_dir(&self) -> PathBuf {
        self.chip_dir.join(format!("pwm{}", self.channel))
    }

    fn write_attr(&self, name: &str, value: &str) -> Result<()> {
        let path = self.channel_dir().join(name);
        debug!("pwm: {} <- {}", path.display(), value);
        fs::write(path, value).map_err(|_| GpioError::PwmWriteFailed.into())
    }

    fn period_ns(&self) -> u64 {
        (1e9 / self.frequency_hz).round() as u64
    }

    pub fn duty_percent(&self) -> f64 {
        self.duty_percent
    }

    pub fn frequency(&self) -> f64 {
        self.frequency_hz
    }
}

impl HardwarePwm for SysfsPwm {
    fn start(&mut self, duty_percent: f64) -> Result<()> {
        self.change_duty_cycle(duty_percent)?;
        self.write_attr("enable", "1")
    }

    fn stop(&mut self) -> Result<()> {
        self.change_duty_cycle(0.0)?;
        self.write_attr("enable", "0")
    }

    fn change_duty_cycle(&mut self, duty_percent: f64) -> Result<()> {
        let duty = duty_percent.clamp(0.0, 100.0);
        let duty_ns = (self.period_ns() as f64 * duty / 100.0).round() as u64;
        self.write_attr("duty_cycle", &duty_ns.to_string())?;
        self.duty_percent = duty;
        Ok(())
    }

    fn change_frequency(&mut self, hz: f64) -> Result<()> {
        self.frequency_hz = hz.abs().max(MIN_FREQUENCY_HZ);
        // Shrinking the period below the current duty is rejected by the
        // kernel, so clear the duty first.
        self.write_attr("duty_cycle", "0")?;
        self.write_attr("period", &self.period_ns().to_string())?;
        let duty = self.duty_percent;
        self.change_duty_cycle(duty)
    }
}

/// Either flavour of hardware PWM, as built by [`get_pwm`].
#[derive(Debug)]
pub enum HwPwm {
    Stub(StubHardwarePwm),
    Sysfs(SysfsPwm),
}

impl HardwarePwm for HwPwm {
    fn start(&mut self, duty_percent: f64) -> Result<()> {
        match self {
            Self::Stub(p) => p.start(duty_percent),
            Self::Sysfs(p) => p.start(duty_percent),
        }
    }

    fn stop(&mut self) -> Result<()> {
        match self {
            Self::Stub(p) => p.stop(),
            Self::Sysfs(p) => p.stop(),
        }
    }

    fn change_duty_cycle(&mut self, duty_percent: f64) -> Result<()> {
        match self {
            Self::Stub(p) => p.change_duty_cycle(duty_percent),
            Self::Sysfs(p) => p.change_duty_cycle(duty_percent),
        }
    }

    fn change_frequency(&mut self, hz: f64) -> Result<()> {
        match self {
            Self::Stub(p) => p.change_frequency(hz),
            Self::Sysfs(p) => p.change_frequency(hz),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Factory
// ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum PwmDevice {
    /// Generic duty-cycle pin.
    Pin(MockPwmPin),
    /// Kernel hardware PWM channel.
    Hardware(HwPwm),
}

pub fn get_pwm(pwm: &PwmConfig) -> Result<PwmDevice> {
    match &pwm.backend {
        Backend::Gpiozero if pwm.emulation => Ok(PwmDevice::Pin(MockPwmPin::new(
            pwm.pin_number,
            pwm.active_high,
            pwm.initial_value,
        ))),
        Backend::Gpiozero => Err(Backend::Gpiozero.unsupported().into()),
        Backend::RpiHardwarePwm if pwm.emulation => Ok(PwmDevice::Hardware(HwPwm::Stub(
            StubHardwarePwm::new(pwm.channel, f64::from(pwm.frequency), pwm.chip),
        ))),
        Backend::RpiHardwarePwm => Ok(PwmDevice::Hardware(HwPwm::Sysfs(SysfsPwm::open(
            pwm.channel,
            f64::from(pwm.frequency),
            pwm.chip,
        )?))),
        other => {
            warn!("{}: backend {other} is not available", pwm.label);
            Err(other.unsupported().into())
        }
    }
}
