//! Erstevak gauge client over a serial link.

use core::time::Duration;

use log::{Level, debug, log, warn};

use super::protocol::{
    GaugeResponse, TERMINATOR, build_message, calibration_to_data, parse_response,
    pressure_to_data,
};
use crate::error::Result;
use crate::rs485::{DEFAULT_RESPONSE_DELAY, DEFAULT_RETRIES, SerialLink, settle};

/// Data that unlocks the atmosphere adjustment.
const UNLOCK_ATMOSPHERE: &str = "1";
/// Data that unlocks the zero adjustment.
const UNLOCK_ZERO: &str = "0";

pub struct ErstevakClient<L> {
    link: L,
    address: u8,
    retries: u8,
    response_delay: Duration,
    verbose: bool,
}

impl<L: SerialLink> ErstevakClient<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            address: 1,
            retries: DEFAULT_RETRIES,
            response_delay: DEFAULT_RESPONSE_DELAY,
            verbose: false,
        }
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
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

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    fn level(&self) -> Level {
        if self.verbose { Level::Info } else { Level::Debug }
    }

    /// Send `command` until a reply echoing the same command arrives.
    /// `None` when every attempt failed.
    pub async fn send_command(&mut self, command: u8, data: &str) -> Result<Option<GaugeResponse>> {
        let msg = build_message(command, data, self.address)?;
        for attempt in 1..=self.retries {
            log!(
                self.level(),
                "erstevak[{}]: {} {data:?} (attempt {attempt} of {})",
                self.address,
                command as char,
                self.retries
            );
            self.link.discard_input()?;
            self.link.write_all(&msg)?;
            settle(self.response_delay).await;

            let mut raw = Vec::new();
            if self.link.read_until(TERMINATOR, &mut raw)? == 0 {
                debug!("erstevak[{}]: no reply", self.address);
                continue;
            }
            match parse_response(&raw, self.address) {
                Ok(resp) if resp.command == command => return Ok(Some(resp)),
                Ok(resp) => debug!(
                    "erstevak[{}]: reply to {:?}, expected {:?}",
                    self.address, resp.command as char, command as char
                ),
                Err(e) => warn!("erstevak[{}]: {e}", self.address),
            }
        }
        Ok(None)
    }

    /// Gauge model string, empty when the gauge did not answer.
    pub async fn get_gauge_type(&mut self) -> Result<String> {
        let resp = self.send_command(b'T', "").await?;
        Ok(resp.and_then(|r| r.gauge_model).unwrap_or_default())
    }

    pub async fn get_pressure(&mut self) -> Result<f64> {
        let resp = self.send_command(b'M', "").await?;
        Ok(resp.and_then(|r| r.pressure).unwrap_or(0.0))
    }

    pub async fn get_setpoint(&mut self, sp: u8) -> Result<f64> {
        let resp = self.send_command(b'S', &sp.to_string()).await?;
        Ok(resp.and_then(|r| r.setpoint).unwrap_or(0.0))
    }

    /// Unlock setpoint `sp`, write `pressure`, and return what the gauge
    /// stored.  Falls back to reading the setpoint when the write fails.
    pub async fn set_setpoint(&mut self, pressure: f64, sp: u8) -> Result<f64> {
        let key = sp.to_string();
        if self.unlock(b's', &key).await? {
            let resp = self.send_command(b's', &pressure_to_data(pressure)).await?;
            if let Some(p) = resp.and_then(|r| r.setpoint).filter(|p| *p != 0.0) {
                return Ok(p);
            }
        }
        self.get_setpoint(sp).await
    }

    pub async fn get_calibration(&mut self, n: u8) -> Result<f64> {
        let resp = self.send_command(b'C', &n.to_string()).await?;
        Ok(resp.and_then(|r| r.calibration).unwrap_or(0.0))
    }

    /// Unlock coefficient `n` and write `cal` (a factor or a gas).
    pub async fn set_calibration(&mut self, cal: impl Into<f64>, n: u8) -> Result<f64> {
        let key = n.to_string();
        if self.unlock(b'c', &key).await? {
            let data = calibration_to_data(cal.into());
            let resp = self.send_command(b'c', &data).await?;
            if let Some(c) = resp.and_then(|r| r.calibration).filter(|c| *c != 0.0) {
                return Ok(c);
            }
        }
        self.get_calibration(n).await
    }

    /// Adjust the atmosphere point to 1000 mbar.  Returns the new reading,
    /// or 0 when the gauge refused.
    pub async fn set_atmosphere(&mut self) -> Result<f64> {
        self.adjust(UNLOCK_ATMOSPHERE, "100023").await
    }

    /// Adjust the zero point.
    pub async fn set_zero(&mut self) -> Result<f64> {
        self.adjust(UNLOCK_ZERO, "000000").await
    }

    async fn adjust(&mut self, unlock: &str, data: &str) -> Result<f64> {
        if self.unlock(b'j', unlock).await? {
            let resp = self.send_command(b'j', data).await?;
            if let Some(p) = resp.and_then(|r| r.pressure).filter(|p| *p != 0.0) {
                return Ok(p);
            }
        }
        Ok(0.0)
    }

    /// True when the gauge echoed the unlock key.
    async fn unlock(&mut self, command: u8, key: &str) -> Result<bool> {
        let resp = self.send_command(command, key).await?;
        let unlocked = resp.is_some_and(|r| r.data == key);
        if !unlocked {
            warn!(
                "erstevak[{}]: {} {key} was not unlocked",
                self.address, command as char
            );
        }
        Ok(unlocked)
    }

    pub async fn get_penning_state(&mut self) -> Result<bool> {
        let resp = self.send_command(b'I', "").await?;
        Ok(resp.and_then(|r| r.penning_enabled).unwrap_or(false))
    }

    pub async fn set_penning_state(&mut self, enable: bool) -> Result<bool> {
        let resp = self.send_command(b'i', if enable { "1" } else { "0" }).await?;
        match resp.and_then(|r| r.penning_enabled) {
            Some(state) => Ok(state),
            None => self.get_penning_state().await,
        }
    }

    pub async fn get_penning_sync(&mut self) -> Result<bool> {
        let resp = self.send_command(b'W', "").await?;
        Ok(resp.and_then(|r| r.penning_sync).unwrap_or(false))
    }

    pub async fn set_penning_sync(&mut self, enable: bool) -> Result<bool> {
        let data = format!("{:06}", u8::from(enable));
        let resp = self.send_command(b'w', &data).await?;
        match resp.and_then(|r| r.penning_sync) {
            Some(sync) => Ok(sync),
            None => self.get_penning_sync().await,
        }
    }
}
