//! Erstevak MTP4D / MTM9D gauges.

pub mod client;
pub mod protocol;

use core::fmt;

use super::model_key;

pub use client::ErstevakClient;
pub use protocol::{GaugeResponse, build_message, parse_response};

/// Pirani correction factors (calibration coefficient 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiraniGas {
    Air,
    Ar,
    Co,
    Co2,
    H2,
    He,
    N2,
    Ne,
    Kr,
}

impl PiraniGas {
    pub const ALL: [Self; 9] = [
        Self::Air,
        Self::Ar,
        Self::Co,
        Self::Co2,
        Self::H2,
        Self::He,
        Self::N2,
        Self::Ne,
        Self::Kr,
    ];

    pub const fn factor(self) -> f64 {
        match self {
            Self::Air | Self::Co | Self::He | Self::N2 => 1.0,
            Self::Ar => 1.6,
            Self::Co2 => 0.89,
            Self::H2 => 0.57,
            Self::Ne => 1.4,
            Self::Kr => 2.4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Air => "AIR",
            Self::Ar => "AR",
            Self::Co => "CO",
            Self::Co2 => "CO2",
            Self::H2 => "H2",
            Self::He => "HE",
            Self::N2 => "N2",
            Self::Ne => "NE",
            Self::Kr => "KR",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let key = model_key(name);
        Self::ALL.into_iter().find(|g| g.name() == key)
    }
}

/// Penning correction factors (calibration coefficient 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PenningGas {
    Air,
    Ar,
    Co2,
    H2,
    He,
    N2,
    Ne,
    Kr,
    Xe,
}

impl PenningGas {
    pub const ALL: [Self; 9] = [
        Self::Air,
        Self::Ar,
        Self::Co2,
        Self::H2,
        Self::He,
        Self::N2,
        Self::Ne,
        Self::Kr,
        Self::Xe,
    ];

    pub const fn factor(self) -> f64 {
        match self {
            Self::Air | Self::N2 => 1.0,
            Self::Ar => 0.8,
            Self::Co2 => 0.74,
            Self::H2 => 2.4,
            Self::He => 5.9,
            Self::Ne => 3.5,
            Self::Kr => 0.6,
            Self::Xe => 0.41,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Air => "AIR",
            Self::Ar => "AR",
            Self::Co2 => "CO2",
            Self::H2 => "H2",
            Self::He => "HE",
            Self::N2 => "N2",
            Self::Ne => "NE",
            Self::Kr => "KR",
            Self::Xe => "XE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let key = model_key(name);
        Self::ALL.into_iter().find(|g| g.name() == key)
    }
}

impl From<PiraniGas> for f64 {
    fn from(g: PiraniGas) -> Self {
        g.factor()
    }
}

impl From<PenningGas> for f64 {
    fn from(g: PenningGas) -> Self {
        g.factor()
    }
}

impl fmt::Display for PiraniGas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for PenningGas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    /// Pirani.
    Mtp4d,
    /// Pirani + Penning combination.
    Mtm9d,
}

impl Model {
    pub fn from_name(name: &str) -> Option<Self> {
        match model_key(name).as_str() {
            "MTP4D" => Some(Self::Mtp4d),
            "MTM9D" => Some(Self::Mtm9d),
            _ => None,
        }
    }

    pub fn voltage_to_pressure(self, voltage: f64) -> f64 {
        match self {
            Self::Mtp4d => 10f64.powf(voltage - 5.5),
            Self::Mtm9d => 10f64.powf((voltage - 6.8) / 0.6),
        }
    }
}

/// Analog output voltage to pressure for `model`.  Unknown models give 0.
pub fn voltage_to_pressure(voltage: f64, model: &str) -> f64 {
    Model::from_name(model).map_or(0.0, |m| m.voltage_to_pressure(voltage))
}
