//! Leybold THERMOVAC gauges.

use core::fmt;

use super::model_key;

/// Reading below the TTR 101 N measuring range.
pub const TTR101N_UNDERRANGE: f64 = 5e-5;
/// Reading above the TTR 101 N measuring range.
pub const TTR101N_OVERRANGE: f64 = 1.5e3;

/// Pirani correction factors relative to N2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiraniGas {
    /// Valid 3e-3 to 3e-1 mbar.
    Air,
    /// Valid 3e-3 to 1 mbar.
    Ar,
    Co,
    /// Valid 3e-3 to 2e-1 mbar.
    H2,
    He,
    N2,
    O2,
}

impl PiraniGas {
    pub const ALL: [Self; 7] = [
        Self::Air,
        Self::Ar,
        Self::Co,
        Self::H2,
        Self::He,
        Self::N2,
        Self::O2,
    ];

    pub const fn factor(self) -> f64 {
        match self {
            Self::Air | Self::Co | Self::N2 | Self::O2 => 1.0,
            Self::Ar => 1.57,
            Self::H2 => 0.84,
            Self::He => 1.4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Air => "AIR",
            Self::Ar => "AR",
            Self::Co => "CO",
            Self::H2 => "H2",
            Self::He => "HE",
            Self::N2 => "N2",
            Self::O2 => "O2",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let key = model_key(name);
        Self::ALL.into_iter().find(|g| g.name() == key)
    }
}

impl fmt::Display for PiraniGas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Analog output voltage to pressure for `model`.  Unknown models give 0.
pub fn voltage_to_pressure(voltage: f64, model: &str) -> f64 {
    match model_key(model).as_str() {
        "TTR101NTHERMOVAC" | "TTR101N" => {
            if voltage < 0.6119 {
                TTR101N_UNDERRANGE
            } else if voltage > 10.2275 {
                TTR101N_OVERRANGE
            } else {
                10f64.powf((voltage - 6.143) / 1.286)
            }
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttr101n_range_limits() {
        assert_eq!(voltage_to_pressure(0.5, "TTR 101 N"), 5e-5);
        assert_eq!(voltage_to_pressure(10.5, "ttr101n"), 1.5e3);
        let p = voltage_to_pressure(6.143, "TTR 101 N THERMOVAC");
        assert!((p - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_model_reads_zero() {
        assert_eq!(voltage_to_pressure(5.0, "Leybold"), 0.0);
    }

    #[test]
    fn gas_factors() {
        assert_eq!(PiraniGas::Ar.factor(), 1.57);
        assert_eq!(PiraniGas::from_name("he"), Some(PiraniGas::He));
        assert_eq!(PiraniGas::from_name("XE"), None);
        assert_eq!(PiraniGas::H2.to_string(), "H2");
    }
}
