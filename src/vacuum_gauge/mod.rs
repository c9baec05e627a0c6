//! Vacuum gauges: analog output conversion and the Erstevak RS-485 protocol.
//!
//! All pressures are in mbar.

pub mod edwards;
pub mod erstevak;
pub mod leybold;

pub use erstevak::ErstevakClient;

/// Normalise a model name for matching: upper case, no whitespace.
pub(crate) fn model_key(model: &str) -> String {
    model
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
