//! Edwards active gauges (APG/WRG family).

/// Analog output voltage to pressure.
pub fn voltage_to_pressure(voltage: f64) -> f64 {
    10f64.powf(voltage - 5.555)
}
