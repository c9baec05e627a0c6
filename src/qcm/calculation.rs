//! Z-match film thickness from the crystal frequency shift.
//!
//! ```text
//!            Nq · ρq                     ⎛    ⎛ π (f0 − f1) ⎞⎞
//! m/A = ─────────────── · atan ⎜ z · tan⎜ ─────────── ⎟⎟
//!        π · z · f1                      ⎝    ⎝     f0      ⎠⎠
//! ```

use core::f64::consts::PI;

/// Frequency constant of AT-cut quartz, Hz·cm.
pub const NQ: f64 = 1.668e5;
/// Density of quartz, g/cm³.
pub const RHO_Q: f64 = 2.648;

/// Areal film mass in g/cm² for a shift from `f0` to `f1` (Hz) with
/// acoustic impedance ratio `z`.
pub fn freq_change_to_mass_per_cm2(f0: f64, f1: f64, z: f64) -> f64 {
    NQ * RHO_Q / (PI * z * f1) * (z * (PI * (f0 - f1) / f0).tan()).atan()
}

/// Film thickness in Å for a film of `density` g/cm³.
pub fn freq_change_to_thickness(f0: f64, f1: f64, density: f64, z: f64) -> f64 {
    freq_change_to_mass_per_cm2(f0, f1, z) / density * 1e8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_shift_no_mass() {
        assert_eq!(freq_change_to_mass_per_cm2(6e6, 6e6, 0.38), 0.0);
    }

    #[test]
    fn z_one_matches_sauerbrey_for_small_shifts() {
        // Sauerbrey: Δm/A = Nq·ρq·Δf / f0²
        let (f0, f1) = (6e6, 6e6 - 100.0);
        let sauerbrey = NQ * RHO_Q * (f0 - f1) / (f0 * f0);
        let m = freq_change_to_mass_per_cm2(f0, f1, 1.0);
        assert!((m - sauerbrey).abs() / sauerbrey < 1e-4);
    }

    #[test]
    fn thickness_of_gold_film() {
        let t = freq_change_to_thickness(6e6, 6e6 - 1000.0, 19.3, 0.38);
        let m = freq_change_to_mass_per_cm2(6e6, 6e6 - 1000.0, 0.38);
        assert!((t - m / 19.3 * 1e8).abs() < 1e-9);
        assert!(t > 0.0);
    }
}
