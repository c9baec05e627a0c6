//! Quartz crystal microbalance: film thickness math, material constants
//! and the CYKY TM106B thickness monitor.

pub mod calculation;
pub mod materials;
pub mod qtm;

pub use calculation::{freq_change_to_mass_per_cm2, freq_change_to_thickness};
pub use materials::{MATERIALS, Material};
pub use qtm::{Con, Qtm, QtmState, Run};
