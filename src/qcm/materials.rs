//! Deposition material constants.

/// Density (g/cm³) and acoustic impedance ratio of a film material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub id: u8,
    pub symbol: &'static str,
    pub density: f64,
    pub z_ratio: f64,
}

const fn m(id: u8, symbol: &'static str, density: f64, z_ratio: f64) -> Material {
    Material {
        id,
        symbol,
        density,
        z_ratio,
    }
}

pub static MATERIALS: [Material; 14] = [
    m(1, "Ag", 10.5, 0.53),
    m(2, "Al", 2.7, 1.08),
    m(3, "Au", 19.3, 0.38),
    m(4, "C", 2.25, 3.26),
    m(5, "Cr", 7.2, 0.31),
    m(6, "Cu", 8.93, 0.44),
    m(7, "Mo", 10.2, 0.26),
    m(8, "Ni", 8.91, 0.33),
    m(9, "Pd", 12.04, 0.36),
    m(10, "Pt", 21.4, 0.25),
    m(11, "Ti", 4.5, 0.63),
    m(12, "V", 5.96, 0.53),
    m(13, "W", 19.3, 0.16),
    m(14, "Zn", 7.04, 0.51),
];

impl Material {
    /// Look up by element symbol (case-insensitive).
    pub fn by_symbol(symbol: &str) -> Option<&'static Material> {
        let symbol = symbol.trim();
        MATERIALS
            .iter()
            .find(|m| m.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn by_id(id: u8) -> Option<&'static Material> {
        MATERIALS.iter().find(|m| m.id == id)
    }
}
