//! Pure unit conversion for the quantities the pipeline touches.
//!
//! Multiplicative kinds are backed by factor tables relative to a fixed
//! reference unit per kind (ps, Ang, eV, bar, amu); temperature is affine
//! and only supported through [`convert`].

use crate::domain::{MdError, MdResult};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantityKind {
    Mass,
    Length,
    Time,
    Energy,
    Pressure,
    Temperature,
}

impl QuantityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mass => "mass",
            Self::Length => "length",
            Self::Time => "time",
            Self::Energy => "energy",
            Self::Pressure => "pressure",
            Self::Temperature => "temperature",
        }
    }
}

impl Display for QuantityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

const KJ_PER_MOL_PER_EV: f64 = 96.485_332_123_31;
const AVOGADRO: f64 = 6.022_140_76e23;

const TIME_TABLE: &[(&str, f64)] = &[
    ("fs", 1.0e-3),
    ("ps", 1.0),
    ("ns", 1.0e3),
    ("us", 1.0e6),
    ("ms", 1.0e9),
    ("s", 1.0e12),
];

const LENGTH_TABLE: &[(&str, f64)] = &[
    ("Ang", 1.0),
    ("A", 1.0),
    ("Angstrom", 1.0),
    ("pm", 1.0e-2),
    ("nm", 10.0),
    ("um", 1.0e4),
    ("m", 1.0e10),
    ("Bohr", 0.529_177_210_67),
];

const ENERGY_TABLE: &[(&str, f64)] = &[
    ("eV", 1.0),
    ("meV", 1.0e-3),
    ("kJ/mol", 1.0 / KJ_PER_MOL_PER_EV),
    ("kcal/mol", 4.184 / KJ_PER_MOL_PER_EV),
    ("Hartree", 27.211_386_245_988),
    ("J", 6.241_509_074e18),
];

const PRESSURE_TABLE: &[(&str, f64)] = &[
    ("Pa", 1.0e-5),
    ("kPa", 1.0e-2),
    ("MPa", 10.0),
    ("GPa", 1.0e4),
    ("mbar", 1.0e-3),
    ("bar", 1.0),
    ("atm", 1.013_25),
];

const MASS_TABLE: &[(&str, f64)] = &[
    ("amu", 1.0),
    ("u", 1.0),
    ("Da", 1.0),
    ("mg", 1.0e-3 * AVOGADRO),
    ("g", AVOGADRO),
    ("kg", 1.0e3 * AVOGADRO),
];

fn factor_table(kind: QuantityKind) -> Option<&'static [(&'static str, f64)]> {
    match kind {
        QuantityKind::Mass => Some(MASS_TABLE),
        QuantityKind::Length => Some(LENGTH_TABLE),
        QuantityKind::Time => Some(TIME_TABLE),
        QuantityKind::Energy => Some(ENERGY_TABLE),
        QuantityKind::Pressure => Some(PRESSURE_TABLE),
        QuantityKind::Temperature => None,
    }
}

fn unsupported_unit(kind: QuantityKind, unit: &str) -> MdError {
    MdError::config(
        "CONFIG.UNIT",
        format!("unsupported {} unit '{}'", kind, unit),
    )
}

fn reference_scale(kind: QuantityKind, unit: &str) -> MdResult<f64> {
    let table = factor_table(kind).ok_or_else(|| {
        MdError::config(
            "CONFIG.UNIT_AFFINE",
            format!("{} has no multiplicative factor; use convert()", kind),
        )
    })?;
    table
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, scale)| *scale)
        .ok_or_else(|| unsupported_unit(kind, unit))
}

/// Multiplicative conversion factor from `from` to `to` for the given kind.
/// Temperature is rejected here because its scales do not share a zero.
pub fn factor(from: &str, to: &str, kind: QuantityKind) -> MdResult<f64> {
    Ok(reference_scale(kind, from)? / reference_scale(kind, to)?)
}

fn to_kelvin(value: f64, unit: &str) -> MdResult<f64> {
    match unit {
        "K" | "Kelvin" => Ok(value),
        "C" | "Celsius" => Ok(value + 273.15),
        "F" | "Fahrenheit" => Ok((value - 32.0) * 5.0 / 9.0 + 273.15),
        other => Err(unsupported_unit(QuantityKind::Temperature, other)),
    }
}

fn from_kelvin(value: f64, unit: &str) -> MdResult<f64> {
    match unit {
        "K" | "Kelvin" => Ok(value),
        "C" | "Celsius" => Ok(value - 273.15),
        "F" | "Fahrenheit" => Ok((value - 273.15) * 9.0 / 5.0 + 32.0),
        other => Err(unsupported_unit(QuantityKind::Temperature, other)),
    }
}

/// Convert `value` from `from` to `to` for the given quantity kind.
pub fn convert(value: f64, from: &str, to: &str, kind: QuantityKind) -> MdResult<f64> {
    if kind == QuantityKind::Temperature {
        return from_kelvin(to_kelvin(value, from)?, to);
    }
    Ok(value * factor(from, to, kind)?)
}
