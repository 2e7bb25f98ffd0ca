//! Run configuration and its canonical (regularized) form.

use crate::domain::{MdError, MdResult};
use crate::units::{self, QuantityKind};
use serde::Serialize;

/// User-facing MD parameters, each numeric field tagged with its unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    pub time: f64,
    pub time_unit: String,
    pub dt: f64,
    pub dt_unit: String,
    pub temperature: f64,
    pub temperature_unit: String,
    pub pressure: f64,
    pub pressure_unit: String,
    pub compressibility: f64,
    pub constant_pressure: bool,
    pub debug: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            time: 10.0,
            time_unit: "ps".to_string(),
            dt: 0.5,
            dt_unit: "fs".to_string(),
            temperature: 600.0,
            temperature_unit: "K".to_string(),
            pressure: 1.0,
            pressure_unit: "bar".to_string(),
            compressibility: 4.5e-5,
            constant_pressure: false,
            debug: false,
        }
    }
}

/// [`RunConfig`] normalized to ps/bar/K with the derived step count.
/// Read-only after derivation; field names double as template keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalConfig {
    pub time_ps: f64,
    pub dt_ps: f64,
    pub temperature_k: f64,
    pub pressure_bar: f64,
    pub compressibility: f64,
    pub constant_pressure: bool,
    pub debug: bool,
    pub nsteps: u64,
}

impl RunConfig {
    /// Normalize every field to the canonical unit set and derive the step
    /// count. Pressure is scaled by the unit factor; temperature is converted
    /// through the affine transform.
    pub fn regularize(&self) -> MdResult<CanonicalConfig> {
        let temperature_k = units::convert(
            self.temperature,
            &self.temperature_unit,
            "Kelvin",
            QuantityKind::Temperature,
        )?;
        let pressure_bar =
            self.pressure * units::factor(&self.pressure_unit, "bar", QuantityKind::Pressure)?;
        let dt_ps = self.dt * units::factor(&self.dt_unit, "ps", QuantityKind::Time)?;
        let time_ps = self.time * units::factor(&self.time_unit, "ps", QuantityKind::Time)?;

        if dt_ps <= 0.0 {
            return Err(MdError::config(
                "CONFIG.STEP_SIZE",
                format!("step size must be strictly positive, got {} ps", dt_ps),
            ));
        }
        if time_ps <= 0.0 {
            return Err(MdError::config(
                "CONFIG.TIME_SPAN",
                format!("time span must be strictly positive, got {} ps", time_ps),
            ));
        }

        Ok(CanonicalConfig {
            time_ps,
            dt_ps,
            temperature_k,
            pressure_bar,
            compressibility: self.compressibility,
            constant_pressure: self.constant_pressure,
            debug: self.debug,
            nsteps: (time_ps / dt_ps).floor() as u64,
        })
    }
}

impl CanonicalConfig {
    /// Re-expressed as a [`RunConfig`] in canonical units.
    pub fn as_run_config(&self) -> RunConfig {
        RunConfig {
            time: self.time_ps,
            time_unit: "ps".to_string(),
            dt: self.dt_ps,
            dt_unit: "ps".to_string(),
            temperature: self.temperature_k,
            temperature_unit: "K".to_string(),
            pressure: self.pressure_bar,
            pressure_unit: "bar".to_string(),
            compressibility: self.compressibility,
            constant_pressure: self.constant_pressure,
            debug: self.debug,
        }
    }
}
