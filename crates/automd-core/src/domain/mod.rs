pub mod errors;

pub use errors::{MdError, MdErrorCategory, MdResult};

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DEFAULT_MAX_CORES: usize = 4;

/// Kind of run the engine is asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunType {
    #[default]
    Md,
    Emin,
}

impl RunType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Md => "md",
            Self::Emin => "emin",
        }
    }

    pub fn parse(value: &str) -> MdResult<Self> {
        match value {
            "md" => Ok(Self::Md),
            "emin" => Ok(Self::Emin),
            other => Err(MdError::config(
                "CONFIG.RUN_TYPE",
                format!("runtype must be either md or emin, got '{}'", other),
            )),
        }
    }
}

impl Display for RunType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Compute device selector passed to `gmx mdrun -nb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    #[default]
    Cpu,
    Gpu,
    Auto,
}

impl Device {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::Auto => "auto",
        }
    }

    pub fn parse(value: &str) -> MdResult<Self> {
        match value {
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            "auto" => Ok(Self::Auto),
            other => Err(MdError::config(
                "CONFIG.DEVICE",
                format!("device must be one of cpu/gpu/auto, got '{}'", other),
            )),
        }
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Ordered pipeline stages, used for logging and failure reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStage {
    Structure,
    Topology,
    RunControl,
    Reconcile,
    Compile,
    Simulate,
    Trajectory,
    Energies,
    Forces,
}

impl RunStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Topology => "topology",
            Self::RunControl => "run-control",
            Self::Reconcile => "reconcile",
            Self::Compile => "compile",
            Self::Simulate => "simulate",
            Self::Trajectory => "trajectory",
            Self::Energies => "energies",
            Self::Forces => "forces",
        }
    }
}

impl Display for RunStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// One full-run request: structure file in, destination directory out.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub structure_path: PathBuf,
    pub dest_dir: PathBuf,
    pub run_type: RunType,
    pub mdrun_file: Option<PathBuf>,
    pub topfile: Option<PathBuf>,
    pub itpfile: Option<PathBuf>,
    pub max_cores: usize,
    pub device: Device,
    pub center: bool,
    pub dry_run: bool,
    pub extract_forces: bool,
}

impl RunRequest {
    pub fn new(structure_path: impl Into<PathBuf>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            structure_path: structure_path.into(),
            dest_dir: dest_dir.into(),
            run_type: RunType::Md,
            mdrun_file: None,
            topfile: None,
            itpfile: None,
            max_cores: DEFAULT_MAX_CORES,
            device: Device::Cpu,
            center: true,
            dry_run: false,
            extract_forces: false,
        }
    }
}

/// Paths of the two files the topology tool writes on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyArtifact {
    pub top_path: PathBuf,
    pub itp_path: PathBuf,
}

/// The three engine-ready inputs, all resolved within `dest_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInputs {
    pub gro_path: PathBuf,
    pub mdrun_path: PathBuf,
    pub topology: TopologyArtifact,
    pub dest_dir: PathBuf,
}

/// Raw engine outputs produced by the simulation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationArtifacts {
    pub trr_path: PathBuf,
    pub edr_path: PathBuf,
    pub xtc_path: PathBuf,
}

pub type ExtractedData = BTreeMap<String, Vec<f64>>;

/// Everything a completed (or dry) run hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub gro_path: PathBuf,
    pub top_path: PathBuf,
    pub itp_path: PathBuf,
    pub mdrun_path: PathBuf,
    pub trr_path: Option<PathBuf>,
    pub edr_path: Option<PathBuf>,
    pub xtc_path: Option<PathBuf>,
    pub output_gro_path: Option<PathBuf>,
    pub energies: ExtractedData,
    pub potential_energy: Option<f64>,
    pub forces: Option<Vec<Vec<[f64; 3]>>>,
}

impl ResultRecord {
    pub fn from_inputs(inputs: &EngineInputs) -> Self {
        Self {
            gro_path: inputs.gro_path.clone(),
            top_path: inputs.topology.top_path.clone(),
            itp_path: inputs.topology.itp_path.clone(),
            mdrun_path: inputs.mdrun_path.clone(),
            trr_path: None,
            edr_path: None,
            xtc_path: None,
            output_gro_path: None,
            energies: ExtractedData::new(),
            potential_energy: None,
            forces: None,
        }
    }

    /// JSON view of the record. Non-finite floats are encoded as the strings
    /// `"NaN"`, `"Infinity"` and `"-Infinity"` so the payload stays valid JSON.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("grofile".to_string(), path_value(&self.gro_path));
        map.insert("topfile".to_string(), path_value(&self.top_path));
        map.insert("itpfile".to_string(), path_value(&self.itp_path));
        map.insert("mdrunfile".to_string(), path_value(&self.mdrun_path));
        if let Some(path) = &self.trr_path {
            map.insert("trr_filename".to_string(), path_value(path));
        }
        if let Some(path) = &self.edr_path {
            map.insert("edr_filename".to_string(), path_value(path));
        }
        if let Some(path) = &self.xtc_path {
            map.insert("xtc_filename".to_string(), path_value(path));
        }
        if let Some(path) = &self.output_gro_path {
            map.insert("output_gro".to_string(), path_value(path));
        }
        if !self.energies.is_empty() {
            let mut energies = Map::new();
            for (legend, series) in &self.energies {
                energies.insert(legend.clone(), float_series_value(series));
            }
            map.insert("energies_dict".to_string(), Value::Object(energies));
        }
        if let Some(potential) = self.potential_energy {
            map.insert("potential_energy".to_string(), float_value(potential));
        }
        if let Some(forces) = &self.forces {
            let frames = forces
                .iter()
                .map(|frame| {
                    Value::Array(
                        frame
                            .iter()
                            .map(|atom| {
                                Value::Array(atom.iter().map(|c| float_value(*c)).collect())
                            })
                            .collect(),
                    )
                })
                .collect();
            map.insert("forces".to_string(), Value::Array(frames));
        }
        Value::Object(map)
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(&self.to_json())
            .unwrap_or_else(|_| "{}".to_string())
    }
}

fn path_value(path: &std::path::Path) -> Value {
    Value::String(path.display().to_string())
}

pub fn float_value(value: f64) -> Value {
    if value.is_nan() {
        Value::String("NaN".to_string())
    } else if value.is_infinite() {
        Value::String(
            if value.is_sign_positive() {
                "Infinity"
            } else {
                "-Infinity"
            }
            .to_string(),
        )
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

pub fn float_series_value(series: &[f64]) -> Value {
    Value::Array(series.iter().map(|value| float_value(*value)).collect())
}
