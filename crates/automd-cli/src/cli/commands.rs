use super::CliError;
use anyhow::Context;
use automd_core::config::RunConfig;
use automd_core::domain::{DEFAULT_MAX_CORES, Device, MdError, RunRequest, RunType};
use automd_core::formats::{BuiltinConverter, StructureConverter, StructureFormat};
use automd_core::modules::{inputs, topology};
use automd_core::pipeline;
use automd_core::process::SystemRunner;
use std::fs;
use std::path::PathBuf;

#[derive(clap::Args, Clone)]
pub(super) struct ConfigFlags {
    /// Simulated time span
    #[arg(long, default_value_t = 10.0)]
    time: f64,

    /// Unit of the time span
    #[arg(long, default_value = "ps")]
    time_unit: String,

    /// Integration step size
    #[arg(long, default_value_t = 0.5)]
    dt: f64,

    /// Unit of the step size
    #[arg(long, default_value = "fs")]
    dt_unit: String,

    /// Thermostat temperature
    #[arg(long, default_value_t = 600.0)]
    temperature: f64,

    /// Unit of the temperature
    #[arg(long, default_value = "K")]
    temperature_unit: String,

    /// Barostat reference pressure
    #[arg(long, default_value_t = 1.0)]
    pressure: f64,

    /// Unit of the pressure
    #[arg(long, default_value = "bar")]
    pressure_unit: String,

    /// Isothermal compressibility (1/bar)
    #[arg(long, default_value_t = 4.5e-5)]
    compressibility: f64,

    /// Couple the pressure (NPT instead of NVT)
    #[arg(long)]
    constant_pressure: bool,

    /// Keep debug-level detail in the run artifacts
    #[arg(long)]
    debug: bool,
}

impl ConfigFlags {
    fn to_run_config(&self) -> RunConfig {
        RunConfig {
            time: self.time,
            time_unit: self.time_unit.clone(),
            dt: self.dt,
            dt_unit: self.dt_unit.clone(),
            temperature: self.temperature,
            temperature_unit: self.temperature_unit.clone(),
            pressure: self.pressure,
            pressure_unit: self.pressure_unit.clone(),
            compressibility: self.compressibility,
            constant_pressure: self.constant_pressure,
            debug: self.debug,
        }
    }
}

#[derive(clap::Args)]
pub(super) struct RunArgs {
    /// Input structure file (xyz or gro)
    structure: PathBuf,

    /// Destination directory for run artifacts
    #[arg(long, default_value = "automd-run")]
    dest: PathBuf,

    /// Run type: md or emin
    #[arg(long, default_value = "md")]
    runtype: String,

    /// Run-control file used instead of the generated one
    #[arg(long)]
    mdrun_file: Option<PathBuf>,

    /// Pre-built topology (.top); skips the topology tool
    #[arg(long)]
    topfile: Option<PathBuf>,

    /// Include topology (.itp) accompanying --topfile
    #[arg(long)]
    itpfile: Option<PathBuf>,

    /// Thread count passed to mdrun
    #[arg(long, default_value_t = DEFAULT_MAX_CORES)]
    max_cores: usize,

    /// Compute device: cpu, gpu or auto
    #[arg(long, default_value = "cpu")]
    device: String,

    /// Skip centering the structure in its box
    #[arg(long)]
    no_center: bool,

    /// Stop after input assembly, before any simulation stage
    #[arg(long)]
    dry_run: bool,

    /// Extract per-atom forces after the run
    #[arg(long)]
    forces: bool,

    #[command(flatten)]
    config: ConfigFlags,
}

impl RunArgs {
    fn to_request(&self) -> Result<RunRequest, CliError> {
        let mut request = RunRequest::new(&self.structure, &self.dest);
        request.run_type = RunType::parse(&self.runtype).map_err(CliError::Compute)?;
        request.device = Device::parse(&self.device).map_err(CliError::Compute)?;
        request.mdrun_file = self.mdrun_file.clone();
        request.topfile = self.topfile.clone();
        request.itpfile = self.itpfile.clone();
        request.max_cores = self.max_cores;
        request.center = !self.no_center;
        request.dry_run = self.dry_run;
        request.extract_forces = self.forces;
        Ok(request)
    }
}

pub(super) fn run_run_command(args: RunArgs) -> Result<i32, CliError> {
    let request = args.to_request()?;
    let config = args.config.to_run_config();
    let record = pipeline::run(&request, &config, &SystemRunner, &BuiltinConverter)
        .map_err(CliError::Compute)?;
    println!("{}", record.to_json_string());
    Ok(0)
}

pub(super) fn run_isomers_command(args: RunArgs) -> Result<i32, CliError> {
    if args.dry_run {
        return Err(CliError::Compute(MdError::config(
            "CONFIG.NO_TRAJECTORY",
            "isomer extraction needs a completed run; drop --dry-run",
        )));
    }
    let request = args.to_request()?;
    let config = args.config.to_run_config();
    let converter = BuiltinConverter;
    let record = pipeline::run(&request, &config, &SystemRunner, &converter)
        .map_err(CliError::Compute)?;
    let frames = pipeline::isomers(&record, &converter).map_err(CliError::Compute)?;

    for (index, frame) in frames.iter().enumerate() {
        let path = request.dest_dir.join(format!("isomer-{:03}.xyz", index));
        converter
            .write(&path, frame, StructureFormat::Xyz)
            .map_err(CliError::Compute)?;
        println!("{}", path.display());
    }
    tracing::info!(frames = frames.len(), "wrote isomer candidates");
    Ok(0)
}

#[derive(clap::Args)]
pub(super) struct GenTopArgs {
    /// Input structure file (xyz or gro)
    structure: PathBuf,

    /// Destination directory for the topology pair
    #[arg(long, default_value = ".")]
    dest: PathBuf,
}

pub(super) fn run_gen_top_command(args: GenTopArgs) -> Result<i32, CliError> {
    let artifact =
        topology::generate_topology(&args.structure, &args.dest, &SystemRunner, &BuiltinConverter)
            .map_err(CliError::Compute)?;
    let payload = serde_json::json!({
        "topfile": artifact.top_path.display().to_string(),
        "itpfile": artifact.itp_path.display().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&payload).unwrap_or_default());
    Ok(0)
}

#[derive(clap::Args)]
pub(super) struct GenMdrunArgs {
    /// Destination directory for the run-control file
    #[arg(long, default_value = ".")]
    dest: PathBuf,

    /// Run type: md or emin
    #[arg(long, default_value = "md")]
    runtype: String,

    #[command(flatten)]
    config: ConfigFlags,
}

pub(super) fn run_gen_mdrun_command(args: GenMdrunArgs) -> Result<i32, CliError> {
    let run_type = RunType::parse(&args.runtype).map_err(CliError::Compute)?;
    let canonical = args
        .config
        .to_run_config()
        .regularize()
        .map_err(CliError::Compute)?;
    fs::create_dir_all(&args.dest).with_context(|| {
        format!(
            "failed to create destination directory '{}'",
            args.dest.display()
        )
    })?;
    let path = inputs::generate_run_control(None, run_type, &canonical, &args.dest)
        .map_err(CliError::Compute)?;
    println!("{}", path.display());
    Ok(0)
}
