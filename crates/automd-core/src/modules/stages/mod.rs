//! Staged engine execution: compile, simulate, trajectory extraction.

use crate::domain::{Device, MdError, MdErrorCategory, MdResult, SimulationArtifacts};
use crate::engine::{
    self, BACKUP_ENV_KEY, BACKUP_ENV_VALUE, DEFFNM, EDR_FILE, GMX_PROGRAM, GRO_FILE, MDRUN_FILE,
    MdrunCapabilities, OUTPUT_GRO, TOP_FILE, TRR_FILE, XTC_FILE,
};
use crate::process::{CommandSpec, ProcessRunner};
use std::cell::OnceCell;
use std::path::{Path, PathBuf};

/// mdrun tuning knobs that are stable across the stages of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub max_cores: usize,
    pub device: Device,
}

/// Drives the compile/simulate/extract stage sequence inside one destination
/// directory. The mdrun capability probe runs at most once per instance.
pub struct StageRunner<'a> {
    runner: &'a dyn ProcessRunner,
    settings: EngineSettings,
    dest_dir: PathBuf,
    capabilities: OnceCell<MdrunCapabilities>,
}

impl<'a> StageRunner<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, settings: EngineSettings, dest_dir: &Path) -> Self {
        Self {
            runner,
            settings,
            dest_dir: dest_dir.to_path_buf(),
            capabilities: OnceCell::new(),
        }
    }

    fn engine_command(&self) -> CommandSpec {
        CommandSpec::new(GMX_PROGRAM)
            .cwd(&self.dest_dir)
            .env(BACKUP_ENV_KEY, BACKUP_ENV_VALUE)
    }

    fn capabilities(&self) -> &MdrunCapabilities {
        self.capabilities
            .get_or_init(|| engine::probe_mdrun_capabilities(self.runner))
    }

    /// Preprocess inputs into the binary run file (`gmx grompp`).
    pub fn compile(&self) -> MdResult<()> {
        let spec = self.engine_command().args([
            "grompp", "-f", MDRUN_FILE, "-p", TOP_FILE, "-c", GRO_FILE,
        ]);
        tracing::info!(command = %spec.render(), "compiling run inputs");
        let output = self.runner.run(&spec)?;
        if !output.success {
            return Err(MdError::stage(
                MdErrorCategory::Compile,
                "RUN.GROMPP",
                "grompp failed to compile the run inputs",
                output.combined,
            ));
        }
        Ok(())
    }

    /// Run the simulation (`gmx mdrun`) and return the raw artifact paths.
    pub fn simulate(&self) -> MdResult<SimulationArtifacts> {
        let capabilities = *self.capabilities();
        let device = self.settings.device.as_str();
        let threads = self.settings.max_cores.to_string();
        let mut spec = self.engine_command().args([
            "mdrun",
            "-v",
            "-deffnm",
            DEFFNM,
            "-nt",
            threads.as_str(),
            "-nb",
            device,
        ]);
        if capabilities.pme {
            spec = spec.args(["-pme", device]);
        }
        if capabilities.pmefft {
            spec = spec.args(["-pmefft", device]);
        }
        spec = spec.args(["-pin", "on", "-o", TRR_FILE]);

        tracing::info!(command = %spec.render(), "running simulation");
        let output = self.runner.run(&spec)?;
        if !output.success {
            return Err(MdError::stage(
                MdErrorCategory::Simulation,
                "RUN.MDRUN",
                "mdrun exited with failure",
                output.combined,
            ));
        }
        Ok(SimulationArtifacts {
            trr_path: self.dest_dir.join(TRR_FILE),
            edr_path: self.dest_dir.join(EDR_FILE),
            xtc_path: self.dest_dir.join(XTC_FILE),
        })
    }

    /// Convert the trajectory to a multi-frame gro file (`gmx trjconv`).
    /// The compressed trajectory is preferred; the full-precision one is the
    /// fallback. All failed attempts are reported together when no candidate
    /// converts.
    pub fn extract_trajectory(&self, artifacts: &SimulationArtifacts) -> MdResult<PathBuf> {
        let candidates = [&artifacts.xtc_path, &artifacts.trr_path];
        let mut attempts = Vec::new();
        for candidate in candidates {
            let name = candidate
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("trajectory");
            if !candidate.is_file() {
                attempts.push(format!("{}: file not found", name));
                continue;
            }
            let spec = self
                .engine_command()
                .args(["trjconv", "-f", name, "-o", OUTPUT_GRO])
                .stdin("0\n");
            tracing::info!(command = %spec.render(), "extracting trajectory");
            let output = self.runner.run(&spec)?;
            if output.success {
                return Ok(self.dest_dir.join(OUTPUT_GRO));
            }
            attempts.push(format!("{}: {}", name, output.combined));
        }
        Err(MdError::stage(
            MdErrorCategory::TrajectoryExtraction,
            "RUN.TRJCONV",
            "no trajectory file could be converted to gro",
            attempts.join("\n---\n"),
        ))
    }
}
