//! The full run pipeline: environment check, input assembly, staged engine
//! execution and extraction, in a fixed order with fail-fast semantics.

use crate::config::RunConfig;
use crate::domain::{
    EngineInputs, MdError, MdResult, ResultRecord, RunRequest, TopologyArtifact,
};
use crate::engine::{self, ITP_FILE, TOP_FILE};
use crate::formats::{Structure, StructureConverter};
use crate::modules::stages::{EngineSettings, StageRunner};
use crate::modules::{extract, inputs, topology};
use crate::process::ProcessRunner;
use std::fs;
use std::path::Path;

const POTENTIAL_LEGEND: &str = "Potential";

/// Run the whole pipeline for one structure. A dry run stops after input
/// assembly and returns a record holding only the input paths; a full run
/// additionally carries trajectory, energy and (optionally) force data.
pub fn run(
    request: &RunRequest,
    config: &RunConfig,
    runner: &dyn ProcessRunner,
    converter: &dyn StructureConverter,
) -> MdResult<ResultRecord> {
    let version = engine::check_engine(runner)?;
    tracing::info!(version = %version, structure = %request.structure_path.display(), "starting run");
    let canonical = config.regularize()?;

    let gro_path = inputs::generate_structure(
        &request.structure_path,
        &request.dest_dir,
        request.center,
        runner,
        converter,
    )?;
    let topology = resolve_topology(request, runner, converter)?;
    let mdrun_path = inputs::generate_run_control(
        request.mdrun_file.as_deref(),
        request.run_type,
        &canonical,
        &request.dest_dir,
    )?;
    inputs::reconcile_atom_names(&gro_path, &topology.itp_path)?;

    let engine_inputs = EngineInputs {
        gro_path,
        mdrun_path,
        topology,
        dest_dir: request.dest_dir.clone(),
    };
    let mut record = ResultRecord::from_inputs(&engine_inputs);
    if request.dry_run {
        tracing::info!("dry run requested; stopping after input assembly");
        return Ok(record);
    }

    let settings = EngineSettings {
        max_cores: request.max_cores,
        device: request.device,
    };
    let stages = StageRunner::new(runner, settings, &request.dest_dir);
    stages.compile()?;
    let artifacts = stages.simulate()?;
    record.trr_path = Some(artifacts.trr_path.clone());
    record.edr_path = Some(artifacts.edr_path.clone());
    if artifacts.xtc_path.is_file() {
        record.xtc_path = Some(artifacts.xtc_path.clone());
    }
    record.output_gro_path = Some(stages.extract_trajectory(&artifacts)?);

    let energies = extract::extract_energies(&artifacts.edr_path, &request.dest_dir, runner)?;
    record.potential_energy = energies
        .get(POTENTIAL_LEGEND)
        .and_then(|series| series.last())
        .copied();
    record.energies = energies;

    if request.extract_forces {
        record.forces = Some(extract::extract_forces(
            &artifacts.trr_path,
            &request.dest_dir,
            runner,
        )?);
    }
    Ok(record)
}

/// Read every frame of a completed run's trajectory as candidate isomer
/// structures.
pub fn isomers(
    record: &ResultRecord,
    converter: &dyn StructureConverter,
) -> MdResult<Vec<Structure>> {
    let output_gro = record.output_gro_path.as_deref().ok_or_else(|| {
        MdError::config(
            "CONFIG.NO_TRAJECTORY",
            "the run produced no trajectory to read isomers from; was it a dry run?",
        )
    })?;
    converter.read(output_gro)
}

/// A caller-supplied topology pair is staged into the destination directory
/// under the engine-facing names; otherwise the topology tool generates one.
fn resolve_topology(
    request: &RunRequest,
    runner: &dyn ProcessRunner,
    converter: &dyn StructureConverter,
) -> MdResult<TopologyArtifact> {
    let Some(top_source) = &request.topfile else {
        return topology::generate_topology(
            &request.structure_path,
            &request.dest_dir,
            runner,
            converter,
        );
    };
    let itp_source = request
        .itpfile
        .clone()
        .unwrap_or_else(|| top_source.with_extension("itp"));
    let top_path = stage_file(top_source, &request.dest_dir.join(TOP_FILE))?;
    let itp_path = stage_file(&itp_source, &request.dest_dir.join(ITP_FILE))?;
    Ok(TopologyArtifact { top_path, itp_path })
}

fn stage_file(source: &Path, dest: &Path) -> MdResult<std::path::PathBuf> {
    if let (Ok(from), Ok(to)) = (fs::canonicalize(source), fs::canonicalize(dest)) {
        if from == to {
            return Ok(to);
        }
    }
    fs::copy(source, dest).map_err(|err| {
        MdError::io_system(
            "IO.TOPOLOGY_STAGE",
            format!(
                "failed to stage topology file '{}' as '{}': {}",
                source.display(),
                dest.display(),
                err
            ),
        )
    })?;
    fs::canonicalize(dest).map_err(|err| {
        MdError::io_system(
            "IO.TOPOLOGY_STAGE",
            format!("failed to resolve '{}': {}", dest.display(), err),
        )
    })
}
