//! Engine input assembly: native structure file, run-control file, and
//! atom-name reconciliation between structure and topology.

mod parser;

use crate::config::CanonicalConfig;
use crate::domain::{MdError, MdResult, RunType};
use crate::engine::{BACKUP_ENV_KEY, BACKUP_ENV_VALUE, GMX_PROGRAM, GRO_FILE, MDRUN_FILE};
use crate::formats::{StructureConverter, StructureFormat};
use crate::process::{CommandSpec, ProcessRunner};
use handlebars::Handlebars;
use std::fs;
use std::path::{Path, PathBuf};

const MDRUN_TEMPLATE: &str = include_str!("mdrun.mdp.template");
const MDRUN_EMIN: &str = include_str!("mdrun_emin.mdp");
const MDRUN_TEMPLATE_NAME: &str = "mdrun";

/// Convert the input structure to engine-native gro in `dest_dir`. When
/// `center` is set, additionally center the molecule in its box with
/// `gmx editconf`; a centering failure is logged and tolerated because the
/// uncentered structure is still simulatable.
pub fn generate_structure(
    input: &Path,
    dest_dir: &Path,
    center: bool,
    runner: &dyn ProcessRunner,
    converter: &dyn StructureConverter,
) -> MdResult<PathBuf> {
    fs::create_dir_all(dest_dir).map_err(|source| {
        MdError::io_system(
            "IO.INPUTS_DEST_DIR",
            format!(
                "failed to create destination directory '{}': {}",
                dest_dir.display(),
                source
            ),
        )
    })?;
    let gro_path = dest_dir.join(GRO_FILE);
    let frames = converter.read(input)?;
    converter.write(&gro_path, &frames[0], StructureFormat::Gro)?;

    if center {
        let spec = CommandSpec::new(GMX_PROGRAM)
            .cwd(dest_dir)
            .env(BACKUP_ENV_KEY, BACKUP_ENV_VALUE)
            .args(["editconf", "-c", "-f", GRO_FILE, "-o", GRO_FILE]);
        match runner.run(&spec) {
            Ok(output) if output.success => {}
            Ok(output) => {
                tracing::warn!(
                    diagnostic = %output.combined,
                    "gmx editconf centering failed; keeping uncentered structure"
                );
            }
            Err(error) => {
                tracing::warn!(
                    %error,
                    "gmx editconf could not run; keeping uncentered structure"
                );
            }
        }
    }

    absolute(&gro_path)
}

/// Produce the run-control file in `dest_dir`:
/// energy minimization uses the bundled fixed file, a caller override is
/// copied verbatim, and otherwise the bundled template is rendered against
/// the canonical configuration.
pub fn generate_run_control(
    override_path: Option<&Path>,
    run_type: RunType,
    canonical: &CanonicalConfig,
    dest_dir: &Path,
) -> MdResult<PathBuf> {
    let dest = dest_dir.join(MDRUN_FILE);
    match run_type {
        RunType::Emin => {
            write_run_control(&dest, MDRUN_EMIN)?;
        }
        RunType::Md => {
            if let Some(source) = override_path {
                copy_run_control(source, &dest)?;
            } else {
                let rendered = render_template(canonical)?;
                write_run_control(&dest, &rendered)?;
            }
        }
    }
    absolute(&dest)
}

fn render_template(canonical: &CanonicalConfig) -> MdResult<String> {
    let mut registry = Handlebars::new();
    registry
        .register_template_string(MDRUN_TEMPLATE_NAME, MDRUN_TEMPLATE)
        .map_err(|source| {
            MdError::internal(
                "SYS.MDRUN_TEMPLATE",
                format!("bundled run-control template failed to compile: {}", source),
            )
        })?;
    registry
        .render(MDRUN_TEMPLATE_NAME, canonical)
        .map_err(|source| {
            MdError::internal(
                "SYS.MDRUN_RENDER",
                format!("run-control template failed to render: {}", source),
            )
        })
}

fn copy_run_control(source: &Path, dest: &Path) -> MdResult<()> {
    // Copying a file onto itself is a no-op, not an error.
    if let (Ok(from), Ok(to)) = (fs::canonicalize(source), fs::canonicalize(dest)) {
        if from == to {
            return Ok(());
        }
    }
    fs::copy(source, dest).map(|_| ()).map_err(|err| {
        MdError::io_system(
            "IO.MDRUN_COPY",
            format!(
                "failed to copy run-control override '{}' to '{}': {}",
                source.display(),
                dest.display(),
                err
            ),
        )
    })
}

fn write_run_control(dest: &Path, content: &str) -> MdResult<()> {
    fs::write(dest, content).map_err(|source| {
        MdError::io_system(
            "IO.MDRUN_WRITE",
            format!(
                "failed to write run-control file '{}': {}",
                dest.display(),
                source
            ),
        )
    })
}

/// Rewrite the structure file's atom-name columns with the force-field atom
/// type names declared by the topology, index-aligned, so the engine can
/// resolve every atom type. Counts must match exactly.
pub fn reconcile_atom_names(gro_path: &Path, itp_path: &Path) -> MdResult<()> {
    let itp_text = fs::read_to_string(itp_path).map_err(|source| {
        MdError::io_system(
            "IO.ITP_READ",
            format!("failed to read topology '{}': {}", itp_path.display(), source),
        )
    })?;
    let gro_text = fs::read_to_string(gro_path).map_err(|source| {
        MdError::io_system(
            "IO.GRO_READ",
            format!("failed to read structure '{}': {}", gro_path.display(), source),
        )
    })?;

    let names = parser::parse_topology_atom_names(&itp_text)?;
    let rewritten = parser::rewrite_gro_atom_names(&gro_text, &names)?;

    fs::write(gro_path, &rewritten).map_err(|source| {
        MdError::io_system(
            "IO.GRO_WRITE",
            format!(
                "failed to write reconciled structure '{}': {}",
                gro_path.display(),
                source
            ),
        )
    })?;
    tracing::debug!(atoms = names.len(), "reconciled structure atom names with topology");
    Ok(())
}

fn absolute(path: &Path) -> MdResult<PathBuf> {
    fs::canonicalize(path).map_err(|source| {
        MdError::io_system(
            "IO.INPUTS_RESOLVE",
            format!("failed to resolve '{}': {}", path.display(), source),
        )
    })
}
