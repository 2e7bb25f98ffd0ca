//! Topology generation through the external OBGMX tool (UFF force field).

use crate::domain::{MdError, MdErrorCategory, MdResult, TopologyArtifact};
use crate::engine::{ITP_FILE, OBGMX_PROGRAM, TOP_FILE};
use crate::formats::{StructureConverter, StructureFormat};
use crate::process::{CommandSpec, ProcessRunner};
use std::fs;
use std::path::{Path, PathBuf};

/// Run the topology tool against `structure_path` and return the absolute
/// paths of the `obgmx.top`/`obgmx.itp` pair it writes into `dest_dir`.
///
/// Inputs that are not already xyz are converted into a scoped temporary
/// xyz file first; the temporary is removed on every exit path.
pub fn generate_topology(
    structure_path: &Path,
    dest_dir: &Path,
    runner: &dyn ProcessRunner,
    converter: &dyn StructureConverter,
) -> MdResult<TopologyArtifact> {
    fs::create_dir_all(dest_dir).map_err(|source| {
        MdError::io_system(
            "IO.TOPOLOGY_DEST_DIR",
            format!(
                "failed to create destination directory '{}': {}",
                dest_dir.display(),
                source
            ),
        )
    })?;

    // Dropping the guard deletes the converted file on success and failure.
    let mut temp_guard = None;
    let xyz_path = if is_xyz(structure_path) {
        absolute(structure_path)?
    } else {
        let temp = tempfile::Builder::new()
            .prefix("automd-")
            .suffix(".xyz")
            .tempfile()
            .map_err(|source| {
                MdError::io_system(
                    "IO.TOPOLOGY_TEMP",
                    format!("failed to create temporary xyz file: {}", source),
                )
            })?;
        let frames = converter.read(structure_path)?;
        converter.write(temp.path(), &frames[0], StructureFormat::Xyz)?;
        let path = temp.path().to_path_buf();
        temp_guard = Some(temp);
        path
    };

    let spec = CommandSpec::new(OBGMX_PROGRAM)
        .cwd(dest_dir)
        .arg(xyz_path.display().to_string());
    tracing::debug!(command = %spec.render(), "generating topology");
    let output = runner.run(&spec)?;
    drop(temp_guard);

    if !output.success {
        return Err(MdError::stage(
            MdErrorCategory::TopologyGeneration,
            "RUN.OBGMX",
            format!("topology tool failed for '{}'", structure_path.display()),
            output.combined,
        ));
    }

    let top_path = expect_non_empty(dest_dir.join(TOP_FILE), &output.combined)?;
    let itp_path = expect_non_empty(dest_dir.join(ITP_FILE), &output.combined)?;
    Ok(TopologyArtifact { top_path, itp_path })
}

fn is_xyz(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension == "xyz")
}

fn absolute(path: &Path) -> MdResult<PathBuf> {
    fs::canonicalize(path).map_err(|source| {
        MdError::io_system(
            "IO.TOPOLOGY_INPUT",
            format!(
                "failed to resolve structure path '{}': {}",
                path.display(),
                source
            ),
        )
    })
}

fn expect_non_empty(path: PathBuf, tool_output: &str) -> MdResult<PathBuf> {
    let populated = fs::metadata(&path)
        .map(|metadata| metadata.len() > 0)
        .unwrap_or(false);
    if !populated {
        return Err(MdError::stage(
            MdErrorCategory::TopologyGeneration,
            "RUN.OBGMX_OUTPUT",
            format!(
                "topology tool exited cleanly but '{}' is missing or empty",
                path.display()
            ),
            tool_output,
        ));
    }
    absolute(&path)
}

#[cfg(test)]
mod tests {
    use super::generate_topology;
    use crate::domain::{MdErrorCategory, MdResult};
    use crate::formats::BuiltinConverter;
    use crate::process::{CommandOutput, CommandSpec, ProcessRunner};
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const SAMPLE_TOP: &str = "#include <obgmx.itp>\n[ system ]\nUFF molecule\n";
    const SAMPLE_ITP: &str = "[ atoms ]\n; nr type resnr\n 1 O_3 1\n 2 H_ 1\n";

    struct ScriptedRunner {
        succeed: bool,
        write_outputs: bool,
        specs: RefCell<Vec<CommandSpec>>,
    }

    impl ProcessRunner for ScriptedRunner {
        fn run(&self, spec: &CommandSpec) -> MdResult<CommandOutput> {
            self.specs.borrow_mut().push(spec.clone());
            if self.write_outputs {
                let cwd = spec.cwd.clone().expect("obgmx runs in dest dir");
                fs::write(cwd.join("obgmx.top"), SAMPLE_TOP).expect("top staged");
                fs::write(cwd.join("obgmx.itp"), SAMPLE_ITP).expect("itp staged");
            }
            if self.succeed {
                Ok(CommandOutput::ok("obgmx: wrote obgmx.top"))
            } else {
                Ok(CommandOutput::failed("obgmx: could not perceive atom types"))
            }
        }
    }

    fn stage_xyz(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("mol.xyz");
        fs::write(&path, "2\nwater fragment\nO 0.0 0.0 0.0\nH 0.96 0.0 0.0\n")
            .expect("xyz staged");
        path
    }

    #[test]
    fn success_returns_both_artifacts_as_absolute_paths() {
        let temp = TempDir::new().expect("tempdir should be created");
        let dest = temp.path().join("run");
        let xyz = stage_xyz(temp.path());
        let runner = ScriptedRunner {
            succeed: true,
            write_outputs: true,
            specs: RefCell::new(Vec::new()),
        };

        let artifact = generate_topology(&xyz, &dest, &runner, &BuiltinConverter)
            .expect("topology generation should succeed");
        assert!(artifact.top_path.is_absolute());
        assert!(artifact.top_path.ends_with("obgmx.top"));
        assert!(artifact.itp_path.ends_with("obgmx.itp"));

        let specs = runner.specs.borrow();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].program, "obgmx");
    }

    #[test]
    fn xyz_input_is_passed_through_without_conversion() {
        let temp = TempDir::new().expect("tempdir should be created");
        let dest = temp.path().join("run");
        let xyz = stage_xyz(temp.path());
        let runner = ScriptedRunner {
            succeed: true,
            write_outputs: true,
            specs: RefCell::new(Vec::new()),
        };

        generate_topology(&xyz, &dest, &runner, &BuiltinConverter).expect("generation succeeds");
        let specs = runner.specs.borrow();
        let arg = &specs[0].args[0];
        assert!(arg.ends_with("mol.xyz"), "tool received '{}'", arg);
    }

    #[test]
    fn tool_failure_carries_the_combined_output() {
        let temp = TempDir::new().expect("tempdir should be created");
        let dest = temp.path().join("run");
        let xyz = stage_xyz(temp.path());
        let runner = ScriptedRunner {
            succeed: false,
            write_outputs: false,
            specs: RefCell::new(Vec::new()),
        };

        let error = generate_topology(&xyz, &dest, &runner, &BuiltinConverter)
            .expect_err("tool failure should surface");
        assert_eq!(error.category(), MdErrorCategory::TopologyGeneration);
        assert_eq!(error.placeholder(), "RUN.OBGMX");
        assert_eq!(
            error.diagnostic(),
            Some("obgmx: could not perceive atom types")
        );
    }

    #[test]
    fn clean_exit_without_outputs_is_still_a_failure() {
        let temp = TempDir::new().expect("tempdir should be created");
        let dest = temp.path().join("run");
        let xyz = stage_xyz(temp.path());
        let runner = ScriptedRunner {
            succeed: true,
            write_outputs: false,
            specs: RefCell::new(Vec::new()),
        };

        let error = generate_topology(&xyz, &dest, &runner, &BuiltinConverter)
            .expect_err("missing outputs should fail");
        assert_eq!(error.placeholder(), "RUN.OBGMX_OUTPUT");
    }

    #[test]
    fn non_xyz_input_converts_to_a_temporary_that_is_removed() {
        let temp = TempDir::new().expect("tempdir should be created");
        let dest = temp.path().join("run");
        let gro = temp.path().join("mol.gro");
        fs::write(
            &gro,
            "water\n    2\n    1MOL      O    1   0.000   0.000   0.000\n    1MOL      H    2   0.096   0.000   0.000\n   1.00000   1.00000   1.00000\n",
        )
        .expect("gro staged");
        let runner = ScriptedRunner {
            succeed: true,
            write_outputs: true,
            specs: RefCell::new(Vec::new()),
        };

        generate_topology(&gro, &dest, &runner, &BuiltinConverter)
            .expect("gro input should convert and succeed");
        let specs = runner.specs.borrow();
        let temp_xyz = Path::new(&specs[0].args[0]).to_path_buf();
        assert!(
            temp_xyz.extension().is_some_and(|ext| ext == "xyz"),
            "tool received '{}'",
            temp_xyz.display()
        );
        assert!(!temp_xyz.exists(), "temporary xyz should be cleaned up");
    }

    #[test]
    fn temporary_is_removed_on_failure_too() {
        let temp = TempDir::new().expect("tempdir should be created");
        let dest = temp.path().join("run");
        let gro = temp.path().join("mol.gro");
        fs::write(
            &gro,
            "water\n    2\n    1MOL      O    1   0.000   0.000   0.000\n    1MOL      H    2   0.096   0.000   0.000\n   1.00000   1.00000   1.00000\n",
        )
        .expect("gro staged");
        let runner = ScriptedRunner {
            succeed: false,
            write_outputs: false,
            specs: RefCell::new(Vec::new()),
        };

        generate_topology(&gro, &dest, &runner, &BuiltinConverter)
            .expect_err("tool failure expected");
        let specs = runner.specs.borrow();
        let temp_xyz = Path::new(&specs[0].args[0]).to_path_buf();
        assert!(!temp_xyz.exists(), "temporary xyz should be cleaned up");
    }
}
