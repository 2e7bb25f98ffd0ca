//! End-to-end pipeline runs against a scripted engine stub.

use automd_core::config::RunConfig;
use automd_core::domain::{MdErrorCategory, MdResult, RunRequest};
use automd_core::formats::BuiltinConverter;
use automd_core::pipeline;
use automd_core::process::{CommandOutput, CommandSpec, ProcessRunner};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const VERSION_OUTPUT: &str = "GROMACS version:    2021.4\n";

const MDRUN_HELP: &str = "\
gmx mdrun [-s [<.tpr>]] [-nb <enum>] [-pme <enum>] [-pmefft <enum>]
";

const SAMPLE_TOP: &str = "#include <obgmx.itp>\n[ system ]\nUFF molecule\n";

const SAMPLE_ITP: &str = "\
[ atoms ]
;  nr  type  resnr
    1  O_3   1
    2  H_    1
[ bonds ]
    1 2
";

const OUTPUT_GRO_TEXT: &str = "\
frame t= 0.0
    2
    1MOL    O_3    1   0.000   0.000   0.000
    1MOL     H_    2   0.096   0.000   0.000
   1.00000   1.00000   1.00000
frame t= 0.5
    2
    1MOL    O_3    1   0.010   0.000   0.000
    1MOL     H_    2   0.106   0.000   0.000
   1.00000   1.00000   1.00000
";

const ENERGY_XVG_TEXT: &str = "\
@ s0 legend \"Potential\"
@ s1 legend \"Temperature\"
    0.0000   -300.0   600.0
    0.0005   -296.0   599.0
";

const FORCE_XVG_TEXT: &str = "\
@    title \"Force\"
    0.0000   1.0   2.0   3.0  -1.0  -2.0  -3.0
";

/// Plays the role of both `gmx` and `obgmx`, writing the files each stage is
/// expected to leave behind. One subcommand can be scripted to fail.
struct EngineStub {
    fail_subcommand: Option<&'static str>,
    specs: RefCell<Vec<CommandSpec>>,
}

impl EngineStub {
    fn new() -> Self {
        Self {
            fail_subcommand: None,
            specs: RefCell::new(Vec::new()),
        }
    }

    fn failing_at(subcommand: &'static str) -> Self {
        Self {
            fail_subcommand: Some(subcommand),
            specs: RefCell::new(Vec::new()),
        }
    }

    fn invocations(&self) -> Vec<String> {
        self.specs
            .borrow()
            .iter()
            .map(|spec| {
                if spec.program == "obgmx" {
                    spec.program.clone()
                } else {
                    format!("{} {}", spec.program, spec.args[0])
                }
            })
            .collect()
    }
}

impl ProcessRunner for EngineStub {
    fn run(&self, spec: &CommandSpec) -> MdResult<CommandOutput> {
        self.specs.borrow_mut().push(spec.clone());
        let cwd = spec.cwd.clone().unwrap_or_else(|| ".".into());
        if spec.program == "obgmx" {
            fs::write(cwd.join("obgmx.top"), SAMPLE_TOP).expect("top staged");
            fs::write(cwd.join("obgmx.itp"), SAMPLE_ITP).expect("itp staged");
            return Ok(CommandOutput::ok("obgmx: wrote topology"));
        }
        if spec.args.first().map(String::as_str) == self.fail_subcommand
            && !spec.args.contains(&"-h".to_string())
        {
            return Ok(CommandOutput::failed("Fatal error: stage fell over"));
        }
        match spec.args[0].as_str() {
            "--version" => Ok(CommandOutput::ok(VERSION_OUTPUT)),
            "editconf" | "grompp" => Ok(CommandOutput::ok("")),
            "mdrun" if spec.args.contains(&"-h".to_string()) => {
                Ok(CommandOutput::ok(MDRUN_HELP))
            }
            "mdrun" => {
                fs::write(cwd.join("traj.trr"), b"trr").expect("trr staged");
                fs::write(cwd.join("topol.edr"), b"edr").expect("edr staged");
                Ok(CommandOutput::ok(""))
            }
            "trjconv" => {
                fs::write(cwd.join("output.gro"), OUTPUT_GRO_TEXT).expect("gro staged");
                Ok(CommandOutput::ok(""))
            }
            "energy" => {
                fs::write(cwd.join("energy.xvg"), ENERGY_XVG_TEXT).expect("xvg staged");
                Ok(CommandOutput::ok(""))
            }
            "traj" => {
                fs::write(cwd.join("force.xvg"), FORCE_XVG_TEXT).expect("xvg staged");
                Ok(CommandOutput::ok(""))
            }
            other => panic!("unexpected subcommand '{}'", other),
        }
    }
}

fn stage_xyz(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("mol.xyz");
    fs::write(&path, "2\nwater fragment\nO 0.0 0.0 0.0\nH 0.96 0.0 0.0\n").expect("xyz staged");
    path
}

#[test]
fn dry_run_assembles_inputs_without_touching_the_simulation_stages() {
    let temp = TempDir::new().expect("tempdir should be created");
    let xyz = stage_xyz(temp.path());
    let dest = temp.path().join("run");
    let stub = EngineStub::new();

    let mut request = RunRequest::new(&xyz, &dest);
    request.dry_run = true;

    let record = pipeline::run(&request, &RunConfig::default(), &stub, &BuiltinConverter)
        .expect("dry run should succeed");

    assert!(record.gro_path.ends_with("input.gro"));
    assert!(record.top_path.ends_with("obgmx.top"));
    assert!(record.mdrun_path.ends_with("mdrun.mdp"));
    assert!(record.trr_path.is_none());
    assert!(record.output_gro_path.is_none());
    assert!(record.energies.is_empty());

    let invocations = stub.invocations();
    assert!(invocations.contains(&"gmx --version".to_string()));
    assert!(invocations.contains(&"obgmx".to_string()));
    assert!(!invocations.iter().any(|name| name.contains("grompp")));
    assert!(!invocations.iter().any(|name| name.contains("mdrun")));
}

#[test]
fn dry_run_reconciles_atom_names_with_the_topology() {
    let temp = TempDir::new().expect("tempdir should be created");
    let xyz = stage_xyz(temp.path());
    let dest = temp.path().join("run");
    let stub = EngineStub::new();

    let mut request = RunRequest::new(&xyz, &dest);
    request.dry_run = true;

    let record = pipeline::run(&request, &RunConfig::default(), &stub, &BuiltinConverter)
        .expect("dry run should succeed");

    let gro_text = fs::read_to_string(&record.gro_path).expect("gro readable");
    let lines: Vec<&str> = gro_text.lines().collect();
    assert_eq!(&lines[2][10..15], "  O_3");
    assert_eq!(&lines[3][10..15], "   H_");
}

#[test]
fn full_run_collects_trajectory_energies_and_forces() {
    let temp = TempDir::new().expect("tempdir should be created");
    let xyz = stage_xyz(temp.path());
    let dest = temp.path().join("run");
    let stub = EngineStub::new();

    let mut request = RunRequest::new(&xyz, &dest);
    request.extract_forces = true;

    let record = pipeline::run(&request, &RunConfig::default(), &stub, &BuiltinConverter)
        .expect("full run should succeed");

    assert!(record.trr_path.as_ref().is_some_and(|p| p.ends_with("traj.trr")));
    assert!(record.edr_path.as_ref().is_some_and(|p| p.ends_with("topol.edr")));
    // the stub never writes a compressed trajectory
    assert!(record.xtc_path.is_none());
    assert!(record
        .output_gro_path
        .as_ref()
        .is_some_and(|p| p.ends_with("output.gro")));

    let potential = record.potential_energy.expect("potential recorded");
    assert!((potential - (-296.0 / 96.485_332_123_31)).abs() < 1.0e-9);
    assert_eq!(record.energies["Temperature"], vec![600.0, 599.0]);

    let forces = record.forces.expect("forces recorded");
    assert_eq!(forces.len(), 1);
    assert_eq!(forces[0].len(), 2);

    // the compressed candidate is absent, so trjconv falls back to traj.trr
    let specs = stub.specs.borrow();
    let trjconv = specs
        .iter()
        .find(|spec| spec.args[0] == "trjconv")
        .expect("trjconv invoked");
    assert!(trjconv.args.contains(&"traj.trr".to_string()));
}

#[test]
fn mdrun_failure_aborts_the_run_before_any_extraction() {
    let temp = TempDir::new().expect("tempdir should be created");
    let xyz = stage_xyz(temp.path());
    let dest = temp.path().join("run");
    let stub = EngineStub::failing_at("mdrun");

    let request = RunRequest::new(&xyz, &dest);
    let error = pipeline::run(&request, &RunConfig::default(), &stub, &BuiltinConverter)
        .expect_err("mdrun failure should surface");

    assert_eq!(error.category(), MdErrorCategory::Simulation);
    assert_eq!(error.diagnostic(), Some("Fatal error: stage fell over"));

    let invocations = stub.invocations();
    assert!(invocations.iter().any(|name| name.contains("mdrun")));
    assert!(!invocations.iter().any(|name| name.contains("trjconv")));
    assert!(!invocations.iter().any(|name| name.contains("energy")));
    assert!(!invocations.iter().any(|name| name == "gmx traj"));
}

#[test]
fn grompp_failure_stops_the_run_before_mdrun() {
    let temp = TempDir::new().expect("tempdir should be created");
    let xyz = stage_xyz(temp.path());
    let dest = temp.path().join("run");
    let stub = EngineStub::failing_at("grompp");

    let request = RunRequest::new(&xyz, &dest);
    let error = pipeline::run(&request, &RunConfig::default(), &stub, &BuiltinConverter)
        .expect_err("grompp failure should surface");

    assert_eq!(error.category(), MdErrorCategory::Compile);
    assert!(!stub
        .invocations()
        .iter()
        .any(|name| name.contains("mdrun")));
}

#[test]
fn isomers_read_every_trajectory_frame() {
    let temp = TempDir::new().expect("tempdir should be created");
    let xyz = stage_xyz(temp.path());
    let dest = temp.path().join("run");
    let stub = EngineStub::new();

    let request = RunRequest::new(&xyz, &dest);
    let record = pipeline::run(&request, &RunConfig::default(), &stub, &BuiltinConverter)
        .expect("full run should succeed");

    let frames =
        pipeline::isomers(&record, &BuiltinConverter).expect("isomer read should succeed");
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].symbols, vec!["O_3", "H_"]);
    // nm on disk, Angstrom in memory
    assert!((frames[1].positions_ang[1][0] - 1.06).abs() < 1.0e-6);
}

#[test]
fn caller_supplied_topology_skips_the_topology_tool() {
    let temp = TempDir::new().expect("tempdir should be created");
    let xyz = stage_xyz(temp.path());
    let dest = temp.path().join("run");
    fs::create_dir_all(&dest).expect("dest created");
    let top = temp.path().join("custom.top");
    let itp = temp.path().join("custom.itp");
    fs::write(&top, SAMPLE_TOP).expect("top staged");
    fs::write(&itp, SAMPLE_ITP).expect("itp staged");
    let stub = EngineStub::new();

    let mut request = RunRequest::new(&xyz, &dest);
    request.dry_run = true;
    request.topfile = Some(top);

    let record = pipeline::run(&request, &RunConfig::default(), &stub, &BuiltinConverter)
        .expect("dry run should succeed");
    assert!(record.top_path.ends_with("obgmx.top"));
    assert!(!stub.invocations().contains(&"obgmx".to_string()));
}
