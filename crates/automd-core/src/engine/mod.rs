//! Engine-facing constants and the up-front availability probe.

mod parser;

pub use parser::MdrunCapabilities;
pub(crate) use parser::{parse_mdrun_capabilities, parse_version, version_at_least};

use crate::domain::{MdError, MdErrorCategory, MdResult};
use crate::process::{CommandSpec, ProcessRunner};

pub const GMX_PROGRAM: &str = "gmx";
pub const OBGMX_PROGRAM: &str = "obgmx";
pub const MIN_GROMACS_VERSION: [u32; 3] = [5, 0, 0];

/// Per-invocation environment disabling the engine's `#file.1#` backup
/// renaming. Passed explicitly on every command instead of mutating the
/// process environment, so concurrent runs cannot race on it.
pub const BACKUP_ENV_KEY: &str = "GMX_MAXBACKUP";
pub const BACKUP_ENV_VALUE: &str = "-1";

pub const GRO_FILE: &str = "input.gro";
pub const MDRUN_FILE: &str = "mdrun.mdp";
pub const TOP_FILE: &str = "obgmx.top";
pub const ITP_FILE: &str = "obgmx.itp";
pub const DEFFNM: &str = "topol";
pub const TRR_FILE: &str = "traj.trr";
pub const EDR_FILE: &str = "topol.edr";
pub const XTC_FILE: &str = "topol.xtc";
pub const OUTPUT_GRO: &str = "output.gro";
pub const ENERGY_XVG: &str = "energy.xvg";
pub const FORCE_XVG: &str = "force.xvg";

/// Verify the engine is on PATH and at least [`MIN_GROMACS_VERSION`].
/// Returns the parsed version string. Runs before any expensive stage so a
/// missing or stale install fails fast.
pub fn check_engine(runner: &dyn ProcessRunner) -> MdResult<String> {
    let spec = CommandSpec::new(GMX_PROGRAM).arg("--version");
    let output = runner.run(&spec).map_err(|source| {
        MdError::environment(
            "ENV.GMX_MISSING",
            format!("there is no gromacs; check that 'gmx' is on PATH ({})", source),
        )
    })?;
    if !output.success {
        return Err(MdError::stage(
            MdErrorCategory::Environment,
            "ENV.GMX_VERSION_CMD",
            "gmx --version exited with failure",
            output.combined,
        ));
    }
    let version = parse_version(&output.combined).ok_or_else(|| {
        MdError::stage(
            MdErrorCategory::Environment,
            "ENV.GMX_VERSION_PARSE",
            "could not find a GROMACS version line in tool output",
            output.combined.clone(),
        )
    })?;
    if !version_at_least(&version, MIN_GROMACS_VERSION) {
        return Err(MdError::environment(
            "ENV.GMX_VERSION_OLD",
            format!(
                "gromacs {} is older than the required {}.{}.{}",
                version, MIN_GROMACS_VERSION[0], MIN_GROMACS_VERSION[1], MIN_GROMACS_VERSION[2]
            ),
        ));
    }
    tracing::debug!(version = %version, "gromacs engine check passed");
    Ok(version)
}

/// Probe `gmx mdrun -h` for optional device-selection flags. Probe failures
/// degrade to "no optional flags" since the flags are an optimization, not a
/// requirement.
pub fn probe_mdrun_capabilities(runner: &dyn ProcessRunner) -> MdrunCapabilities {
    let spec = CommandSpec::new(GMX_PROGRAM).args(["mdrun", "-h"]);
    match runner.run(&spec) {
        Ok(output) => parse_mdrun_capabilities(&output.combined),
        Err(error) => {
            tracing::debug!(%error, "mdrun capability probe failed; assuming no optional flags");
            MdrunCapabilities::default()
        }
    }
}
