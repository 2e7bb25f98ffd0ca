//! Post-run extraction: energy series and per-atom forces, converted to
//! eV-based units.

mod parser;

use crate::domain::{ExtractedData, MdError, MdErrorCategory, MdResult};
use crate::engine::{
    BACKUP_ENV_KEY, BACKUP_ENV_VALUE, ENERGY_XVG, FORCE_XVG, GMX_PROGRAM,
};
use crate::process::{CommandSpec, ProcessRunner};
use crate::units::{self, QuantityKind};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Legend marking the boundary between energy columns and the non-energy
/// tail in `gmx energy` output. Columns before it are kJ/mol.
const TEMPERATURE_LEGEND: &str = "Temperature";

/// Upper bound (exclusive) on the term indices requested from `gmx energy`.
/// Requesting every index and letting the tool skip the absent ones avoids a
/// per-topology term listing.
const ENERGY_TERM_LIMIT: usize = 100;

/// Extract every energy term the engine recorded, keyed by its legend.
/// Energy-valued series are converted from kJ/mol to eV; the columns from
/// the temperature term onward are kept in engine units.
pub fn extract_energies(
    edr_path: &Path,
    dest_dir: &Path,
    runner: &dyn ProcessRunner,
) -> MdResult<ExtractedData> {
    let edr_name = file_name(edr_path);
    let mut selection = String::new();
    for index in 1..ENERGY_TERM_LIMIT {
        let _ = writeln!(selection, "{}", index);
    }
    let spec = CommandSpec::new(GMX_PROGRAM)
        .cwd(dest_dir)
        .env(BACKUP_ENV_KEY, BACKUP_ENV_VALUE)
        .args(["energy", "-f", edr_name, "-o", ENERGY_XVG])
        .stdin(selection);
    tracing::info!(command = %spec.render(), "extracting energy terms");
    let output = runner.run(&spec)?;
    if !output.success {
        return Err(MdError::stage(
            MdErrorCategory::Extraction,
            "RUN.ENERGY",
            "gmx energy failed to write the energy terms",
            output.combined,
        ));
    }

    let xvg_path = dest_dir.join(ENERGY_XVG);
    let xvg_text = fs::read_to_string(&xvg_path).map_err(|source| {
        MdError::io_system(
            "IO.ENERGY_XVG_READ",
            format!("failed to read '{}': {}", xvg_path.display(), source),
        )
    })?;

    let legends = parser::parse_legends(&xvg_text);
    let rows = parser::parse_data_block(&xvg_text)?;
    if legends.is_empty() || rows.is_empty() {
        return Err(MdError::stage(
            MdErrorCategory::Extraction,
            "RUN.ENERGY_EMPTY",
            format!("'{}' holds no energy series", xvg_path.display()),
            output.combined,
        ));
    }
    // First column is the time axis.
    if rows[0].len() != legends.len() + 1 {
        return Err(MdError::format(
            "FORMAT.XVG_COLUMNS",
            format!(
                "energy file declares {} legends but rows hold {} data columns",
                legends.len(),
                rows[0].len() - 1
            ),
        ));
    }

    let energy_factor = units::factor("kJ/mol", "eV", QuantityKind::Energy)?;
    let energy_columns = legends
        .iter()
        .position(|legend| legend == TEMPERATURE_LEGEND)
        .unwrap_or(0);

    let mut extracted = ExtractedData::new();
    for (column, legend) in legends.iter().enumerate() {
        let factor = if column < energy_columns {
            energy_factor
        } else {
            1.0
        };
        let series = rows.iter().map(|row| row[column + 1] * factor).collect();
        extracted.insert(legend.clone(), series);
    }
    Ok(extracted)
}

/// Extract per-atom forces for every frame, converted from kJ/mol/nm to
/// eV/Ang. Each frame holds one `[f64; 3]` vector per atom.
pub fn extract_forces(
    trr_path: &Path,
    dest_dir: &Path,
    runner: &dyn ProcessRunner,
) -> MdResult<Vec<Vec<[f64; 3]>>> {
    let trr_name = file_name(trr_path);
    let spec = CommandSpec::new(GMX_PROGRAM)
        .cwd(dest_dir)
        .env(BACKUP_ENV_KEY, BACKUP_ENV_VALUE)
        .args(["traj", "-f", trr_name, "-of", FORCE_XVG])
        .stdin("0\n");
    tracing::info!(command = %spec.render(), "extracting forces");
    let output = runner.run(&spec)?;
    if !output.success {
        return Err(MdError::stage(
            MdErrorCategory::Extraction,
            "RUN.TRAJ_FORCES",
            "gmx traj failed to write the force components",
            output.combined,
        ));
    }

    let xvg_path = dest_dir.join(FORCE_XVG);
    let xvg_text = fs::read_to_string(&xvg_path).map_err(|source| {
        MdError::io_system(
            "IO.FORCE_XVG_READ",
            format!("failed to read '{}': {}", xvg_path.display(), source),
        )
    })?;

    let rows = parser::parse_data_block(&xvg_text)?;
    if rows.is_empty() {
        return Err(MdError::stage(
            MdErrorCategory::Extraction,
            "RUN.FORCES_EMPTY",
            format!("'{}' holds no force data", xvg_path.display()),
            output.combined,
        ));
    }

    let components = rows[0].len() - 1;
    if components == 0 || components % 3 != 0 {
        return Err(MdError::format(
            "FORMAT.FORCE_SHAPE",
            format!(
                "force rows hold {} components, expected a multiple of three",
                components
            ),
        ));
    }

    let factor = units::factor("kJ/mol", "eV", QuantityKind::Energy)?
        / units::factor("nm", "Ang", QuantityKind::Length)?;
    let frames = rows
        .iter()
        .map(|row| {
            row[1..]
                .chunks_exact(3)
                .map(|atom| {
                    [atom[0] * factor, atom[1] * factor, atom[2] * factor]
                })
                .collect()
        })
        .collect();
    Ok(frames)
}

fn file_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
}
