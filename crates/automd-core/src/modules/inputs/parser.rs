//! Topology/structure text handling for atom-name reconciliation.

use crate::domain::{MdError, MdResult};

/// Atom name field of a gro atom line: byte columns 10..15.
const NAME_START: usize = 10;
const NAME_END: usize = 15;
const NAME_WIDTH: usize = 5;

/// Number of non-atom lines in a gro frame: title, atom count, box vector.
const GRO_EXTRA_LINES: usize = 3;

/// Parse the ordered force-field atom type names out of the `[ atoms ]`
/// section of an itp file. The section runs from its header to the next
/// bracketed header; comment and blank lines are skipped.
pub(super) fn parse_topology_atom_names(itp_text: &str) -> MdResult<Vec<String>> {
    let mut names = Vec::new();
    let mut in_atoms = false;
    for line in itp_text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            if in_atoms {
                break;
            }
            in_atoms = is_atoms_header(trimmed);
            continue;
        }
        if !in_atoms || trimmed.is_empty() || trimmed.starts_with(';') {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let _nr = fields.next();
        let type_name = fields.next().ok_or_else(|| {
            MdError::format(
                "FORMAT.ITP_ATOM_LINE",
                format!("atom line '{}' has no type column", trimmed),
            )
        })?;
        names.push(type_name.to_string());
    }
    if names.is_empty() {
        return Err(MdError::format(
            "FORMAT.ITP_ATOMS_SECTION",
            "no [ atoms ] section with atom entries found in topology",
        ));
    }
    Ok(names)
}

fn is_atoms_header(line: &str) -> bool {
    line.trim_start_matches('[')
        .trim_end_matches(']')
        .trim()
        .eq_ignore_ascii_case("atoms")
}

/// Rewrite the fixed-column atom-name field of every gro atom line with the
/// topology's atom names, in index order. The atom counts must agree exactly;
/// a mismatch (e.g. solvent added by the topology tool) fails loudly instead
/// of zipping to the shorter side.
pub(super) fn rewrite_gro_atom_names(gro_text: &str, names: &[String]) -> MdResult<String> {
    let lines: Vec<&str> = gro_text.lines().collect();
    if lines.len() < GRO_EXTRA_LINES {
        return Err(MdError::format(
            "FORMAT.GRO_SHAPE",
            "structure file is too short to hold a gro frame",
        ));
    }
    let atom_count: usize = lines[1].trim().parse().map_err(|_| {
        MdError::format(
            "FORMAT.GRO_SHAPE",
            format!("invalid gro atom count line '{}'", lines[1].trim()),
        )
    })?;
    if lines.len() < atom_count + GRO_EXTRA_LINES {
        return Err(MdError::format(
            "FORMAT.GRO_SHAPE",
            format!(
                "gro frame declares {} atoms but holds {} lines",
                atom_count,
                lines.len()
            ),
        ));
    }
    if atom_count != names.len() {
        return Err(MdError::format(
            "FORMAT.ATOM_COUNT",
            format!(
                "structure file has {} atom lines but topology declares {} atoms",
                atom_count,
                names.len()
            ),
        ));
    }

    let mut rewritten = Vec::with_capacity(lines.len());
    rewritten.push(lines[0].to_string());
    rewritten.push(lines[1].to_string());
    for (line, name) in lines[2..2 + atom_count].iter().zip(names) {
        rewritten.push(rewrite_name_field(line, name)?);
    }
    for line in &lines[2 + atom_count..] {
        rewritten.push((*line).to_string());
    }
    let mut text = rewritten.join("\n");
    text.push('\n');
    Ok(text)
}

fn rewrite_name_field(line: &str, name: &str) -> MdResult<String> {
    if line.len() < NAME_END || !line.is_ascii() {
        return Err(MdError::format(
            "FORMAT.GRO_ATOM_LINE",
            format!("gro atom line too short for a name field: '{}'", line),
        ));
    }
    let clipped: String = name.chars().take(NAME_WIDTH).collect();
    Ok(format!(
        "{}{:>width$}{}",
        &line[..NAME_START],
        clipped,
        &line[NAME_END..],
        width = NAME_WIDTH
    ))
}
