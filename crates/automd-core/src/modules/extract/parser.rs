//! xvg scraping for the energy and force extraction stages.

use crate::domain::{MdError, MdResult};
use regex::Regex;

/// Collect the series legends declared in an xvg header, ordered by their
/// `s<index>` number.
pub(super) fn parse_legends(xvg_text: &str) -> Vec<String> {
    let pattern = Regex::new(r#"@ s(\d+) legend "(.*)""#).expect("legend pattern is valid");
    let mut indexed: Vec<(usize, String)> = pattern
        .captures_iter(xvg_text)
        .filter_map(|captures| {
            let index = captures[1].parse().ok()?;
            Some((index, captures[2].to_string()))
        })
        .collect();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, legend)| legend).collect()
}

/// Parse the numeric block of an xvg file into rows of floats. Header lines
/// (`#`, `@`) and blanks are skipped; every data row must hold the same
/// number of columns.
pub(super) fn parse_data_block(xvg_text: &str) -> MdResult<Vec<Vec<f64>>> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for line in xvg_text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('@') {
            continue;
        }
        let row = trimmed
            .split_whitespace()
            .map(|field| {
                field.parse::<f64>().map_err(|_| {
                    MdError::format(
                        "FORMAT.XVG_FIELD",
                        format!("non-numeric field '{}' in xvg data row '{}'", field, trimmed),
                    )
                })
            })
            .collect::<MdResult<Vec<f64>>>()?;
        if let Some(first) = rows.first() {
            if row.len() != first.len() {
                return Err(MdError::format(
                    "FORMAT.XVG_ROW_WIDTH",
                    format!(
                        "xvg data row holds {} columns where earlier rows hold {}",
                        row.len(),
                        first.len()
                    ),
                ));
            }
        }
        rows.push(row);
    }
    Ok(rows)
}
