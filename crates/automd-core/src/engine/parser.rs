//! All textual scraping of engine tool output lives here, pinned by tests to
//! literal sample outputs so format drift across engine versions is caught in
//! one place.

use regex::Regex;

/// Extract the version number from `gmx --version` output. Matches both the
/// modern `GROMACS version:    2021.4` line and the legacy
/// `GROMACS version:  VERSION 5.1.4` spelling.
pub(crate) fn parse_version(text: &str) -> Option<String> {
    let pattern = Regex::new(r"(?im)^\s*gromacs version:?\s*(?:version\s+)?([0-9][0-9.]*)")
        .expect("version pattern is valid");
    pattern
        .captures(text)
        .map(|captures| captures[1].trim_end_matches('.').to_string())
}

pub(crate) fn version_components(version: &str) -> Vec<u32> {
    version
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}

pub(crate) fn version_at_least(version: &str, minimum: [u32; 3]) -> bool {
    let mut components = version_components(version);
    components.resize(3, 0);
    components.as_slice() >= minimum.as_slice()
}

/// Capabilities probed from `gmx mdrun -h` help text. Older engine builds do
/// not accept the PME offload selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MdrunCapabilities {
    pub pme: bool,
    pub pmefft: bool,
}

pub(crate) fn parse_mdrun_capabilities(help_text: &str) -> MdrunCapabilities {
    MdrunCapabilities {
        pme: help_text.contains("-pme "),
        pmefft: help_text.contains("-pmefft "),
    }
}
