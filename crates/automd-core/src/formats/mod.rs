//! Structure file I/O collaborator.
//!
//! Generic format conversion is outside the pipeline core; the
//! [`StructureConverter`] trait is the seam, and [`BuiltinConverter`] ships
//! the two formats the pipeline itself needs: xyz (topology-tool input) and
//! gro (engine-native, single or multi frame).

use crate::domain::{MdError, MdResult};
use std::fs;
use std::path::Path;

/// One structural snapshot. Positions are in Angstrom regardless of the
/// on-disk format (gro files store nanometers).
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub comment: String,
    pub symbols: Vec<String>,
    pub positions_ang: Vec<[f64; 3]>,
}

impl Structure {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureFormat {
    Xyz,
    Gro,
}

impl StructureFormat {
    pub fn from_path(path: &Path) -> MdResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        match extension {
            "xyz" => Ok(Self::Xyz),
            "gro" => Ok(Self::Gro),
            other => Err(MdError::format(
                "FORMAT.EXTENSION",
                format!(
                    "unrecognized structure extension '{}' for '{}'",
                    other,
                    path.display()
                ),
            )),
        }
    }
}

pub trait StructureConverter {
    /// Read every frame stored in `path`.
    fn read(&self, path: &Path) -> MdResult<Vec<Structure>>;

    /// Write a single frame to `path` in the requested format.
    fn write(&self, path: &Path, structure: &Structure, format: StructureFormat) -> MdResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinConverter;

impl StructureConverter for BuiltinConverter {
    fn read(&self, path: &Path) -> MdResult<Vec<Structure>> {
        let format = StructureFormat::from_path(path)?;
        let text = fs::read_to_string(path).map_err(|source| {
            MdError::io_system(
                "IO.STRUCTURE_READ",
                format!("failed to read structure '{}': {}", path.display(), source),
            )
        })?;
        match format {
            StructureFormat::Xyz => parse_xyz_frames(&text),
            StructureFormat::Gro => parse_gro_frames(&text),
        }
    }

    fn write(&self, path: &Path, structure: &Structure, format: StructureFormat) -> MdResult<()> {
        let rendered = match format {
            StructureFormat::Xyz => render_xyz(structure),
            StructureFormat::Gro => render_gro(structure),
        };
        fs::write(path, rendered).map_err(|source| {
            MdError::io_system(
                "IO.STRUCTURE_WRITE",
                format!("failed to write structure '{}': {}", path.display(), source),
            )
        })
    }
}

fn parse_xyz_frames(text: &str) -> MdResult<Vec<Structure>> {
    let mut lines = text.lines().peekable();
    let mut frames = Vec::new();
    while let Some(count_line) = lines.next() {
        if count_line.trim().is_empty() {
            continue;
        }
        let atom_count: usize = count_line.trim().parse().map_err(|_| {
            MdError::format(
                "FORMAT.XYZ_COUNT",
                format!("invalid xyz atom count line '{}'", count_line.trim()),
            )
        })?;
        let comment = lines.next().unwrap_or_default().to_string();
        let mut symbols = Vec::with_capacity(atom_count);
        let mut positions = Vec::with_capacity(atom_count);
        for _ in 0..atom_count {
            let line = lines.next().ok_or_else(|| {
                MdError::format(
                    "FORMAT.XYZ_TRUNCATED",
                    format!("xyz frame ended before {} atom lines", atom_count),
                )
            })?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(MdError::format(
                    "FORMAT.XYZ_ATOM",
                    format!("malformed xyz atom line '{}'", line),
                ));
            }
            symbols.push(fields[0].to_string());
            positions.push(parse_triplet(&fields[1..4], line)?);
        }
        frames.push(Structure {
            comment,
            symbols,
            positions_ang: positions,
        });
    }
    if frames.is_empty() {
        return Err(MdError::format(
            "FORMAT.XYZ_EMPTY",
            "xyz file contains no frames",
        ));
    }
    Ok(frames)
}

fn parse_triplet(fields: &[&str], line: &str) -> MdResult<[f64; 3]> {
    let mut triplet = [0.0_f64; 3];
    for (slot, field) in triplet.iter_mut().zip(fields) {
        *slot = field.parse().map_err(|_| {
            MdError::format(
                "FORMAT.COORDINATE",
                format!("invalid coordinate '{}' in line '{}'", field, line),
            )
        })?;
    }
    Ok(triplet)
}

fn render_xyz(structure: &Structure) -> String {
    let mut out = format!("{}\n{}\n", structure.len(), structure.comment);
    for (symbol, position) in structure.symbols.iter().zip(&structure.positions_ang) {
        out.push_str(&format!(
            "{:<4} {:>14.8} {:>14.8} {:>14.8}\n",
            symbol, position[0], position[1], position[2]
        ));
    }
    out
}

const NM_PER_ANG: f64 = 0.1;
const GRO_BOX_PADDING_NM: f64 = 1.0;

fn render_gro(structure: &Structure) -> String {
    let mut out = format!("{}\n{:5}\n", structure.comment, structure.len());
    for (index, (symbol, position)) in structure
        .symbols
        .iter()
        .zip(&structure.positions_ang)
        .enumerate()
    {
        let name: String = symbol.chars().take(5).collect();
        out.push_str(&format!(
            "{:>5}{:<5}{:>5}{:>5}{:>8.3}{:>8.3}{:>8.3}\n",
            1,
            "MOL",
            name,
            index + 1,
            position[0] * NM_PER_ANG,
            position[1] * NM_PER_ANG,
            position[2] * NM_PER_ANG,
        ));
    }
    let box_edge = structure
        .positions_ang
        .iter()
        .flat_map(|position| position.iter())
        .fold(0.0_f64, |acc, coord| acc.max(coord.abs()))
        * NM_PER_ANG
        + GRO_BOX_PADDING_NM;
    out.push_str(&format!(
        "{:>10.5}{:>10.5}{:>10.5}\n",
        box_edge, box_edge, box_edge
    ));
    out
}

fn parse_gro_frames(text: &str) -> MdResult<Vec<Structure>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut cursor = 0;
    let mut frames = Vec::new();
    while cursor < lines.len() {
        if lines[cursor].trim().is_empty() {
            cursor += 1;
            continue;
        }
        let comment = lines[cursor].to_string();
        let count_line = lines.get(cursor + 1).ok_or_else(|| {
            MdError::format("FORMAT.GRO_TRUNCATED", "gro frame missing atom count line")
        })?;
        let atom_count: usize = count_line.trim().parse().map_err(|_| {
            MdError::format(
                "FORMAT.GRO_COUNT",
                format!("invalid gro atom count line '{}'", count_line.trim()),
            )
        })?;
        // title + count + atoms + box vector line
        let frame_end = cursor + 2 + atom_count + 1;
        if frame_end > lines.len() {
            return Err(MdError::format(
                "FORMAT.GRO_TRUNCATED",
                format!("gro frame ended before {} atom lines plus box", atom_count),
            ));
        }
        let mut symbols = Vec::with_capacity(atom_count);
        let mut positions = Vec::with_capacity(atom_count);
        for line in &lines[cursor + 2..cursor + 2 + atom_count] {
            let (symbol, position) = parse_gro_atom_line(line)?;
            symbols.push(symbol);
            positions.push(position);
        }
        frames.push(Structure {
            comment,
            symbols,
            positions_ang: positions,
        });
        cursor = frame_end;
    }
    if frames.is_empty() {
        return Err(MdError::format(
            "FORMAT.GRO_EMPTY",
            "gro file contains no frames",
        ));
    }
    Ok(frames)
}

/// Atom name lives in byte columns 10..15, coordinates in three
/// fixed-width fields of 8 starting at column 20 (nm).
fn parse_gro_atom_line(line: &str) -> MdResult<(String, [f64; 3])> {
    if line.len() < 44 || !line.is_ascii() {
        return Err(MdError::format(
            "FORMAT.GRO_ATOM",
            format!("gro atom line too short or non-ascii: '{}'", line),
        ));
    }
    let name = line[10..15].trim().to_string();
    let mut position = [0.0_f64; 3];
    for (axis, slot) in position.iter_mut().enumerate() {
        let start = 20 + axis * 8;
        let field = line[start..start + 8].trim();
        *slot = field.parse::<f64>().map_err(|_| {
            MdError::format(
                "FORMAT.GRO_ATOM",
                format!("invalid gro coordinate '{}' in line '{}'", field, line),
            )
        })? / NM_PER_ANG;
    }
    Ok((name, position))
}

#[cfg(test)]
mod tests {
    use super::{BuiltinConverter, Structure, StructureConverter, StructureFormat};
    use tempfile::TempDir;

    fn water_fragment() -> Structure {
        Structure {
            comment: "h2o fragment".to_string(),
            symbols: vec!["O".to_string(), "H".to_string()],
            positions_ang: vec![[0.0, 0.0, 0.0], [0.96, 0.0, 0.0]],
        }
    }

    #[test]
    fn xyz_written_frames_read_back_identically() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("mol.xyz");
        BuiltinConverter
            .write(&path, &water_fragment(), StructureFormat::Xyz)
            .expect("xyz write should succeed");

        let frames = BuiltinConverter.read(&path).expect("xyz read should succeed");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].symbols, vec!["O", "H"]);
        assert!((frames[0].positions_ang[1][0] - 0.96).abs() < 1.0e-8);
    }

    #[test]
    fn gro_writer_places_names_in_fixed_columns() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("input.gro");
        BuiltinConverter
            .write(&path, &water_fragment(), StructureFormat::Gro)
            .expect("gro write should succeed");

        let text = std::fs::read_to_string(&path).expect("gro should be readable");
        let atom_line = text.lines().nth(2).expect("first atom line exists");
        assert_eq!(&atom_line[10..15], "    O");

        let frames = BuiltinConverter.read(&path).expect("gro read should succeed");
        assert_eq!(frames[0].symbols, vec!["O", "H"]);
        // nm on disk, Angstrom in memory
        assert!((frames[0].positions_ang[1][0] - 0.96).abs() < 1.0e-6);
    }

    #[test]
    fn multi_frame_gro_yields_one_structure_per_frame() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("output.gro");
        let frame = "frame t= 0.0\n    2\n    1MOL      O    1   0.000   0.000   0.000\n    1MOL      H    2   0.096   0.000   0.000\n   1.00000   1.00000   1.00000\n";
        std::fs::write(&path, format!("{}{}", frame, frame)).expect("fixture staged");

        let frames = BuiltinConverter.read(&path).expect("multi-frame read");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].symbols, vec!["O", "H"]);
    }

    #[test]
    fn unknown_extension_is_a_format_error() {
        let error = StructureFormat::from_path(std::path::Path::new("mol.cube"))
            .expect_err("cube is not supported");
        assert_eq!(error.placeholder(), "FORMAT.EXTENSION");
    }

    #[test]
    fn truncated_xyz_frame_fails_loudly() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("broken.xyz");
        std::fs::write(&path, "3\ncomment\nO 0.0 0.0 0.0\n").expect("fixture staged");
        let error = BuiltinConverter
            .read(&path)
            .expect_err("short frame should fail");
        assert_eq!(error.placeholder(), "FORMAT.XYZ_TRUNCATED");
    }
}
