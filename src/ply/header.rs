//! PLY header parsing.
//!
//! The header is scanned once into a typed decode plan: a vertex layout
//! with absolute byte offsets for the properties we interpret, and the
//! per-record widths needed to skip everything else. The decode loops in
//! [`crate::ply::decode`] then run off that fixed plan.

use crate::util::{Error, Result};

/// How many leading bytes are probed for the ASCII header.
///
/// Headers emitted by the ScanNet / 3RScan / MultiScan pipelines fit well
/// within this window.
pub const HEADER_PROBE_LEN: usize = 2000;

/// Storage format declared by the header's `format` line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlyFormat {
    /// Whitespace-delimited text records.
    Ascii,
    /// Packed little-endian records.
    BinaryLittleEndian,
}

/// Byte layout of one vertex record, derived from the declared properties.
#[derive(Clone, Debug)]
pub struct VertexLayout {
    /// Total bytes per vertex record.
    pub stride: usize,
    /// Absolute offset of the x coordinate within the record.
    pub x_offset: usize,
    /// Absolute offset of the y coordinate within the record.
    pub y_offset: usize,
    /// Absolute offset of the z coordinate within the record.
    pub z_offset: usize,
    /// Coordinates are float64 rather than float32.
    pub xyz_is_double: bool,
    /// Start offset of a contiguous uchar red/green/blue[/alpha] block.
    pub color_offset: Option<usize>,
    /// Layout was estimated because the header declared no usable
    /// vertex properties.
    pub estimated: bool,
}

/// Parsed PLY header: counts, format and the decode plan.
#[derive(Clone, Debug)]
pub struct PlyHeader {
    pub format: PlyFormat,
    pub vertex_count: usize,
    pub face_count: usize,
    pub vertex: VertexLayout,
    /// Fixed bytes to skip after each face's vertex indices (scalar face
    /// properties declared beyond `vertex_indices`).
    pub face_extra_bytes: usize,
    pub has_normals: bool,
    /// A uchar red/green/blue block was declared (drives ASCII color
    /// columns as well as the binary color offset).
    pub has_colors: bool,
    /// Byte offset of the first payload byte (just past `end_header\n`).
    pub payload_start: usize,
    /// Number of header lines including `end_header` (ASCII row offset).
    pub header_lines: usize,
}

/// Byte width of a declared property type. Unknown types are counted as
/// zero width and left uninterpreted.
fn property_width(type_name: &str) -> usize {
    match type_name {
        "char" | "uchar" | "int8" | "uint8" => 1,
        "short" | "ushort" | "int16" | "uint16" => 2,
        "int" | "uint" | "int32" | "uint32" | "float" | "float32" => 4,
        "double" | "float64" => 8,
        _ => 0,
    }
}

/// Which element's property list the scan is currently inside.
enum Section {
    None,
    Vertex,
    Face,
}

/// Parse the header out of the leading bytes of a PLY buffer.
///
/// Only the first [`HEADER_PROBE_LEN`] bytes are examined. A buffer with
/// no recognizable `end_header` line is a hard [`Error::MalformedHeader`];
/// every other irregularity degrades to an estimated layout instead.
pub fn parse_header(bytes: &[u8]) -> Result<PlyHeader> {
    let probe = &bytes[..bytes.len().min(HEADER_PROBE_LEN)];

    let mut format = None;
    let mut vertex_count = 0usize;
    let mut face_count = 0usize;
    let mut has_normals = false;
    let mut has_colors = false;

    let mut section = Section::None;
    let mut stride = 0usize;
    let mut x_offset = 0usize;
    let mut y_offset = 4usize;
    let mut z_offset = 8usize;
    let mut xyz_is_double = false;
    let mut color_offset = None;
    let mut face_extra_bytes = 0usize;

    let mut payload_start = None;
    let mut header_lines = 0usize;

    let mut pos = 0usize;
    for raw_line in probe.split(|&b| b == b'\n') {
        let line_len = raw_line.len() + 1; // includes the newline
        let line = String::from_utf8_lossy(raw_line);
        let line = line.trim();
        header_lines += 1;

        if line == "end_header" {
            payload_start = Some(pos + line_len);
            break;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["format", fmt, ..] => {
                format = Some(match *fmt {
                    "ascii" => PlyFormat::Ascii,
                    "binary_little_endian" => PlyFormat::BinaryLittleEndian,
                    other => {
                        return Err(Error::malformed(format!(
                            "unsupported format: {}",
                            other
                        )))
                    }
                });
            }
            ["element", "vertex", count, ..] => {
                vertex_count = count.parse().unwrap_or(0);
                section = Section::Vertex;
                stride = 0;
            }
            ["element", "face", count, ..] => {
                face_count = count.parse().unwrap_or(0);
                section = Section::Face;
                face_extra_bytes = 0;
            }
            ["element", ..] => {
                // Some other element (e.g. edge) ends both accumulations.
                section = Section::None;
            }
            ["property", "list", ..] => {
                // The face vertex_indices list is handled by the face decode
                // loop itself; a list anywhere else cannot be skipped with a
                // fixed width and is left to the defensive abort paths.
            }
            ["property", type_name, prop_name] => match section {
                Section::Vertex => {
                    match (*type_name, *prop_name) {
                        ("float" | "float32", "x") => x_offset = stride,
                        ("double" | "float64", "x") => {
                            x_offset = stride;
                            xyz_is_double = true;
                        }
                        ("float" | "float32" | "double" | "float64", "y") => y_offset = stride,
                        ("float" | "float32" | "double" | "float64", "z") => z_offset = stride,
                        ("uchar" | "uint8", "red") => {
                            color_offset = Some(stride);
                            has_colors = true;
                        }
                        ("uchar" | "uint8", "green" | "blue") => has_colors = true,
                        (_, "nx" | "ny" | "nz") => has_normals = true,
                        _ => {}
                    }
                    stride += property_width(type_name);
                }
                Section::Face => {
                    face_extra_bytes += property_width(type_name);
                }
                Section::None => {}
            },
            _ => {}
        }

        pos += line_len;
    }

    let payload_start =
        payload_start.ok_or_else(|| Error::malformed("no end_header line found"))?;
    let format = format.ok_or_else(|| Error::malformed("no format line found"))?;

    // A header that never yielded a usable vertex width gets a conservative
    // estimate so decoding can still proceed.
    let estimated = stride == 0;
    if estimated {
        stride = 12;
        if has_normals {
            stride += 12;
        }
        if has_colors {
            stride += 4;
            color_offset = Some(if has_normals { 24 } else { 12 });
        }
        x_offset = 0;
        y_offset = 4;
        z_offset = 8;
        xyz_is_double = false;
    }

    Ok(PlyHeader {
        format,
        vertex_count,
        face_count,
        vertex: VertexLayout {
            stride,
            x_offset,
            y_offset,
            z_offset,
            xyz_is_double,
            color_offset,
            estimated,
        },
        face_extra_bytes,
        has_normals,
        has_colors,
        payload_start,
        header_lines,
    })
}
