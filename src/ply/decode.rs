//! PLY payload decoding.
//!
//! Binary records are decoded off the fixed [`VertexLayout`] plan built by
//! the header parser; ASCII records use the conventional `x y z [r g b]`
//! column order since text rows are token streams, not byte-addressed.
//!
//! Nothing in here throws on damaged payloads. Truncation halts the loop
//! with whatever was fully read, bad face indices and degenerate faces are
//! dropped, and non-finite coordinates are zeroed; all of it is counted in
//! [`DecodeStats`] and logged.

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

use super::header::{PlyHeader, VertexLayout};
use crate::util::Result;

/// Default point cap for [`Geometry::downsample`].
pub const DEFAULT_MAX_POINTS: usize = 200_000;

/// Decoded geometry handed to the rendering collaborator.
#[derive(Clone, Debug, Default)]
pub struct Geometry {
    /// Flat xyz triples.
    pub points: Vec<f32>,
    /// Flat linear-space rgb triples; empty when the file has no colors.
    pub colors: Vec<f32>,
    /// Flat triangle index triples; empty when the file has no faces.
    pub indices: Vec<u32>,
    pub has_colors: bool,
    pub has_faces: bool,
    pub stats: DecodeStats,
}

impl Geometry {
    /// Number of decoded vertices.
    pub fn vertex_count(&self) -> usize {
        self.points.len() / 3
    }

    /// Number of decoded triangles.
    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Deterministic stride downsampling to at most `max_points` vertices.
    ///
    /// Returns `self` unchanged when faces are present: sampling would
    /// desynchronize the face indices from the vertex array.
    #[must_use]
    pub fn downsample(self, max_points: usize) -> Geometry {
        let n = self.vertex_count();
        if self.has_faces || max_points == 0 || n <= max_points {
            return self;
        }

        let step = n / max_points;
        debug!("Sampling point cloud from {} to ~{} points", n, max_points);

        let mut points = Vec::with_capacity(max_points * 3 + 3);
        let mut colors = Vec::with_capacity(if self.has_colors { max_points * 3 + 3 } else { 0 });
        let mut v = 0;
        while v < n {
            points.extend_from_slice(&self.points[v * 3..v * 3 + 3]);
            if self.has_colors && (v + 1) * 3 <= self.colors.len() {
                colors.extend_from_slice(&self.colors[v * 3..v * 3 + 3]);
            }
            v += step;
        }

        Geometry {
            has_colors: self.has_colors && !colors.is_empty(),
            points,
            colors,
            indices: Vec::new(),
            has_faces: false,
            stats: self.stats,
        }
    }
}

/// Counts of what the decode loops declared, recovered and dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub declared_vertices: usize,
    pub recovered_vertices: usize,
    pub declared_faces: usize,
    pub recovered_faces: usize,
    /// Faces dropped for an out-of-range index or all-origin vertices.
    pub dropped_faces: usize,
}

impl DecodeStats {
    /// Whether the payload ended before all declared records were read.
    pub fn truncated(&self) -> bool {
        self.recovered_vertices < self.declared_vertices
    }
}

/// Convert an sRGB channel value in `[0, 1]` to linear space.
#[inline]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn sanitize(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Bounds-checked coordinate read; anything past the buffer reads as 0.
#[inline]
fn read_coord(buf: &[u8], offset: usize, is_double: bool) -> f32 {
    if is_double {
        match buf.get(offset..offset + 8) {
            Some(b) => LittleEndian::read_f64(b) as f32,
            None => 0.0,
        }
    } else {
        match buf.get(offset..offset + 4) {
            Some(b) => LittleEndian::read_f32(b),
            None => 0.0,
        }
    }
}

/// Is the vertex at `index` exactly the origin (likely a zeroed NaN)?
#[inline]
fn is_origin(points: &[f32], index: usize) -> bool {
    points[index * 3] == 0.0 && points[index * 3 + 1] == 0.0 && points[index * 3 + 2] == 0.0
}

/// Decode the binary payload after the header using the prepared layout.
pub fn decode_binary(bytes: &[u8], header: &PlyHeader) -> Result<Geometry> {
    let payload = &bytes[header.payload_start.min(bytes.len())..];
    let layout = &header.vertex;
    debug!(
        "Binary PLY: {} vertices x {} bytes, xyz at {}/{}/{} ({}), colors at {:?}, {} faces (+{} extra bytes)",
        header.vertex_count,
        layout.stride,
        layout.x_offset,
        layout.y_offset,
        layout.z_offset,
        if layout.xyz_is_double { "f64" } else { "f32" },
        layout.color_offset,
        header.face_count,
        header.face_extra_bytes,
    );

    let mut geometry = Geometry {
        has_colors: layout.color_offset.is_some(),
        has_faces: header.face_count > 0,
        ..Geometry::default()
    };
    geometry.stats.declared_vertices = header.vertex_count;
    geometry.stats.declared_faces = header.face_count;
    // Size the allocation by what the buffer can actually hold, not by a
    // possibly garbage declared count.
    let expected = header
        .vertex_count
        .min(payload.len() / layout.stride.max(1));
    geometry.points.reserve(expected * 3);

    let mut offset = 0usize;
    for i in 0..header.vertex_count {
        if offset + layout.stride > payload.len() {
            warn!("Buffer ended at vertex {} of {}", i, header.vertex_count);
            break;
        }

        let x = sanitize(read_coord(payload, offset + layout.x_offset, layout.xyz_is_double));
        let y = sanitize(read_coord(payload, offset + layout.y_offset, layout.xyz_is_double));
        let z = sanitize(read_coord(payload, offset + layout.z_offset, layout.xyz_is_double));
        geometry.points.extend_from_slice(&[x, y, z]);

        if let Some(c) = layout.color_offset {
            // Alpha, when declared, sits after blue and is skipped.
            if let Some(rgb) = payload.get(offset + c..offset + c + 3) {
                geometry.colors.push(srgb_to_linear(rgb[0] as f32 / 255.0));
                geometry.colors.push(srgb_to_linear(rgb[1] as f32 / 255.0));
                geometry.colors.push(srgb_to_linear(rgb[2] as f32 / 255.0));
            }
        }

        offset += layout.stride;
    }
    geometry.stats.recovered_vertices = geometry.vertex_count();

    decode_binary_faces(payload, &mut offset, header, &mut geometry);

    geometry.has_colors = geometry.has_colors && !geometry.colors.is_empty();
    debug!(
        "Recovered {}/{} vertices, {}/{} faces ({} dropped)",
        geometry.stats.recovered_vertices,
        geometry.stats.declared_vertices,
        geometry.stats.recovered_faces,
        geometry.stats.declared_faces,
        geometry.stats.dropped_faces,
    );
    Ok(geometry)
}

fn decode_binary_faces(
    payload: &[u8],
    offset: &mut usize,
    header: &PlyHeader,
    geometry: &mut Geometry,
) {
    if header.face_count == 0 {
        return;
    }
    let extra = header.face_extra_bytes;
    let max_vertex = geometry.vertex_count();

    for i in 0..header.face_count {
        if *offset + 1 > payload.len() {
            warn!("Buffer ended at face {} of {}", i, header.face_count);
            break;
        }
        let num_verts = payload[*offset] as usize;
        *offset += 1;

        if num_verts == 3 && *offset + 12 + extra <= payload.len() {
            let v0 = LittleEndian::read_i32(&payload[*offset..]);
            let v1 = LittleEndian::read_i32(&payload[*offset + 4..]);
            let v2 = LittleEndian::read_i32(&payload[*offset + 8..]);
            *offset += 12 + extra;

            let in_range = |v: i32| v >= 0 && (v as usize) < max_vertex;
            if in_range(v0) && in_range(v1) && in_range(v2) {
                let (v0, v1, v2) = (v0 as usize, v1 as usize, v2 as usize);
                // A triangle whose corners all collapsed to the origin is
                // sanitized garbage, not geometry.
                if is_origin(&geometry.points, v0)
                    && is_origin(&geometry.points, v1)
                    && is_origin(&geometry.points, v2)
                {
                    geometry.stats.dropped_faces += 1;
                } else {
                    geometry
                        .indices
                        .extend_from_slice(&[v0 as u32, v1 as u32, v2 as u32]);
                }
            } else {
                geometry.stats.dropped_faces += 1;
            }
        } else if num_verts >= 1 && num_verts <= 9 {
            // Non-triangle face: skip its indices and extra properties.
            *offset += num_verts * 4 + extra;
            if *offset > payload.len() {
                warn!("Buffer ended while skipping a {}-gon face", num_verts);
                break;
            }
        } else {
            warn!("Implausible face vertex count {} at face {}", num_verts, i);
            break;
        }
    }
    geometry.stats.recovered_faces = geometry.face_count();
}

/// Decode an ASCII payload. Rows are assumed to follow the conventional
/// `x y z [r g b]` column order.
pub fn decode_ascii(text: &str, header: &PlyHeader) -> Result<Geometry> {
    let mut geometry = Geometry {
        has_colors: header.has_colors,
        has_faces: header.face_count > 0,
        ..Geometry::default()
    };
    geometry.stats.declared_vertices = header.vertex_count;
    geometry.stats.declared_faces = header.face_count;

    let mut rows = text.lines().skip(header.header_lines);

    for _ in 0..header.vertex_count {
        let Some(row) = rows.next() else {
            warn!(
                "ASCII payload ended at vertex {} of {}",
                geometry.vertex_count(),
                header.vertex_count
            );
            break;
        };
        let cols: Vec<&str> = row.split_whitespace().collect();
        if cols.len() < 3 {
            continue;
        }
        let parse = |s: &str| sanitize(s.parse::<f32>().unwrap_or(0.0));
        geometry
            .points
            .extend_from_slice(&[parse(cols[0]), parse(cols[1]), parse(cols[2])]);

        if header.has_colors && cols.len() >= 6 {
            for c in &cols[3..6] {
                let channel = c.parse::<f32>().unwrap_or(0.0) / 255.0;
                geometry.colors.push(srgb_to_linear(channel));
            }
        }
    }
    geometry.stats.recovered_vertices = geometry.vertex_count();

    let max_vertex = geometry.vertex_count();
    for _ in 0..header.face_count {
        let Some(row) = rows.next() else { break };
        let cols: Vec<&str> = row.split_whitespace().collect();
        if cols.is_empty() {
            continue;
        }
        let num_verts: usize = cols[0].parse().unwrap_or(0);
        if num_verts == 3 && cols.len() >= 4 {
            let parsed: Vec<i64> = cols[1..4]
                .iter()
                .map(|c| c.parse::<i64>().unwrap_or(-1))
                .collect();
            if parsed.iter().all(|&v| v >= 0 && (v as usize) < max_vertex) {
                geometry
                    .indices
                    .extend(parsed.iter().map(|&v| v as u32));
            } else {
                geometry.stats.dropped_faces += 1;
            }
        }
    }
    geometry.stats.recovered_faces = geometry.face_count();

    geometry.has_colors = !geometry.colors.is_empty();
    Ok(geometry)
}
