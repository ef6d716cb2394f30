//! PLY geometry decoding.
//!
//! Parses ASCII and binary-little-endian PLY files as emitted by the
//! ScanNet / 3RScan / MultiScan pipelines into flat geometry buffers for
//! the rendering collaborator.
//!
//! The decoder is deliberately forgiving: real scan exports are routinely
//! truncated or carry NaN vertices, and a partial decode of a damaged
//! file is far more useful than a refusal. See [`DecodeStats`] for what
//! was recovered.
//!
//! ## Example
//!
//! ```ignore
//! use scannotate::ply;
//!
//! let geometry = ply::decode_file("scene0011_00_vh_clean_2.ply")?;
//! println!("{} vertices, {} faces", geometry.vertex_count(), geometry.face_count());
//! ```

pub mod decode;
pub mod header;

pub use decode::{srgb_to_linear, DecodeStats, Geometry, DEFAULT_MAX_POINTS};
pub use header::{parse_header, PlyFormat, PlyHeader, VertexLayout, HEADER_PROBE_LEN};

use std::fs::File;
use std::io::Read;
use std::path::Path;

use memmap2::Mmap;

use crate::util::{Error, Result};

/// Decode a PLY buffer, ASCII or binary-little-endian.
///
/// The format is taken from the header's `format` line. A buffer without
/// a recognizable header is the only hard failure; damaged payloads decode
/// partially.
pub fn decode(bytes: &[u8]) -> Result<Geometry> {
    let header = header::parse_header(bytes)?;
    match header.format {
        PlyFormat::BinaryLittleEndian => decode::decode_binary(bytes, &header),
        PlyFormat::Ascii => {
            let text = String::from_utf8_lossy(bytes);
            decode::decode_ascii(&text, &header)
        }
    }
}

/// Decode PLY text known to be ASCII.
pub fn decode_str(text: &str) -> Result<Geometry> {
    let header = header::parse_header(text.as_bytes())?;
    decode::decode_ascii(text, &header)
}

/// Decode a PLY file from disk.
///
/// Large scans are memory-mapped; if mapping fails the file is read into
/// memory instead. A missing or unreadable file fails this call only and
/// leaves no other state behind.
pub fn decode_file(path: impl AsRef<Path>) -> Result<Geometry> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;

    // Safety: the file is opened read-only and the map does not outlive it.
    match unsafe { Mmap::map(&file) } {
        Ok(mmap) => decode(&mmap),
        Err(_) => {
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)?;
            decode(&bytes)
        }
    }
}
