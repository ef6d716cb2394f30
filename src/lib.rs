//! # scannotate
//!
//! Core engine of a 3D scene-graph annotation tool for ScanNet, 3RScan
//! and MultiScan scans: geometry decoding, scene-graph queries and a
//! three-mode review workflow whose exports feed the downstream
//! evaluation pipeline.
//!
//! Rendering, scene discovery and file watching are collaborators, not
//! residents: this crate hands decoded geometry, bounding boxes and
//! highlight colors outward and never calls into a renderer.
//!
//! ## Modules
//!
//! - [`util`] - Errors and math types
//! - [`ply`] - PLY decoding (ASCII / binary-little-endian)
//! - [`geom`] - Rotation conversion, bounds, oriented boxes
//! - [`graph`] - Scene-graph model and MultiScan conversion
//! - [`annotate`] - Annotation session, export/import, highlight palette
//!
//! ## Example
//!
//! ```ignore
//! use scannotate::{annotate::AnnotationSession, graph::SceneGraph, ply};
//!
//! let geometry = ply::decode_file("scene0011_00_vh_clean_2.ply")?;
//! let graph = SceneGraph::from_json(&std::fs::read_to_string("scene_graph.json")?)?;
//! let mut session = AnnotationSession::new(graph);
//! ```

pub mod annotate;
pub mod geom;
pub mod graph;
pub mod ply;
pub mod util;

// Re-export commonly used types
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::annotate::{
        AnnotationDocument, AnnotationMode, AnnotationSession, Validation,
    };
    pub use crate::geom::{compute_bounds, quaternion_from_rotation_matrix, Obb, SceneBounds};
    pub use crate::graph::{
        convert_multiscan, InferenceThresholds, MultiScanAnnotations, SceneGraph,
    };
    pub use crate::ply::{Geometry, PlyHeader};
    pub use crate::util::{Error, Result};
}
