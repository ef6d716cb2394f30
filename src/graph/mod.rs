//! Scene-graph model and dataset conversion.
//!
//! - [`model`] - the loaded scene graph and its adjacency queries
//! - [`multiscan`] - MultiScan conversion and spatial relation inference

pub mod model;
pub mod multiscan;

pub use model::{Attribute, Relationship, SceneGraph, SceneObject};
pub use multiscan::{
    convert_multiscan, infer_on_top_of, InferenceThresholds, MultiScanAnnotations, UpAxis,
};
