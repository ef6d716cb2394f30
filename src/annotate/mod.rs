//! The three-mode annotation engine.
//!
//! - [`session`] - mode-scoped state machine over one scene's annotations
//! - [`export`] - the JSON document consumed by the downstream evaluators
//! - [`palette`] - highlight colors handed to the rendering collaborator
//!
//! ## Example
//!
//! ```ignore
//! use scannotate::annotate::{AnnotationMode, AnnotationSession, Validation};
//! use scannotate::graph::SceneGraph;
//!
//! let graph = SceneGraph::from_json(&std::fs::read_to_string("scene_graph.json")?)?;
//! let mut session = AnnotationSession::new(graph);
//!
//! session.set_mode(AnnotationMode::Similarity);
//! session.select_object(Some(4));
//! session.toggle_similar_with_selected(17);
//!
//! session.set_mode(AnnotationMode::Attribute);
//! session.validate_attribute("a12", Validation::Correct);
//!
//! std::fs::write("annotations.json", session.export().to_json()?)?;
//! ```

pub mod export;
pub mod palette;
pub mod session;

pub use export::{AnnotationDocument, ImportReport};
pub use palette::{HighlightColor, HighlightState, HIGHLIGHT_PALETTE};
pub use session::{
    AddedAttribute, AddedRelationship, AnnotationMode, AnnotationSession, SimilarityAnnotation,
    SimilarityCandidate, SimilarityOutcome, Validation, ValidationOutcome, ValidationSummary,
};
