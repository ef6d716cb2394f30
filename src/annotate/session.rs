//! The annotation session state machine.
//!
//! One [`AnnotationSession`] owns the annotation state of exactly one
//! scene. Every operation is a synchronous state transition returning a
//! typed outcome; the UI layer renders outcomes and the highlight state,
//! it never shares mutable state with the engine.
//!
//! Switching modes clears only the transient selection / preview /
//! highlight pointers. Accumulated annotations survive every mode switch
//! and are discarded only by [`AnnotationSession::clear_annotations`] or
//! by loading a new scene.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::palette::HighlightState;
use crate::graph::SceneGraph;

/// Active annotation mode. Modes are mutually exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationMode {
    #[default]
    Off,
    Similarity,
    Attribute,
    Relationship,
}

impl AnnotationMode {
    /// Wire name used in the export document's `annotation_type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationMode::Off => "all",
            AnnotationMode::Similarity => "similarity",
            AnnotationMode::Attribute => "attribute",
            AnnotationMode::Relationship => "relationship",
        }
    }
}

/// Binary validation verdict. Absence from a validation map means
/// unvalidated; there is no stored third state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validation {
    Correct,
    Incorrect,
}

/// A reviewed similar-object pair. Pairs are unordered: (a, b) and (b, a)
/// are the same annotation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityAnnotation {
    pub id1: i64,
    pub id2: i64,
    pub label1: String,
    pub label2: String,
    #[serde(rename = "sameClass")]
    pub same_class: bool,
    pub timestamp: DateTime<Utc>,
}

impl SimilarityAnnotation {
    /// Canonical `(min, max)` form used for pair identity.
    pub fn canonical(&self) -> (i64, i64) {
        canonical_pair(self.id1, self.id2)
    }
}

#[inline]
fn canonical_pair(a: i64, b: i64) -> (i64, i64) {
    (a.min(b), a.max(b))
}

/// An attribute created during review. Kept apart from predicted
/// attributes: the export shapes differ (predicted entries carry a
/// `validation` field, added entries none).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddedAttribute {
    pub id: String,
    pub object_id: i64,
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

/// A relationship created during review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddedRelationship {
    pub id: String,
    pub subject_id: i64,
    pub object_id: i64,
    pub predicate: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of [`AnnotationSession::toggle_similar`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimilarityOutcome {
    Added,
    Removed,
    /// Self-pair, unknown object, or no selection: state unchanged.
    Ignored,
}

/// Outcome of a validation toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationOutcome {
    Set,
    Cleared,
}

/// One row of the ranked similar-object candidate list.
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityCandidate {
    pub id: i64,
    pub label: String,
    pub same_class: bool,
    pub already_annotated: bool,
}

/// Per-mode totals for the review stats panel and export summaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub similarity_total: usize,
    pub attributes_predicted: usize,
    pub attributes_correct: usize,
    pub attributes_incorrect: usize,
    pub attributes_added: usize,
    pub relationships_predicted: usize,
    pub relationships_correct: usize,
    pub relationships_incorrect: usize,
    pub relationships_added: usize,
}

/// Annotation state for one scene.
pub struct AnnotationSession {
    graph: SceneGraph,
    mode: AnnotationMode,
    selected: Option<i64>,
    previewed: Option<i64>,
    highlights: HighlightState,

    pub(crate) similarity: Vec<SimilarityAnnotation>,
    pub(crate) attribute_validations: HashMap<String, Validation>,
    pub(crate) added_attributes: Vec<AddedAttribute>,
    pub(crate) relationship_validations: HashMap<usize, Validation>,
    pub(crate) added_relationships: Vec<AddedRelationship>,

    /// Monotonic counter feeding generated ids; unique within the session.
    next_seq: u64,
}

impl AnnotationSession {
    /// Start a fresh session over a loaded scene graph.
    pub fn new(graph: SceneGraph) -> Self {
        Self {
            graph,
            mode: AnnotationMode::Off,
            selected: None,
            previewed: None,
            highlights: HighlightState::new(),
            similarity: Vec::new(),
            attribute_validations: HashMap::new(),
            added_attributes: Vec::new(),
            relationship_validations: HashMap::new(),
            added_relationships: Vec::new(),
            next_seq: 0,
        }
    }

    /// Replace the scene. This is the irreversible reset: all annotation
    /// state belongs to the outgoing scene and is discarded with it.
    /// Export first if persistence is wanted.
    pub fn load_scene(&mut self, graph: SceneGraph) {
        *self = AnnotationSession::new(graph);
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn mode(&self) -> AnnotationMode {
        self.mode
    }

    /// Switch the annotation mode. Clears the preview pointer and the
    /// highlight assignments; the current selection and all accumulated
    /// annotation data are kept.
    pub fn set_mode(&mut self, mode: AnnotationMode) {
        self.mode = mode;
        self.previewed = None;
        self.highlights.clear();
    }

    // ------------------------------------------------------------------
    // Transient pointers
    // ------------------------------------------------------------------

    pub fn selected(&self) -> Option<i64> {
        self.selected
    }

    pub fn select_object(&mut self, object_id: Option<i64>) {
        self.selected = object_id;
        self.previewed = None;
    }

    pub fn previewed(&self) -> Option<i64> {
        self.previewed
    }

    /// Toggle the candidate preview pointer.
    pub fn toggle_preview(&mut self, candidate_id: i64) {
        if self.previewed == Some(candidate_id) {
            self.previewed = None;
        } else {
            self.previewed = Some(candidate_id);
        }
    }

    pub fn highlights(&self) -> &HighlightState {
        &self.highlights
    }

    /// Toggle an object's highlight color.
    pub fn highlight(&mut self, object_id: i64) {
        self.highlights.toggle(object_id);
    }

    /// Highlight both neighbors of an in-between relation.
    pub fn highlight_pair(&mut self, a: i64, b: i64) {
        self.highlights.assign_pair(a, b);
    }

    pub fn clear_highlights(&mut self) {
        self.highlights.clear();
    }

    // ------------------------------------------------------------------
    // Similarity mode
    // ------------------------------------------------------------------

    pub fn similarity_annotations(&self) -> &[SimilarityAnnotation] {
        &self.similarity
    }

    /// Toggle the similarity pair `(a, b)`. Inserting records whether the
    /// two objects share a class label; removing needs only canonical
    /// pair identity. Self-pairs and unknown objects are ignored.
    pub fn toggle_similar(&mut self, a: i64, b: i64) -> SimilarityOutcome {
        if a == b {
            warn!("Ignoring self-similarity for object {}", a);
            return SimilarityOutcome::Ignored;
        }
        let key = canonical_pair(a, b);
        if let Some(pos) = self.similarity.iter().position(|ann| ann.canonical() == key) {
            self.similarity.remove(pos);
            self.previewed = None;
            return SimilarityOutcome::Removed;
        }

        let (Some(obj1), Some(obj2)) = (self.graph.object_by_id(a), self.graph.object_by_id(b))
        else {
            warn!("Ignoring similarity for unknown object pair ({}, {})", a, b);
            return SimilarityOutcome::Ignored;
        };
        let label1 = obj1.primary_label();
        let label2 = obj2.primary_label();
        self.similarity.push(SimilarityAnnotation {
            id1: a,
            id2: b,
            same_class: obj1.labels.first() == obj2.labels.first(),
            label1,
            label2,
            timestamp: Utc::now(),
        });
        self.previewed = None;
        SimilarityOutcome::Added
    }

    /// Toggle a similarity pair between the selected object and a
    /// candidate. A no-op without a selection.
    pub fn toggle_similar_with_selected(&mut self, candidate_id: i64) -> SimilarityOutcome {
        match self.selected {
            Some(selected) => self.toggle_similar(selected, candidate_id),
            None => {
                warn!("No object selected; ignoring similarity toggle");
                SimilarityOutcome::Ignored
            }
        }
    }

    /// Remove a similarity annotation by list position.
    pub fn remove_similarity(&mut self, index: usize) {
        if index < self.similarity.len() {
            self.similarity.remove(index);
        }
    }

    /// Ranked candidates for the selected object: same-class first, then
    /// label order. Annotation status is flagged but deliberately not a
    /// sort key, so rows hold still while the reviewer toggles them.
    pub fn similarity_candidates(&self) -> Vec<SimilarityCandidate> {
        let Some(selected) = self.selected else {
            return Vec::new();
        };
        let first_class = self
            .graph
            .object_by_id(selected)
            .and_then(|o| o.labels.first().cloned());

        let mut candidates: Vec<SimilarityCandidate> = self
            .graph
            .objects
            .iter()
            .filter(|o| o.id != selected)
            .map(|o| {
                let key = canonical_pair(selected, o.id);
                SimilarityCandidate {
                    id: o.id,
                    label: o.primary_label(),
                    same_class: o.labels.first() == first_class.as_ref(),
                    already_annotated: self
                        .similarity
                        .iter()
                        .any(|ann| ann.canonical() == key),
                }
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.same_class
                .cmp(&a.same_class)
                .then_with(|| a.label.cmp(&b.label))
        });
        candidates
    }

    // ------------------------------------------------------------------
    // Attribute mode
    // ------------------------------------------------------------------

    pub fn attribute_validation(&self, attr_id: &str) -> Option<Validation> {
        self.attribute_validations.get(attr_id).copied()
    }

    /// Validate a predicted attribute. Re-applying the same verdict clears
    /// the entry back to unvalidated.
    pub fn validate_attribute(&mut self, attr_id: &str, status: Validation) -> ValidationOutcome {
        if self.attribute_validations.get(attr_id) == Some(&status) {
            self.attribute_validations.remove(attr_id);
            ValidationOutcome::Cleared
        } else {
            self.attribute_validations.insert(attr_id.to_string(), status);
            ValidationOutcome::Set
        }
    }

    pub fn added_attributes(&self) -> &[AddedAttribute] {
        &self.added_attributes
    }

    /// Record an attribute the model missed. Returns the generated id.
    pub fn add_attribute(&mut self, object_id: i64, name: impl Into<String>) -> String {
        let id = format!("added_{}_{}", object_id, self.next_seq());
        self.added_attributes.push(AddedAttribute {
            id: id.clone(),
            object_id,
            name: name.into(),
            timestamp: Utc::now(),
        });
        id
    }

    pub fn remove_added_attribute(&mut self, attr_id: &str) -> bool {
        let before = self.added_attributes.len();
        self.added_attributes.retain(|a| a.id != attr_id);
        self.added_attributes.len() != before
    }

    // ------------------------------------------------------------------
    // Relationship mode
    // ------------------------------------------------------------------

    pub fn relationship_validation(&self, index: usize) -> Option<Validation> {
        self.relationship_validations.get(&index).copied()
    }

    /// Validate a predicted relationship by its positional index in the
    /// scene graph's relationship array. Same toggle semantics as
    /// attributes; the positional key is preserved for wire compatibility
    /// with existing exports.
    pub fn validate_relationship(&mut self, index: usize, status: Validation) -> ValidationOutcome {
        if self.relationship_validations.get(&index) == Some(&status) {
            self.relationship_validations.remove(&index);
            ValidationOutcome::Cleared
        } else {
            self.relationship_validations.insert(index, status);
            ValidationOutcome::Set
        }
    }

    pub fn added_relationships(&self) -> &[AddedRelationship] {
        &self.added_relationships
    }

    /// Record a relationship the model missed. Returns the generated id.
    pub fn add_relationship(
        &mut self,
        subject_id: i64,
        object_id: i64,
        predicate: impl Into<String>,
    ) -> String {
        let id = format!("added_rel_{}_{}_{}", subject_id, object_id, self.next_seq());
        self.added_relationships.push(AddedRelationship {
            id: id.clone(),
            subject_id,
            object_id,
            predicate: predicate.into(),
            timestamp: Utc::now(),
        });
        id
    }

    pub fn remove_added_relationship(&mut self, rel_id: &str) -> bool {
        let before = self.added_relationships.len();
        self.added_relationships.retain(|r| r.id != rel_id);
        self.added_relationships.len() != before
    }

    // ------------------------------------------------------------------
    // Shared
    // ------------------------------------------------------------------

    /// Discard every accumulated annotation. Mode and selection survive.
    pub fn clear_annotations(&mut self) {
        self.similarity.clear();
        self.attribute_validations.clear();
        self.added_attributes.clear();
        self.relationship_validations.clear();
        self.added_relationships.clear();
    }

    /// Per-mode totals for the stats panel and export summaries.
    pub fn validation_summary(&self) -> ValidationSummary {
        fn count<K>(map: &HashMap<K, Validation>, v: Validation) -> usize {
            map.values().filter(|&&s| s == v).count()
        }
        ValidationSummary {
            similarity_total: self.similarity.len(),
            attributes_predicted: self.graph.attributes.len(),
            attributes_correct: count(&self.attribute_validations, Validation::Correct),
            attributes_incorrect: count(&self.attribute_validations, Validation::Incorrect),
            attributes_added: self.added_attributes.len(),
            relationships_predicted: self.graph.relationships.len(),
            relationships_correct: count(&self.relationship_validations, Validation::Correct),
            relationships_incorrect: count(&self.relationship_validations, Validation::Incorrect),
            relationships_added: self.added_relationships.len(),
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}
