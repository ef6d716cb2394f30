//! Annotation document export and import.
//!
//! The document layout is a wire contract: the downstream evaluation
//! scripts consume these files as ground truth, and earlier review
//! sessions must re-import cleanly. Field names and nesting follow the
//! established exports exactly, including the positional `index` key for
//! predicted relationships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::session::{
    AddedAttribute, AddedRelationship, AnnotationSession, SimilarityAnnotation, Validation,
};
use crate::util::Result;

/// Exported annotation state for one scene.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnotationDocument {
    pub scene_id: String,
    pub timestamp: DateTime<Utc>,
    /// Mode active at export time, or "all".
    pub annotation_type: String,
    #[serde(default)]
    pub similarity: SimilaritySection,
    #[serde(default)]
    pub attributes: AttributeSection,
    #[serde(default)]
    pub relationships: RelationshipSection,
}

impl AnnotationDocument {
    /// Parse a previously exported document.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize for writing to disk.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimilaritySection {
    #[serde(default)]
    pub annotations: Vec<SimilarityAnnotation>,
    #[serde(default)]
    pub summary: SimilaritySummary,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SimilaritySummary {
    pub total: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AttributeSection {
    #[serde(default)]
    pub predicted: PredictedAttributes,
    #[serde(default)]
    pub added: Vec<AddedAttribute>,
    #[serde(default)]
    pub summary: SectionSummary,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PredictedAttributes {
    pub total: usize,
    #[serde(default)]
    pub items: Vec<PredictedAttributeItem>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PredictedAttributeItem {
    pub id: String,
    pub object_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub validation: Option<Validation>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RelationshipSection {
    #[serde(default)]
    pub predicted: PredictedRelationships,
    #[serde(default)]
    pub added: Vec<AddedRelationship>,
    #[serde(default)]
    pub summary: SectionSummary,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PredictedRelationships {
    pub total: usize,
    #[serde(default)]
    pub items: Vec<PredictedRelationshipItem>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PredictedRelationshipItem {
    /// Positional index in the scene graph's relationship array - the
    /// validation key. Reordering that array between export and import
    /// misapplies validations; see DESIGN.md.
    pub index: usize,
    pub subject_id: i64,
    pub predicate: String,
    pub object_ids: Vec<i64>,
    pub validation: Option<Validation>,
}

/// Shared correct/incorrect/added summary block.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SectionSummary {
    pub predicted_total: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub added: usize,
}

/// What an import did, and anything the caller should surface.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Set when the document belongs to a different scene: `(document
    /// scene, loaded scene)`. The import proceeds regardless.
    pub scene_mismatch: Option<(String, String)>,
    pub similarity_loaded: usize,
    pub attribute_validations_loaded: usize,
    pub added_attributes_loaded: usize,
    pub relationship_validations_loaded: usize,
    pub added_relationships_loaded: usize,
}

impl AnnotationSession {
    /// Export the full annotation state as one document.
    pub fn export(&self) -> AnnotationDocument {
        let summary = self.validation_summary();
        let graph = self.graph();

        let attribute_items: Vec<PredictedAttributeItem> = graph
            .attributes
            .iter()
            .map(|attr| PredictedAttributeItem {
                id: attr.id.clone(),
                object_id: attr.object_id,
                name: attr.name.clone(),
                kind: attr.kind.clone(),
                validation: self.attribute_validation(&attr.id),
            })
            .collect();

        let relationship_items: Vec<PredictedRelationshipItem> = graph
            .relationships
            .iter()
            .enumerate()
            .map(|(index, rel)| PredictedRelationshipItem {
                index,
                subject_id: rel.subject_id,
                predicate: rel.predicate.clone(),
                object_ids: rel.recipients.to_vec(),
                validation: self.relationship_validation(index),
            })
            .collect();

        AnnotationDocument {
            scene_id: graph.id.clone(),
            timestamp: Utc::now(),
            annotation_type: self.mode().as_str().to_string(),
            similarity: SimilaritySection {
                summary: SimilaritySummary {
                    total: summary.similarity_total,
                },
                annotations: self.similarity.clone(),
            },
            attributes: AttributeSection {
                predicted: PredictedAttributes {
                    total: summary.attributes_predicted,
                    items: attribute_items,
                },
                added: self.added_attributes.clone(),
                summary: SectionSummary {
                    predicted_total: summary.attributes_predicted,
                    correct: summary.attributes_correct,
                    incorrect: summary.attributes_incorrect,
                    added: summary.attributes_added,
                },
            },
            relationships: RelationshipSection {
                predicted: PredictedRelationships {
                    total: summary.relationships_predicted,
                    items: relationship_items,
                },
                added: self.added_relationships.clone(),
                summary: SectionSummary {
                    predicted_total: summary.relationships_predicted,
                    correct: summary.relationships_correct,
                    incorrect: summary.relationships_incorrect,
                    added: summary.relationships_added,
                },
            },
        }
    }

    /// Load a previously exported document, fully replacing the current
    /// similarity list, both validation maps and both added-entry lists.
    /// Nothing is merged. A scene mismatch is reported, not refused.
    pub fn import(&mut self, doc: &AnnotationDocument) -> ImportReport {
        let mut report = ImportReport::default();

        let loaded_scene = self.graph().id.clone();
        if !doc.scene_id.is_empty() && doc.scene_id != loaded_scene {
            warn!(
                "Annotation document is for scene {:?} but scene {:?} is loaded",
                doc.scene_id, loaded_scene
            );
            report.scene_mismatch = Some((doc.scene_id.clone(), loaded_scene));
        }

        self.similarity = doc.similarity.annotations.clone();
        report.similarity_loaded = self.similarity.len();

        self.attribute_validations = doc
            .attributes
            .predicted
            .items
            .iter()
            .filter_map(|item| item.validation.map(|v| (item.id.clone(), v)))
            .collect();
        report.attribute_validations_loaded = self.attribute_validations.len();

        self.added_attributes = doc.attributes.added.clone();
        report.added_attributes_loaded = self.added_attributes.len();

        self.relationship_validations = doc
            .relationships
            .predicted
            .items
            .iter()
            .filter_map(|item| item.validation.map(|v| (item.index, v)))
            .collect();
        report.relationship_validations_loaded = self.relationship_validations.len();

        self.added_relationships = doc.relationships.added.clone();
        report.added_relationships_loaded = self.added_relationships.len();

        info!(
            "Imported annotations: {} similarity, {} attribute validations, {} relationship validations",
            report.similarity_loaded,
            report.attribute_validations_loaded,
            report.relationship_validations_loaded,
        );
        report
    }
}
