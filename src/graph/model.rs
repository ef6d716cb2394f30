//! In-memory scene-graph model.
//!
//! A read-only view over the `scene_graph.json` shape shared by the
//! ScanNet / 3RScan exports (and produced for MultiScan by
//! [`crate::graph::multiscan`]). Entities are immutable after load; all
//! review-time mutation lives in [`crate::annotate`].

use std::cell::OnceCell;
use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use smallvec::SmallVec;

use crate::geom::Obb;
use crate::util::Result;

/// One segmented object with its oriented bounding box.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: i64,
    #[serde(default)]
    pub labels: SmallVec<[String; 1]>,
    pub bbox: Obb,
    #[serde(rename = "mobilityType", default, skip_serializing_if = "Option::is_none")]
    pub mobility_type: Option<String>,
    #[serde(rename = "partIds", default, skip_serializing_if = "Vec::is_empty")]
    pub part_ids: Vec<i64>,
}

impl SceneObject {
    /// The display label: first entry of `labels`, or a placeholder.
    pub fn primary_label(&self) -> String {
        self.labels
            .first()
            .cloned()
            .unwrap_or_else(|| format!("Object {}", self.id))
    }
}

/// A predicted relationship edge. `recipients` usually holds one target;
/// two or more targets with a "between" predicate form a ternary
/// in-between relation whose subject is the middle element.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub subject_id: i64,
    #[serde(rename = "name")]
    pub predicate: String,
    #[serde(rename = "recipient_id", default)]
    pub recipients: SmallVec<[i64; 2]>,
}

impl Relationship {
    /// True for a ternary in-between relation (two or more recipients and
    /// a predicate containing "between").
    pub fn is_in_between(&self) -> bool {
        self.recipients.len() >= 2 && self.predicate.to_lowercase().contains("between")
    }
}

/// A predicted attribute of one object. Read-only during review; see
/// [`crate::annotate::AddedAttribute`] for reviewer-created entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub object_id: i64,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Accept either a JSON string or number as an attribute id, the way a
/// JS object key would coerce it.
fn id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

/// A loaded scene graph: objects, relationships and attributes for one
/// scene, with adjacency accessors.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SceneGraph {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub objects: Vec<SceneObject>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(skip)]
    predicates: OnceCell<Vec<String>>,
}

impl SceneGraph {
    /// Assemble a scene graph from already-built parts (used by dataset
    /// converters). Rotations are sanitized like the JSON loaders do.
    pub fn new(
        id: impl Into<String>,
        objects: Vec<SceneObject>,
        relationships: Vec<Relationship>,
        attributes: Vec<Attribute>,
    ) -> SceneGraph {
        let mut graph = SceneGraph {
            id: id.into(),
            objects,
            relationships,
            attributes,
            predicates: OnceCell::new(),
        };
        graph.sanitize();
        graph
    }

    /// Parse a scene graph from JSON text and sanitize its rotations.
    pub fn from_json(text: &str) -> Result<SceneGraph> {
        let mut graph: SceneGraph = serde_json::from_str(text)?;
        graph.sanitize();
        Ok(graph)
    }

    /// Parse a scene graph from a reader.
    pub fn from_reader(reader: impl std::io::Read) -> Result<SceneGraph> {
        let mut graph: SceneGraph = serde_json::from_reader(reader)?;
        graph.sanitize();
        Ok(graph)
    }

    /// Normalize every bbox rotation; degenerate quaternions become
    /// identity. Called by the loaders so the unit-rotation invariant
    /// holds from load onward.
    pub fn sanitize(&mut self) {
        for obj in &mut self.objects {
            obj.bbox.sanitize_rotation();
        }
    }

    /// Look up an object by id.
    pub fn object_by_id(&self, id: i64) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    /// Predicted attributes of one object.
    pub fn attributes_for(&self, id: i64) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(move |a| a.object_id == id)
    }

    /// Relationships where `id` is the subject, excluding in-between
    /// relations, paired with their positional index (the validation key).
    pub fn outgoing_relationships(&self, id: i64) -> impl Iterator<Item = (usize, &Relationship)> {
        self.relationships
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.subject_id == id && !r.is_in_between())
    }

    /// Relationships where `id` appears among the recipients, paired with
    /// their positional index.
    pub fn incoming_relationships(&self, id: i64) -> impl Iterator<Item = (usize, &Relationship)> {
        self.relationships
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.subject_id != id && r.recipients.contains(&id))
    }

    /// In-between relations where `id` is the middle element, paired with
    /// their positional index. The first two recipients are the neighbors
    /// for display. A relation is never in-between from a recipient's
    /// point of view.
    pub fn in_between_relationships(
        &self,
        id: i64,
    ) -> impl Iterator<Item = (usize, &Relationship)> {
        self.relationships
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.subject_id == id && r.is_in_between())
    }

    /// All distinct predicates across the scene, sorted. Collected lazily
    /// and cached; used to populate added-relationship pickers.
    pub fn predicate_set(&self) -> &[String] {
        self.predicates.get_or_init(|| {
            let set: BTreeSet<&str> = self
                .relationships
                .iter()
                .map(|r| r.predicate.as_str())
                .collect();
            set.into_iter().map(String::from).collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> SceneGraph {
        SceneGraph::from_json(
            r#"{
                "id": "scene0011_00",
                "objects": [
                    {"id": 3, "labels": ["chair"],
                     "bbox": {"center": [0,0,0], "half_dims": [1,1,1], "rotation": [0,0,0,1]}},
                    {"id": 5, "labels": ["table"],
                     "bbox": {"center": [1,0,0], "half_dims": [1,1,1], "rotation": [0,0,0,2]}},
                    {"id": 9, "labels": ["chair"],
                     "bbox": {"center": [2,0,0], "half_dims": [1,1,1], "rotation": [0,0,0,1]}}
                ],
                "relationships": [
                    {"subject_id": 5, "name": "in between", "recipient_id": [3, 9]},
                    {"subject_id": 3, "name": "next to", "recipient_id": [5]},
                    {"subject_id": 9, "name": "next to", "recipient_id": [5]}
                ],
                "attributes": [
                    {"id": 1, "object_id": 3, "name": "wooden", "type": "material"},
                    {"id": "a2", "object_id": 5, "name": "round"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_rotation_sanitized_on_load() {
        let graph = sample_graph();
        let obj = graph.object_by_id(5).unwrap();
        assert!((obj.bbox.rotation.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_in_between_classification() {
        let graph = sample_graph();
        // Object 5 is the middle element of the ternary relation.
        let between: Vec<_> = graph.in_between_relationships(5).collect();
        assert_eq!(between.len(), 1);
        let (idx, rel) = between[0];
        assert_eq!(idx, 0);
        assert_eq!(rel.recipients.as_slice(), &[3, 9]);

        // The same relation is not in-between from a recipient's view.
        assert_eq!(graph.in_between_relationships(3).count(), 0);

        // And it is excluded from object 5's plain outgoing set.
        assert_eq!(graph.outgoing_relationships(5).count(), 0);
    }

    #[test]
    fn test_incoming_relationships() {
        let graph = sample_graph();
        let incoming: Vec<_> = graph.incoming_relationships(5).collect();
        assert_eq!(incoming.len(), 2);
        assert!(incoming.iter().all(|(_, r)| r.predicate == "next to"));
    }

    #[test]
    fn test_attribute_id_coercion() {
        let graph = sample_graph();
        let ids: Vec<_> = graph.attributes.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "a2"]);
        assert_eq!(graph.attributes_for(3).count(), 1);
    }

    #[test]
    fn test_predicate_set_sorted_distinct() {
        let graph = sample_graph();
        let predicates: Vec<&str> = graph.predicate_set().iter().map(String::as_str).collect();
        assert_eq!(predicates, vec!["in between", "next to"]);
        // Second call returns the cached slice.
        assert_eq!(graph.predicate_set().len(), 2);
    }

    #[test]
    fn test_primary_label_fallback() {
        let graph = sample_graph();
        assert_eq!(graph.object_by_id(3).unwrap().primary_label(), "chair");
        let anon = SceneObject {
            id: 42,
            labels: SmallVec::new(),
            bbox: Obb::default(),
            mobility_type: None,
            part_ids: Vec::new(),
        };
        assert_eq!(anon.primary_label(), "Object 42");
    }
}
