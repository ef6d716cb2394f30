//! MultiScan conversion and spatial relation inference.
//!
//! MultiScan annotation exports carry no native relationship metadata, so
//! the common scene-graph shape is synthesized here: part-of edges from
//! the part hierarchy, mobility and articulation attributes, and an
//! O(n^2) "on top of" pass over object geometry with empirically tuned,
//! overridable thresholds.

use glam::Vec3;
use serde::Deserialize;
use smallvec::smallvec;
use std::collections::HashMap;
use tracing::debug;

use super::model::{Attribute, Relationship, SceneGraph, SceneObject};
use crate::geom::Obb;
use crate::util::Result;

/// Vertical axis used by the on-top-of pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpAxis {
    X,
    Y,
    Z,
}

impl UpAxis {
    fn index(self) -> usize {
        match self {
            UpAxis::X => 0,
            UpAxis::Y => 1,
            UpAxis::Z => 2,
        }
    }

    /// The two horizontal axes (the plane orthogonal to up).
    fn horizontal(self) -> (usize, usize) {
        match self {
            UpAxis::X => (1, 2),
            UpAxis::Y => (0, 2),
            UpAxis::Z => (0, 1),
        }
    }
}

/// Thresholds for the on-top-of inference, in scene units (meters).
///
/// The values have no documented derivation; they were tuned on MultiScan
/// scenes and are kept overridable rather than buried in the pass.
#[derive(Clone, Copy, Debug)]
pub struct InferenceThresholds {
    /// Maximum gap between the upper object's lower surface and the lower
    /// object's upper surface.
    pub surface_gap: f32,
    /// Center separations at or below this are ambiguous overlap and emit
    /// nothing.
    pub min_sep: f32,
    /// Center separations above this are unrelated stacking and emit
    /// nothing.
    pub max_sep: f32,
    pub up_axis: UpAxis,
}

impl Default for InferenceThresholds {
    fn default() -> Self {
        Self {
            surface_gap: 0.1,
            min_sep: 0.05,
            max_sep: 0.5,
            up_axis: UpAxis::Y,
        }
    }
}

// ============================================================================
// MultiScan annotations wire format
// ============================================================================

/// Root of a MultiScan `*.annotations.json` document (the fields this
/// conversion consumes).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MultiScanAnnotations {
    #[serde(rename = "scanId", default)]
    pub scan_id: Option<String>,
    #[serde(default)]
    pub objects: Vec<MultiScanObject>,
    #[serde(default)]
    pub parts: Vec<MultiScanPart>,
}

impl MultiScanAnnotations {
    /// Parse a MultiScan annotations document from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct MultiScanObject {
    #[serde(rename = "objectId")]
    pub object_id: i64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub obb: Option<MultiScanObb>,
    #[serde(rename = "mobilityType", default)]
    pub mobility_type: Option<String>,
    #[serde(rename = "partIds", default)]
    pub part_ids: Vec<i64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MultiScanObb {
    #[serde(default)]
    pub centroid: [f32; 3],
    #[serde(rename = "axesLengths", default = "unit_lengths")]
    pub axes_lengths: [f32; 3],
    #[serde(rename = "normalizedAxes", default)]
    pub normalized_axes: Vec<f32>,
}

fn unit_lengths() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

#[derive(Clone, Debug, Deserialize)]
pub struct MultiScanPart {
    #[serde(rename = "partId")]
    pub part_id: i64,
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub articulations: Vec<Articulation>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Articulation {
    #[serde(rename = "type")]
    pub kind: String,
}

// ============================================================================
// Conversion
// ============================================================================

/// Convert a MultiScan annotations document into the common scene-graph
/// shape, inferring relationships and attributes it lacks natively.
pub fn convert_multiscan(
    doc: &MultiScanAnnotations,
    thresholds: &InferenceThresholds,
) -> SceneGraph {
    let objects: Vec<SceneObject> = doc
        .objects
        .iter()
        .map(|obj| {
            let bbox = match &obj.obb {
                Some(obb) => Obb::from_multiscan(
                    Vec3::from_array(obb.centroid),
                    Vec3::from_array(obb.axes_lengths),
                    &obb.normalized_axes,
                ),
                None => Obb::default(),
            };
            SceneObject {
                id: obj.object_id,
                labels: smallvec![obj
                    .label
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string())],
                bbox,
                mobility_type: Some(
                    obj.mobility_type
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string()),
                ),
                part_ids: obj.part_ids.clone(),
            }
        })
        .collect();

    // Mobility types other than "unknown" become attributes ('fixed',
    // 'movable').
    let mut attr_names: HashMap<i64, Vec<String>> = HashMap::new();
    for obj in &objects {
        if let Some(mobility) = &obj.mobility_type {
            if mobility != "unknown" {
                attr_names.entry(obj.id).or_default().push(mobility.clone());
            }
        }
    }

    let part_to_object: HashMap<i64, i64> = objects
        .iter()
        .flat_map(|o| o.part_ids.iter().map(move |&p| (p, o.id)))
        .collect();

    // Part-of edges from the part hierarchy, and articulation attributes.
    let mut relationships = Vec::new();
    for part in &doc.parts {
        if let Some(parent_id) = part.parent_id {
            let child = part_to_object.get(&part.part_id);
            let parent = part_to_object.get(&parent_id);
            if let (Some(&child), Some(&parent)) = (child, parent) {
                if child != parent {
                    relationships.push(Relationship {
                        subject_id: child,
                        predicate: "part of".to_string(),
                        recipients: smallvec![parent],
                    });
                }
            }
        }

        if part.articulations.is_empty() {
            continue;
        }
        let Some(&obj_id) = part_to_object.get(&part.part_id) else {
            continue;
        };
        for articulation in &part.articulations {
            let name = match articulation.kind.as_str() {
                "rotation" => "rotatable",
                "translation" => "slidable",
                _ => continue,
            };
            let names = attr_names.entry(obj_id).or_default();
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }

    relationships.extend(infer_on_top_of(&objects, thresholds));

    // Flatten per-object attribute names into the common list shape with
    // generated ids.
    let mut attributes = Vec::new();
    for obj in &objects {
        if let Some(names) = attr_names.get(&obj.id) {
            for (n, name) in names.iter().enumerate() {
                attributes.push(Attribute {
                    id: format!("{}_{}", obj.id, n),
                    object_id: obj.id,
                    name: name.clone(),
                    kind: None,
                });
            }
        }
    }

    debug!(
        "Converted MultiScan scan: {} objects, {} relationships, {} attributes",
        objects.len(),
        relationships.len(),
        attributes.len(),
    );

    SceneGraph::new(
        doc.scan_id.clone().unwrap_or_else(|| "unknown".to_string()),
        objects,
        relationships,
        attributes,
    )
}

/// Emit a directed "on top of" edge for every object pair that stacks
/// within the thresholds, from the higher-centered object to the lower.
pub fn infer_on_top_of(
    objects: &[SceneObject],
    thresholds: &InferenceThresholds,
) -> Vec<Relationship> {
    let up = thresholds.up_axis.index();
    let (h0, h1) = thresholds.up_axis.horizontal();
    let mut edges = Vec::new();

    for i in 0..objects.len() {
        for j in (i + 1)..objects.len() {
            let a = &objects[i];
            let b = &objects[j];
            let ca = a.bbox.center.to_array();
            let cb = b.bbox.center.to_array();
            let ha = a.bbox.half_dims.to_array();
            let hb = b.bbox.half_dims.to_array();

            let vertical_sep = ca[up] - cb[up];
            let horizontal_dist =
                ((ca[h0] - cb[h0]).powi(2) + (ca[h1] - cb[h1]).powi(2)).sqrt();

            // Horizontally overlapping footprints only.
            if horizontal_dist >= (ha[h0] + hb[h0]).max(ha[h1] + hb[h1]) {
                continue;
            }

            // Gap between the facing surfaces; negative when the boxes
            // interpenetrate.
            let surface_gap = vertical_sep.abs() - (ha[up] + hb[up]);
            if surface_gap < thresholds.surface_gap && vertical_sep.abs() <= thresholds.max_sep {
                if vertical_sep > thresholds.min_sep {
                    edges.push(on_top_edge(a.id, b.id));
                } else if vertical_sep < -thresholds.min_sep {
                    edges.push(on_top_edge(b.id, a.id));
                }
            }
        }
    }
    edges
}

fn on_top_edge(subject: i64, object: i64) -> Relationship {
    Relationship {
        subject_id: subject,
        predicate: "on top of".to_string(),
        recipients: smallvec![object],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use smallvec::smallvec;

    fn unit_box(id: i64, up_center: f32) -> SceneObject {
        SceneObject {
            id,
            labels: smallvec!["box".to_string()],
            bbox: Obb {
                center: Vec3::new(0.0, up_center, 0.0),
                half_dims: Vec3::splat(0.5),
                rotation: Quat::IDENTITY,
            },
            mobility_type: None,
            part_ids: Vec::new(),
        }
    }

    #[test]
    fn test_on_top_of_outside_range() {
        // Separation 0.8 falls outside (0.05, 0.5]: no edge.
        let objects = vec![unit_box(1, 0.0), unit_box(2, 0.8)];
        let edges = infer_on_top_of(&objects, &InferenceThresholds::default());
        assert!(edges.is_empty());
    }

    #[test]
    fn test_on_top_of_within_range() {
        // Separation 0.3: edge from the higher object to the lower.
        let objects = vec![unit_box(1, 0.0), unit_box(2, 0.3)];
        let edges = infer_on_top_of(&objects, &InferenceThresholds::default());
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].subject_id, 2);
        assert_eq!(edges[0].recipients.as_slice(), &[1]);
        assert_eq!(edges[0].predicate, "on top of");
    }

    #[test]
    fn test_on_top_of_ambiguous_overlap() {
        // Separation 0.03 <= min_sep: ambiguous, no edge.
        let objects = vec![unit_box(1, 0.0), unit_box(2, 0.03)];
        let edges = infer_on_top_of(&objects, &InferenceThresholds::default());
        assert!(edges.is_empty());
    }

    #[test]
    fn test_on_top_of_no_horizontal_overlap() {
        let mut high = unit_box(2, 0.3);
        high.bbox.center.x = 5.0;
        let objects = vec![unit_box(1, 0.0), high];
        let edges = infer_on_top_of(&objects, &InferenceThresholds::default());
        assert!(edges.is_empty());
    }

    fn sample_doc() -> MultiScanAnnotations {
        MultiScanAnnotations::from_json(
            r#"{
                "scanId": "scene_00021_00",
                "objects": [
                    {"objectId": 1, "label": "cabinet", "mobilityType": "fixed",
                     "partIds": [10, 11],
                     "obb": {"centroid": [0,0,0], "axesLengths": [1,1,1],
                             "normalizedAxes": [1,0,0, 0,1,0, 0,0,1]}},
                    {"objectId": 2, "label": "drawer", "mobilityType": "movable",
                     "partIds": [20],
                     "obb": {"centroid": [3,0,0], "axesLengths": [1,1,1],
                             "normalizedAxes": [1,0,0, 0,1,0, 0,0,1]}}
                ],
                "parts": [
                    {"partId": 10, "parentId": 11},
                    {"partId": 11},
                    {"partId": 20, "parentId": 10,
                     "articulations": [{"type": "translation"}, {"type": "translation"}]}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_convert_part_of_suppresses_self_edges() {
        let graph = convert_multiscan(&sample_doc(), &InferenceThresholds::default());
        // Part 10 -> parent 11 both belong to object 1: self-edge dropped.
        // Part 20 (object 2) -> parent 10 (object 1): kept.
        let part_of: Vec<_> = graph
            .relationships
            .iter()
            .filter(|r| r.predicate == "part of")
            .collect();
        assert_eq!(part_of.len(), 1);
        assert_eq!(part_of[0].subject_id, 2);
        assert_eq!(part_of[0].recipients.as_slice(), &[1]);
    }

    #[test]
    fn test_convert_articulation_attributes() {
        let graph = convert_multiscan(&sample_doc(), &InferenceThresholds::default());
        let names: Vec<_> = graph.attributes_for(2).map(|a| a.name.as_str()).collect();
        // Mobility first, then slidable once despite two translation
        // articulations.
        assert_eq!(names, vec!["movable", "slidable"]);
    }

    #[test]
    fn test_convert_scene_id_and_labels() {
        let graph = convert_multiscan(&sample_doc(), &InferenceThresholds::default());
        assert_eq!(graph.id, "scene_00021_00");
        assert_eq!(graph.object_by_id(1).unwrap().primary_label(), "cabinet");
    }
}
