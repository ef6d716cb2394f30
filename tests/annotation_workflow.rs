//! Integration tests for the full annotation workflow: load a scene,
//! review in every mode, export, and re-import.

use scannotate::annotate::{
    AnnotationDocument, AnnotationMode, AnnotationSession, SimilarityOutcome, Validation,
};
use scannotate::graph::{convert_multiscan, InferenceThresholds, MultiScanAnnotations, SceneGraph};

const SCENE_JSON: &str = r#"{
    "id": "scene0042_00",
    "objects": [
        {"id": 1, "labels": ["chair"],
         "bbox": {"center": [0.0, 0.0, 0.5], "half_dims": [0.4, 0.4, 0.5], "rotation": [0,0,0,1]}},
        {"id": 2, "labels": ["chair"],
         "bbox": {"center": [2.0, 0.0, 0.5], "half_dims": [0.4, 0.4, 0.5], "rotation": [0,0,0,1]}},
        {"id": 3, "labels": ["table"],
         "bbox": {"center": [1.0, 0.0, 0.4], "half_dims": [0.8, 0.5, 0.4], "rotation": [0,0,0,1]}},
        {"id": 4, "labels": ["lamp"],
         "bbox": {"center": [1.0, 0.0, 1.0], "half_dims": [0.1, 0.1, 0.2], "rotation": [0,0,0,1]}}
    ],
    "relationships": [
        {"subject_id": 3, "name": "in between", "recipient_id": [1, 2]},
        {"subject_id": 4, "name": "on top of", "recipient_id": [3]},
        {"subject_id": 1, "name": "next to", "recipient_id": [3]}
    ],
    "attributes": [
        {"id": "a1", "object_id": 1, "name": "wooden", "type": "material"},
        {"id": "a2", "object_id": 3, "name": "round", "type": "shape"},
        {"id": "a3", "object_id": 4, "name": "metal", "type": "material"}
    ]
}"#;

fn session() -> AnnotationSession {
    AnnotationSession::new(SceneGraph::from_json(SCENE_JSON).unwrap())
}

#[test]
fn test_full_review_roundtrip() {
    let mut session = session();

    // Similarity pass.
    session.set_mode(AnnotationMode::Similarity);
    session.select_object(Some(1));
    assert_eq!(
        session.toggle_similar_with_selected(2),
        SimilarityOutcome::Added
    );

    // Attribute pass.
    session.set_mode(AnnotationMode::Attribute);
    session.validate_attribute("a1", Validation::Correct);
    session.validate_attribute("a2", Validation::Incorrect);
    let added_attr = session.add_attribute(4, "warm");

    // Relationship pass.
    session.set_mode(AnnotationMode::Relationship);
    session.validate_relationship(1, Validation::Correct);
    let added_rel = session.add_relationship(4, 3, "part of");

    // Export, serialize, parse and import into a fresh session over the
    // same scene.
    let json = session.export().to_json().unwrap();
    let doc = AnnotationDocument::from_json(&json).unwrap();

    let mut fresh = AnnotationSession::new(SceneGraph::from_json(SCENE_JSON).unwrap());
    let report = fresh.import(&doc);

    assert_eq!(report.scene_mismatch, None);
    assert_eq!(fresh.similarity_annotations().len(), 1);
    assert!(fresh.similarity_annotations()[0].same_class);
    assert_eq!(fresh.attribute_validation("a1"), Some(Validation::Correct));
    assert_eq!(fresh.attribute_validation("a2"), Some(Validation::Incorrect));
    assert_eq!(fresh.attribute_validation("a3"), None);
    assert_eq!(fresh.relationship_validation(1), Some(Validation::Correct));
    assert_eq!(fresh.relationship_validation(0), None);
    assert_eq!(fresh.added_attributes()[0].id, added_attr);
    assert_eq!(fresh.added_relationships()[0].id, added_rel);
}

#[test]
fn test_in_between_only_from_the_middle() {
    let session = session();
    let graph = session.graph();

    let between: Vec<_> = graph.in_between_relationships(3).collect();
    assert_eq!(between.len(), 1);
    assert_eq!(between[0].1.recipients.as_slice(), &[1, 2]);

    // Recipients of the ternary relation do not see it as in-between.
    assert_eq!(graph.in_between_relationships(1).count(), 0);
    assert_eq!(graph.in_between_relationships(2).count(), 0);
}

#[test]
fn test_mode_toggles_keep_data_isolated() {
    let mut session = session();

    session.set_mode(AnnotationMode::Similarity);
    session.toggle_similar(1, 2);
    session.highlight(3);

    // Cycling through every mode must not disturb annotation data.
    for mode in [
        AnnotationMode::Attribute,
        AnnotationMode::Relationship,
        AnnotationMode::Off,
        AnnotationMode::Similarity,
    ] {
        session.set_mode(mode);
        assert_eq!(session.similarity_annotations().len(), 1);
    }
    // But the highlight pointer did reset on the first switch.
    assert!(session.highlights().is_empty());
}

#[test]
fn test_multiscan_conversion_feeds_a_session() {
    let doc = MultiScanAnnotations::from_json(
        r#"{
            "scanId": "scene_00065_00",
            "objects": [
                {"objectId": 1, "label": "desk", "mobilityType": "fixed",
                 "partIds": [100],
                 "obb": {"centroid": [0, 0.4, 0], "axesLengths": [1.2, 0.8, 0.6],
                         "normalizedAxes": [1,0,0, 0,1,0, 0,0,1]}},
                {"objectId": 2, "label": "monitor", "mobilityType": "movable",
                 "partIds": [200],
                 "obb": {"centroid": [0, 0.95, 0], "axesLengths": [0.5, 0.3, 0.1],
                         "normalizedAxes": [1,0,0, 0,1,0, 0,0,1]}}
            ],
            "parts": [
                {"partId": 100},
                {"partId": 200, "articulations": [{"type": "rotation"}]}
            ]
        }"#,
    )
    .unwrap();

    let graph = convert_multiscan(&doc, &InferenceThresholds::default());
    assert_eq!(graph.id, "scene_00065_00");

    // Monitor sits 0.55 above the desk with overlapping footprints:
    // inside (0.05, 0.5]? No - 0.55 exceeds max_sep, so no edge.
    assert!(graph.relationships.is_empty());

    let names: Vec<_> = graph.attributes_for(2).map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["movable", "rotatable"]);

    // The converted graph drives a session like any native one.
    let mut session = AnnotationSession::new(graph);
    session.set_mode(AnnotationMode::Attribute);
    let id = session
        .graph()
        .attributes_for(2)
        .next()
        .map(|a| a.id.clone())
        .unwrap();
    session.validate_attribute(&id, Validation::Correct);
    let doc = session.export();
    assert_eq!(doc.attributes.summary.correct, 1);
}

#[test]
fn test_import_from_other_scene_warns() {
    let mut session = session();
    session.toggle_similar(1, 2);
    let mut doc = session.export();
    doc.scene_id = "scene0001_00".into();

    let mut other = AnnotationSession::new(SceneGraph::from_json(SCENE_JSON).unwrap());
    let report = other.import(&doc);
    assert!(report.scene_mismatch.is_some());
    assert_eq!(other.similarity_annotations().len(), 1);
}
