mod common;

use beamforge::beam::BeamField;
use beamforge::error::BeamForgeError;
use beamforge::lattice::AttrValue;
use beamforge::optimizer::{Algorithm, NoProgress};
use beamforge::selection::Bounds;
use beamforge::workspace::{Entry, KnobPlan, Workspace};
use common::{abcd_lattice, test_options, ABCD_WORKSPACE};

fn sample() -> Workspace {
    serde_json::from_str(ABCD_WORKSPACE).unwrap()
}

#[test]
fn test_sample_parses_with_reference_beam() {
    let ws = sample();
    assert_eq!(ws.elements.len(), 4);
    assert_eq!(ws.beam.get(BeamField::RefIonEk), 1e6);
    assert_eq!(ws.plan.algorithm, Some(Algorithm::NelderMead));
    assert_eq!(
        ws.plan.knobs[0],
        KnobPlan::Element {
            element: "B".to_string(),
            attribute: "B2".to_string(),
            bounds: Some(Bounds::new(0.0, 30.0)),
        }
    );
    assert_eq!(ws.model().unwrap().lattice, abcd_lattice());
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("job.json");

    let mut ws = sample();
    let mut model = ws.model().unwrap();
    model
        .lattice
        .reconfigure("B", [("B2", AttrValue::Number(12.0))])
        .unwrap();
    ws.update_model(&model);
    ws.save(&path).unwrap();

    let reloaded = Workspace::load_from_file(&path).unwrap();
    assert_eq!(reloaded, ws);
    assert_eq!(reloaded.model().unwrap(), model);
}

#[test]
fn test_session_applies_plan() {
    let mut session = sample().into_session(test_options(), 0).unwrap();
    let lattice = session.lattice();
    assert_eq!(session.tracker().knob_indices(lattice), vec![2]);
    assert_eq!(session.tracker().target_index(lattice), Some(4));

    let outcome = session.optimize(Algorithm::NelderMead, &NoProgress).unwrap();
    assert!((outcome.best_x[0] - 15.0).abs() < 1e-3);
}

#[test]
fn test_text_entry_becomes_incomplete_parameter() {
    let mut ws = sample();
    if let Some(target) = ws.plan.target.as_mut() {
        target.parameters[0].weight = Entry::Text("TBD".to_string());
    }
    let mut session = ws.into_session(test_options(), 0).unwrap();
    assert!(matches!(
        session.optimize(Algorithm::NelderMead, &NoProgress),
        Err(BeamForgeError::IncompleteTarget { .. })
    ));
}

#[test]
fn test_plan_with_misordered_selection_is_rejected() {
    let mut ws = sample();
    if let Some(target) = ws.plan.target.as_mut() {
        target.element = "A".to_string();
    }
    assert!(matches!(
        ws.into_session(test_options(), 0),
        Err(BeamForgeError::OrderViolation(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Workspace::load_from_file(dir.path().join("absent.json")),
        Err(BeamForgeError::Io(_))
    ));
}
