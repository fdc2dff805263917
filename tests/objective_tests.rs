mod common;

use beamforge::beam::{BeamField, BeamState};
use beamforge::error::{BeamForgeError, BfResult};
use beamforge::lattice::Lattice;
use beamforge::objective::ObjectiveFunction;
use beamforge::optimizer::CancelToken;
use beamforge::selection::Goal;
use beamforge::simulation::{SimulationOracle, Trace, TraceRecord};
use common::{abcd_session, energy_response};
use std::sync::Arc;

fn energy_goal(desired: f64, weight: f64) -> Goal {
    Goal {
        field: BeamField::RefIonEk,
        desired,
        weight,
    }
}

fn b2_objective(goal: Goal) -> (ObjectiveFunction, beamforge::model::Model) {
    let session = abcd_session();
    let knob = session.element_knob("B", "B2").unwrap();
    let objective = ObjectiveFunction::new(Arc::new(energy_response()), vec![knob], vec![goal], 4);
    (objective, session.model().clone())
}

#[test]
fn test_zero_at_target() {
    let (objective, mut model) = b2_objective(energy_goal(2.5e6, 1.0));
    let cost = objective.evaluate(&mut model, &[15.0]).unwrap();
    assert!(cost.abs() < 1e-12, "cost = {}", cost);
}

#[test]
fn test_weighted_squared_residual() {
    // At B2 = 3 the beam reaches 1.3e6; residual = 1.3e6 * 2 - 2.5e6 = 1e5
    let (objective, mut model) = b2_objective(energy_goal(2.5e6, 2.0));
    let cost = objective.evaluate(&mut model, &[3.0]).unwrap();
    assert!((cost - 1e10).abs() < 1.0);

    let residuals = objective.residuals(&model).unwrap();
    assert_eq!(residuals.len(), 1);
    assert!((residuals[0].actual - 1.3e6).abs() < 1e-6);
    assert!((residuals[0].residual - 1e5).abs() < 1e-6);
}

#[test]
fn test_evaluation_writes_model_and_counts() {
    let (objective, mut model) = b2_objective(energy_goal(2.5e6, 1.0));
    objective.evaluate(&mut model, &[9.0]).unwrap();
    objective.evaluate(&mut model, &[11.0]).unwrap();
    assert_eq!(objective.evaluations(), 2);
    assert_eq!(
        model.lattice.get_by_name("B").unwrap().numeric("B2").unwrap(),
        11.0
    );
}

#[test]
fn test_cancelled_token_stops_evaluation() {
    let token = CancelToken::new();
    let (objective, mut model) = b2_objective(energy_goal(2.5e6, 1.0));
    let objective = objective.with_cancel(token.clone());
    objective.evaluate(&mut model, &[1.0]).unwrap();

    token.cancel();
    let err = objective.evaluate(&mut model, &[2.0]).unwrap_err();
    assert!(matches!(err, BeamForgeError::Cancelled { evaluations: 1 }));
}

/// Engine that always reports NaN energy.
struct BrokenEngine;

impl SimulationOracle for BrokenEngine {
    fn run(&self, _: &Lattice, beam: &BeamState, stop_at: usize) -> BfResult<Trace> {
        Ok(Trace {
            records: vec![TraceRecord {
                index: stop_at,
                pos: 0.0,
                state: beam.clone().with(BeamField::RefIonEk, f64::NAN),
            }],
        })
    }
}

#[test]
fn test_non_finite_cost_is_numeric_failure() {
    let session = abcd_session();
    let knob = session.element_knob("B", "B2").unwrap();
    let objective = ObjectiveFunction::new(
        Arc::new(BrokenEngine),
        vec![knob],
        vec![energy_goal(1.0, 1.0)],
        4,
    );
    let mut model = session.model().clone();
    assert!(matches!(
        objective.evaluate(&mut model, &[1.0]),
        Err(BeamForgeError::NumericFailure(_))
    ));
}
