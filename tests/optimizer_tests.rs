mod common;

use beamforge::beam::{BeamField, BeamState};
use beamforge::config::Config;
use beamforge::error::BeamForgeError;
use beamforge::model::Model;
use beamforge::optimizer::{
    Algorithm, DriverState, NoProgress, OptimizationOptions, ProgressCallback,
};
use beamforge::selection::Bounds;
use beamforge::session::Session;
use common::{abcd_lattice, abcd_session, abcd_tuning_session, energy_response};
use rstest::rstest;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn b2(session: &Session) -> f64 {
    session
        .lattice()
        .get_by_name("B")
        .unwrap()
        .numeric("B2")
        .unwrap()
}

fn energy_at_target(session: &Session) -> f64 {
    session
        .simulate(Some(4))
        .unwrap()
        .final_state()
        .unwrap()
        .get(BeamField::RefIonEk)
}

#[test]
fn test_nelder_mead_end_to_end() {
    let mut session = abcd_tuning_session();
    let outcome = session.optimize(Algorithm::NelderMead, &NoProgress).unwrap();

    assert!(outcome.best_cost < 1.0, "cost = {}", outcome.best_cost);
    assert!((energy_at_target(&session) - 2.5e6).abs() < 1.0);
    assert!((b2(&session) - 15.0).abs() < 1e-4);
    assert_eq!(session.driver().state(), DriverState::Succeeded);
    assert!(outcome.diagnostics.evaluations > 0);
}

fn seeded_tuning_session(seed: u64) -> Session {
    let mut config = Config::default();
    config.runtime.threads = Some(2);
    config.evolution.de_seed = Some(seed);
    let model = Model::new(abcd_lattice(), BeamState::reference());
    let mut session =
        Session::new(model, Arc::new(energy_response()), OptimizationOptions::from(&config))
            .unwrap();
    session.select_element_knob("B", "B2", None).unwrap();
    session.select_target("D").unwrap();
    session.set_target_parameter(BeamField::RefIonEk, 2.5e6, 1.0);
    session
}

#[test]
fn test_differential_evolution_end_to_end() {
    let mut session = seeded_tuning_session(7);
    assert_eq!(session.driver().options().evolution.seed, Some(7));

    // Derived bounds for B2 = 3 are [0, 30], which contain the optimum.
    let outcome = session
        .optimize(Algorithm::DifferentialEvolution, &NoProgress)
        .unwrap();
    assert!((outcome.best_x[0] - 15.0).abs() < 0.15);
    assert!((energy_at_target(&session) - 2.5e6).abs() < 2.5e4);
    assert_eq!(
        outcome.diagnostics.algorithm,
        Algorithm::DifferentialEvolution
    );
}

#[test]
fn test_seeded_evolution_is_reproducible() {
    let mut first = seeded_tuning_session(42);
    let mut second = seeded_tuning_session(42);
    let a = first.optimize(Algorithm::DifferentialEvolution, &NoProgress).unwrap();
    let b = second.optimize(Algorithm::DifferentialEvolution, &NoProgress).unwrap();
    assert_eq!(a.best_x, b.best_x);
    assert_eq!(a.diagnostics.evaluations, b.diagnostics.evaluations);
}

#[test]
fn test_optimum_outside_override_bounds_stays_inside() {
    let mut session = abcd_tuning_session();
    let knob = session.element_knob("B", "B2").unwrap();
    session.set_knob_bounds(&knob, Bounds::new(0.0, 10.0)).unwrap();

    let outcome = session
        .optimize(Algorithm::DifferentialEvolution, &NoProgress)
        .unwrap();
    assert!(outcome.best_x[0] <= 10.0);
    assert!((outcome.best_x[0] - 10.0).abs() < 0.1);
}

#[test]
fn test_optimize_is_one_undo_step() {
    let mut session = abcd_tuning_session();
    session.optimize(Algorithm::NelderMead, &NoProgress).unwrap();
    assert!((b2(&session) - 15.0).abs() < 1e-3);

    session.undo().unwrap();
    assert_eq!(b2(&session), 3.0);
    session.redo().unwrap();
    assert!((b2(&session) - 15.0).abs() < 1e-3);
}

#[rstest]
#[case::no_knobs(false, true)]
#[case::no_target(true, false)]
fn test_missing_selection_is_rejected(#[case] with_knob: bool, #[case] with_target: bool) {
    let mut session = abcd_session();
    if with_knob {
        session.select_element_knob("B", "B2", None).unwrap();
    }
    if with_target {
        session.select_target("D").unwrap();
    }
    session.add_target_parameter("ref_IonEk", "2.5e6", "1").unwrap();

    let err = session.optimize(Algorithm::NelderMead, &NoProgress).unwrap_err();
    assert!(matches!(err, BeamForgeError::EmptySelection(_)));
    assert_eq!(session.driver().state(), DriverState::Idle);
    assert!(!session.history().can_undo());
}

#[test]
fn test_no_parameters_is_rejected() {
    let mut session = abcd_tuning_session();
    session.remove_target_parameter("ref_IonEk").unwrap();
    let err = session.optimize(Algorithm::NelderMead, &NoProgress).unwrap_err();
    assert!(matches!(err, BeamForgeError::EmptySelection(msg) if msg.contains("No checked parameters")));
}

#[rstest]
#[case("", "1")]
#[case("2.5e6", "heavy")]
fn test_incomplete_parameter_is_rejected(#[case] desired: &str, #[case] weight: &str) {
    let mut session = abcd_tuning_session();
    session.add_target_parameter("ref_IonEk", desired, weight).unwrap();
    let err = session.optimize(Algorithm::NelderMead, &NoProgress).unwrap_err();
    assert!(matches!(err, BeamForgeError::IncompleteTarget { .. }));
    assert_eq!(b2(&session), 3.0);
}

#[test]
fn test_malformed_bounds_only_block_global_search() {
    let mut session = abcd_tuning_session();
    let knob = session.element_knob("B", "B2").unwrap();
    session.set_knob_bounds(&knob, Bounds::new(5.0, 1.0)).unwrap();

    let err = session
        .optimize(Algorithm::DifferentialEvolution, &NoProgress)
        .unwrap_err();
    assert!(matches!(err, BeamForgeError::MissingBounds { .. }));

    // The local search ignores bounds entirely.
    session.optimize(Algorithm::NelderMead, &NoProgress).unwrap();
}

#[test]
fn test_cancel_fails_and_leaves_model_untouched() {
    let mut session = abcd_tuning_session();
    let before = session.model().clone();
    session.cancel_token().cancel();

    let err = session.optimize(Algorithm::NelderMead, &NoProgress).unwrap_err();
    assert!(matches!(err, BeamForgeError::Cancelled { evaluations: 0 }));
    assert_eq!(session.driver().state(), DriverState::Failed);
    assert_eq!(session.model(), &before);
    assert!(!session.history().can_undo());

    // The token is re-armed for the next run.
    session.optimize(Algorithm::NelderMead, &NoProgress).unwrap();
}

struct StopImmediately(AtomicUsize);

impl ProgressCallback for StopImmediately {
    fn on_progress(&self, _: usize, _: f64, _: &[f64]) -> bool {
        self.0.fetch_add(1, Ordering::Relaxed);
        false
    }
}

#[test]
fn test_progress_callback_stops_with_best_so_far() {
    let mut session = abcd_tuning_session();
    let cb = StopImmediately(AtomicUsize::new(0));
    let outcome = session.optimize(Algorithm::NelderMead, &cb).unwrap();

    assert_eq!(cb.0.load(Ordering::Relaxed), 1);
    assert!(outcome.diagnostics.stopped_early);
    assert!(!outcome.diagnostics.converged);
    assert_eq!(session.driver().state(), DriverState::Succeeded);
    // The partial result is still written back.
    assert_eq!(b2(&session), outcome.best_x[0]);
}

#[test]
fn test_beam_knob_is_tunable() {
    let mut session = abcd_session();
    session.select_beam_knob("energy", None).unwrap();
    session.select_target("D").unwrap();
    session.set_target_parameter(BeamField::RefIonEk, 2.0e6, 1.0);

    session.optimize(Algorithm::NelderMead, &NoProgress).unwrap();
    // Quadrupole adds 3e5, so the source must supply 1.7e6.
    assert!((session.beam().get(BeamField::RefIonEk) - 1.7e6).abs() < 1.0);
}
