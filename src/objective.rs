use crate::beam::{BeamField, BeamState};
use crate::error::{BeamForgeError, BfResult};
use crate::model::Model;
use crate::optimizer::CancelToken;
use crate::selection::{Goal, Knob};
use crate::simulation::SimulationOracle;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One row of a target comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Residual {
    pub field: BeamField,
    pub desired: f64,
    pub weight: f64,
    pub actual: f64,
    pub residual: f64,
}

/// Weighted least-squares mismatch between the beam at the target and the
/// requested values, as a function of the knob vector.
///
/// Clones share the evaluation counter and cancellation flag, so one
/// instance can be handed to every worker of a parallel search.
#[derive(Clone)]
pub struct ObjectiveFunction {
    oracle: Arc<dyn SimulationOracle>,
    knobs: Vec<Knob>,
    goals: Vec<Goal>,
    target_index: usize,
    evaluations: Arc<AtomicUsize>,
    cancel: CancelToken,
}

impl ObjectiveFunction {
    pub fn new(
        oracle: Arc<dyn SimulationOracle>,
        knobs: Vec<Knob>,
        goals: Vec<Goal>,
        target_index: usize,
    ) -> Self {
        Self {
            oracle,
            knobs,
            goals,
            target_index,
            evaluations: Arc::new(AtomicUsize::new(0)),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn dimension(&self) -> usize {
        self.knobs.len()
    }

    pub fn knobs(&self) -> &[Knob] {
        &self.knobs
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Writes `x` into `model`, propagates to the target and returns the
    /// cost. The model keeps the written values afterwards.
    pub fn evaluate(&self, model: &mut Model, x: &[f64]) -> BfResult<f64> {
        if self.cancel.is_cancelled() {
            return Err(BeamForgeError::Cancelled {
                evaluations: self.evaluations(),
            });
        }
        debug_assert_eq!(x.len(), self.knobs.len());

        for (knob, &v) in self.knobs.iter().zip(x) {
            knob.write(model, v)?;
        }
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        let cost = self.cost_of(model)?;
        if !cost.is_finite() {
            return Err(BeamForgeError::NumericFailure(format!(
                "objective returned {} at x = {:?}",
                cost, x
            )));
        }
        Ok(cost)
    }

    /// Cost of `model` as it stands, without touching the knobs.
    pub fn cost_of(&self, model: &Model) -> BfResult<f64> {
        let state = self.state_at_target(model)?;
        Ok(self.cost_for_state(&state))
    }

    pub fn cost_for_state(&self, state: &BeamState) -> f64 {
        self.goals
            .iter()
            .map(|g| {
                let r = state.get(g.field) * g.weight - g.desired;
                r * r
            })
            .sum()
    }

    pub fn residuals(&self, model: &Model) -> BfResult<Vec<Residual>> {
        let state = self.state_at_target(model)?;
        Ok(self
            .goals
            .iter()
            .map(|g| {
                let actual = state.get(g.field);
                Residual {
                    field: g.field,
                    desired: g.desired,
                    weight: g.weight,
                    actual,
                    residual: actual * g.weight - g.desired,
                }
            })
            .collect())
    }

    fn state_at_target(&self, model: &Model) -> BfResult<BeamState> {
        let trace = self
            .oracle
            .run(&model.lattice, &model.beam, self.target_index)?;
        trace
            .records
            .into_iter()
            .last()
            .map(|r| r.state)
            .ok_or_else(|| BeamForgeError::NumericFailure("simulation returned no states".to_string()))
    }
}
