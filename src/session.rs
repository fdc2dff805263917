use crate::beam::{BeamField, BeamState};
use crate::error::{BeamForgeError, BfResult};
use crate::history::HistoryStack;
use crate::lattice::{AttrValue, ElementId, ElementRecord, Lattice};
use crate::model::{Model, Snapshot};
use crate::objective::{ObjectiveFunction, Residual};
use crate::optimizer::{
    Algorithm, CancelToken, OptimizationDriver, OptimizationOptions, OptimizationOutcome,
    OptimizationRequest, ProgressCallback,
};
use crate::selection::{Bounds, IndexTracker, Knob};
use crate::simulation::{SimulationOracle, Trace};
use std::sync::Arc;
use strum_macros::Display;
use tracing::{debug, info};

/// What changed in the model, as reported to refresh listeners.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum ModelChange {
    Structure,
    Attribute { element: String },
    Beam,
    Optimized,
    Undo,
    Redo,
}

/// Observer for views that must redraw when the model changes.
pub trait RefreshListener: Send + Sync {
    fn on_refresh(&self, change: &ModelChange);
}

/// The editing context: one model, its selection and history, the engine
/// that propagates it and the driver that tunes it.
///
/// All edits go through `&mut self`, so index bookkeeping and history
/// happen in the same call as the mutation they belong to.
pub struct Session {
    model: Model,
    tracker: IndexTracker,
    history: HistoryStack,
    oracle: Arc<dyn SimulationOracle>,
    driver: OptimizationDriver,
    listeners: Vec<Box<dyn RefreshListener>>,
}

impl Session {
    pub fn new(
        model: Model,
        oracle: Arc<dyn SimulationOracle>,
        options: OptimizationOptions,
    ) -> BfResult<Self> {
        Ok(Self {
            model,
            tracker: IndexTracker::new(),
            history: HistoryStack::new(),
            oracle,
            driver: OptimizationDriver::new(options)?,
            listeners: Vec::new(),
        })
    }

    pub fn with_history(mut self, history: HistoryStack) -> Self {
        self.history = history;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn lattice(&self) -> &Lattice {
        &self.model.lattice
    }

    pub fn beam(&self) -> &BeamState {
        &self.model.beam
    }

    pub fn tracker(&self) -> &IndexTracker {
        &self.tracker
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn driver(&self) -> &OptimizationDriver {
        &self.driver
    }

    pub fn oracle(&self) -> Arc<dyn SimulationOracle> {
        self.oracle.clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.driver.cancel_token()
    }

    pub fn add_listener(&mut self, listener: Box<dyn RefreshListener>) {
        self.listeners.push(listener);
    }

    fn notify(&self, change: ModelChange) {
        debug!("Model changed: {}", change);
        for l in &self.listeners {
            l.on_refresh(&change);
        }
    }

    // --- Structural edits ---

    pub fn insert_element(&mut self, index: usize, record: ElementRecord) -> BfResult<ElementId> {
        let before = Snapshot::capture(&self.model);
        let id = self.model.lattice.insert(index, record)?;
        self.history.push(before);
        self.tracker.on_insert(&self.model.lattice, index);
        self.notify(ModelChange::Structure);
        Ok(id)
    }

    pub fn remove_element(&mut self, index: usize) -> BfResult<ElementRecord> {
        let before = Snapshot::capture(&self.model);
        let removed = self.model.lattice.remove(index)?;
        self.history.push(before);
        self.tracker.on_remove(removed.id);
        debug_assert!(self.tracker.is_consistent(&self.model.lattice));
        self.notify(ModelChange::Structure);
        Ok(removed.record())
    }

    pub fn set_attribute(&mut self, element: &str, key: &str, value: AttrValue) -> BfResult<()> {
        let before = Snapshot::capture(&self.model);
        self.model.lattice.reconfigure(element, [(key, value)])?;
        self.history.push(before);
        self.notify(ModelChange::Attribute {
            element: element.to_string(),
        });
        Ok(())
    }

    pub fn set_beam(&mut self, field: BeamField, value: f64) {
        self.history.checkpoint(&self.model);
        self.model.beam.set(field, value);
        self.notify(ModelChange::Beam);
    }

    // --- Selection ---

    pub fn element_knob(&self, element: &str, attribute: &str) -> BfResult<Knob> {
        let id = self.model.lattice.require(element)?.id;
        Ok(Knob::element_attribute(id, attribute))
    }

    pub fn select_knob(&mut self, knob: Knob, bounds: Option<Bounds>) -> BfResult<()> {
        self.tracker.select_knob(&self.model, knob, bounds)
    }

    pub fn select_element_knob(
        &mut self,
        element: &str,
        attribute: &str,
        bounds: Option<Bounds>,
    ) -> BfResult<Knob> {
        let knob = self.element_knob(element, attribute)?;
        self.select_knob(knob.clone(), bounds)?;
        Ok(knob)
    }

    pub fn select_beam_knob(&mut self, label: &str, bounds: Option<Bounds>) -> BfResult<Knob> {
        let knob = Knob::beam(BeamField::from_label(label)?);
        self.select_knob(knob.clone(), bounds)?;
        Ok(knob)
    }

    pub fn deselect_knob(&mut self, knob: &Knob) -> bool {
        self.tracker.deselect_knob(knob)
    }

    pub fn set_knob_bounds(&mut self, knob: &Knob, bounds: Bounds) -> BfResult<()> {
        self.tracker.knobs_mut().set_bounds(knob, bounds)
    }

    pub fn select_target(&mut self, element: &str) -> BfResult<()> {
        let id = self.model.lattice.require(element)?.id;
        self.tracker.select_target(&self.model.lattice, id)
    }

    pub fn clear_target(&mut self) {
        self.tracker.clear_target();
    }

    pub fn add_target_parameter(&mut self, name: &str, desired: &str, weight: &str) -> BfResult<()> {
        self.tracker.target_mut().add_parameter(name, desired, weight)?;
        Ok(())
    }

    pub fn set_target_parameter(&mut self, field: BeamField, desired: f64, weight: f64) {
        self.tracker.target_mut().set_parameter(field, desired, weight);
    }

    pub fn remove_target_parameter(&mut self, name: &str) -> BfResult<bool> {
        self.tracker.target_mut().remove_parameter(name)
    }

    // --- Simulation ---

    /// Propagates the current model to `stop_at`, or to the end of the
    /// lattice when `None`.
    pub fn simulate(&self, stop_at: Option<usize>) -> BfResult<Trace> {
        let stop = stop_at.unwrap_or(self.model.lattice.len());
        self.oracle.run(&self.model.lattice, &self.model.beam, stop)
    }

    /// Per-parameter comparison at the current target.
    pub fn residuals(&self) -> BfResult<Vec<Residual>> {
        let goals = self.tracker.target().goals()?;
        let target_index = self
            .tracker
            .target_index(&self.model.lattice)
            .ok_or_else(|| BeamForgeError::EmptySelection("No target selected".to_string()))?;
        let objective = ObjectiveFunction::new(
            self.oracle.clone(),
            self.tracker.knobs().knobs().cloned().collect(),
            goals,
            target_index,
        );
        objective.residuals(&self.model)
    }

    // --- Optimisation ---

    /// Validates the current selection, runs the search and writes the best
    /// knob vector back as one undoable step.
    pub fn optimize<CB: ProgressCallback>(
        &mut self,
        algorithm: Algorithm,
        callback: &CB,
    ) -> BfResult<OptimizationOutcome> {
        let request = OptimizationRequest::from_tracker(&self.tracker, algorithm);
        let prepared = self.driver.prepare(&self.model, &request, self.oracle.clone())?;
        let before = Snapshot::capture(&self.model);

        let outcome = self.driver.execute(prepared, &self.model, callback)?;

        self.history.push(before);
        request.knobs.apply_vector(&mut self.model, &outcome.best_x)?;
        info!(
            "✅ Applied {} knob value(s), cost {:.6e}",
            outcome.best_x.len(),
            outcome.best_cost
        );
        self.notify(ModelChange::Optimized);
        Ok(outcome)
    }

    // --- History ---

    pub fn undo(&mut self) -> BfResult<()> {
        self.history.undo(&mut self.model)?;
        self.tracker.reconcile(&self.model.lattice);
        self.notify(ModelChange::Undo);
        Ok(())
    }

    pub fn redo(&mut self) -> BfResult<()> {
        self.history.redo(&mut self.model)?;
        self.tracker.reconcile(&self.model.lattice);
        self.notify(ModelChange::Redo);
        Ok(())
    }
}
