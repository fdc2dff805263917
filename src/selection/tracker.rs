use super::knob::{Bounds, Knob, KnobRegistry};
use super::target::TargetSpec;
use crate::error::{BeamForgeError, BfResult, OrderViolation};
use crate::lattice::{ElementId, Lattice};
use crate::model::Model;
use tracing::{debug, info, trace};

/// Owns the knob and target selection and keeps it consistent with the
/// lattice: knobs never sit downstream of the target, and nothing refers
/// to an element that is gone.
///
/// Selections hold stable [`ElementId`]s, so positional shifts on insert
/// and remove are implicit; indices are recomputed from the lattice when
/// asked for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexTracker {
    knobs: KnobRegistry,
    target: TargetSpec,
}

impl IndexTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn knobs(&self) -> &KnobRegistry {
        &self.knobs
    }

    pub fn knobs_mut(&mut self) -> &mut KnobRegistry {
        &mut self.knobs
    }

    pub fn target(&self) -> &TargetSpec {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut TargetSpec {
        &mut self.target
    }

    pub fn target_index(&self, lattice: &Lattice) -> Option<usize> {
        self.target.element().and_then(|id| lattice.index_of(id))
    }

    /// Display indices of the selected knobs, in selection order.
    pub fn knob_indices(&self, lattice: &Lattice) -> Vec<usize> {
        self.knobs.knobs().filter_map(|k| k.index(lattice)).collect()
    }

    fn max_knob(&self, lattice: &Lattice) -> Option<usize> {
        self.knob_indices(lattice).into_iter().max()
    }

    /// Checks the ordering invariant for a knob candidate. Never mutates.
    pub fn validate_knob(&self, lattice: &Lattice, knob: &Knob) -> BfResult<usize> {
        let knob_index = knob.index(lattice).ok_or_else(|| {
            BeamForgeError::UnknownElement(knob.label(lattice))
        })?;
        if let Some(target_index) = self.target_index(lattice) {
            if knob_index > target_index {
                return Err(OrderViolation::KnobBeyondTarget {
                    knob_index,
                    target_index,
                }
                .into());
            }
        }
        Ok(knob_index)
    }

    /// Checks the ordering invariant for a target candidate. Never mutates.
    pub fn validate_target(&self, lattice: &Lattice, element: ElementId) -> BfResult<usize> {
        let target_index = lattice
            .index_of(element)
            .ok_or_else(|| BeamForgeError::UnknownElement(element.to_string()))?;
        if let Some(knob_index) = self.max_knob(lattice) {
            if target_index < knob_index {
                return Err(OrderViolation::TargetBeforeKnob {
                    target_index,
                    knob_index,
                }
                .into());
            }
        }
        Ok(target_index)
    }

    /// Selects a knob after checking it exists, is numeric and respects the
    /// ordering. Selecting an already selected knob only updates its bounds
    /// override (when one is given).
    pub fn select_knob(&mut self, model: &Model, knob: Knob, bounds: Option<Bounds>) -> BfResult<()> {
        let index = self.validate_knob(&model.lattice, &knob)?;
        knob.check(model)?;
        debug!("Selected knob {} (index {})", knob.label(&model.lattice), index);
        self.knobs.push(knob, bounds);
        debug_assert!(self.is_consistent(&model.lattice));
        Ok(())
    }

    pub fn deselect_knob(&mut self, knob: &Knob) -> bool {
        self.knobs.remove(knob)
    }

    /// Makes `element` the single target, replacing any previous one.
    pub fn select_target(&mut self, lattice: &Lattice, element: ElementId) -> BfResult<()> {
        let index = self.validate_target(lattice, element)?;
        if let Some(previous) = self.target.element() {
            if previous != element {
                debug!("Target moved from {} to index {}", previous, index);
            }
        }
        self.target.set_element(Some(element));
        debug_assert!(self.is_consistent(lattice));
        Ok(())
    }

    /// Clearing the target leaves the knob selection as it is.
    pub fn clear_target(&mut self) {
        self.target.set_element(None);
    }

    pub fn clear(&mut self) {
        self.knobs.clear();
        self.target.set_element(None);
    }

    /// Called after an element was inserted at `at`. Every reference at or
    /// beyond `at` has moved up by one through its id.
    pub fn on_insert(&self, lattice: &Lattice, at: usize) {
        trace!("Element inserted at {}; {} knobs tracked", at, self.knobs.len());
        debug_assert!(self.is_consistent(lattice));
    }

    /// Called after an element was removed. Knobs and target on it are
    /// deselected; everything downstream has moved down by one through its
    /// id. Returns the number of references dropped.
    pub fn on_remove(&mut self, removed: ElementId) -> usize {
        let mut dropped = self.knobs.retain(|k| k.element() != Some(removed));
        if self.target.element() == Some(removed) {
            self.target.set_element(None);
            dropped += 1;
        }
        if dropped > 0 {
            info!("Removed element {} carried {} selection(s); deselected", removed, dropped);
        }
        dropped
    }

    /// Drops references to elements no longer present, e.g. after the model
    /// was replaced by an undo or redo.
    pub fn reconcile(&mut self, lattice: &Lattice) -> usize {
        let mut dropped = self
            .knobs
            .retain(|k| k.element().map_or(true, |id| lattice.contains(id)));
        if let Some(id) = self.target.element() {
            if !lattice.contains(id) {
                self.target.set_element(None);
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!("Reconcile dropped {} stale selection(s)", dropped);
        }
        dropped
    }

    /// Every reference resolves and no knob lies beyond the target.
    pub fn is_consistent(&self, lattice: &Lattice) -> bool {
        let resolved = self.knobs.knobs().all(|k| k.index(lattice).is_some());
        match (self.target_index(lattice), self.max_knob(lattice)) {
            (Some(t), Some(k)) => resolved && k <= t,
            _ => resolved && self.target.element().map_or(true, |id| lattice.contains(id)),
        }
    }
}
