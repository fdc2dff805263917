use crate::beam::BeamState;
use crate::lattice::Lattice;
use std::sync::Arc;

/// The tunable machine: an element sequence plus the beam fed into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub lattice: Lattice,
    pub beam: BeamState,
}

impl Model {
    pub fn new(lattice: Lattice, beam: BeamState) -> Self {
        Self { lattice, beam }
    }
}

/// Immutable deep copy of a [`Model`]. Cloning a snapshot is cheap; the
/// captured model can only be read or restored from.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot(Arc<Model>);

impl Snapshot {
    pub fn capture(model: &Model) -> Self {
        Snapshot(Arc::new(model.clone()))
    }

    pub fn model(&self) -> &Model {
        &self.0
    }

    /// Hands back an owned copy of the captured model.
    pub fn restore(&self) -> Model {
        (*self.0).clone()
    }
}
