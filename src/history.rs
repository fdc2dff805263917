use crate::error::{BeamForgeError, BfResult, HistoryDirection};
use crate::model::{Model, Snapshot};
use std::collections::VecDeque;
use tracing::debug;

/// Undo/redo snapshots of the whole model.
///
/// `checkpoint` is taken *before* a mutation. Any new checkpoint discards
/// the redo side. With a depth limit the oldest undo snapshots fall off.
#[derive(Debug, Clone, Default)]
pub struct HistoryStack {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    depth: Option<usize>,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// `0` means unlimited.
    pub fn with_depth(depth: usize) -> Self {
        Self {
            depth: (depth > 0).then_some(depth),
            ..Self::default()
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn checkpoint(&mut self, model: &Model) {
        self.push(Snapshot::capture(model));
    }

    /// Records a snapshot captured earlier, e.g. just before an edit that
    /// might have failed.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.undo.push_back(snapshot);
        self.redo.clear();
        if let Some(depth) = self.depth {
            while self.undo.len() > depth {
                self.undo.pop_front();
            }
        }
        debug!("Checkpoint taken ({} undo level(s))", self.undo.len());
    }

    /// Restores the most recent checkpoint into `model`, keeping the
    /// replaced state for redo.
    pub fn undo(&mut self, model: &mut Model) -> BfResult<()> {
        let snapshot = self
            .undo
            .pop_back()
            .ok_or(BeamForgeError::EmptyHistory(HistoryDirection::Undo))?;
        self.redo.push(Snapshot::capture(model));
        *model = snapshot.restore();
        Ok(())
    }

    pub fn redo(&mut self, model: &mut Model) -> BfResult<()> {
        let snapshot = self
            .redo
            .pop()
            .ok_or(BeamForgeError::EmptyHistory(HistoryDirection::Redo))?;
        self.undo.push_back(Snapshot::capture(model));
        *model = snapshot.restore();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
