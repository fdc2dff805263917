pub mod differential_evolution;
pub mod nelder_mead;
pub mod runner;

pub use self::differential_evolution::EvolutionOptions;
pub use self::nelder_mead::NelderMeadOptions;
pub use self::runner::{
    DriverState, OptimizationDriver, OptimizationOptions, OptimizationRequest, PreparedRun,
};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Local downhill simplex from the current knob values.
    #[default]
    NelderMead,
    /// Global population search inside the knob bounds.
    DifferentialEvolution,
}

impl Algorithm {
    pub fn needs_bounds(self) -> bool {
        matches!(self, Algorithm::DifferentialEvolution)
    }
}

/// Raw output of one of the minimisation kernels.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelResult {
    pub x: Vec<f64>,
    pub fun: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
    pub stopped_early: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub algorithm: Algorithm,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
    pub stopped_early: bool,
    pub message: String,
    pub elapsed: Duration,
}

/// A finished search. `best_x` is in knob order; nothing has been written
/// to the shared model yet.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationOutcome {
    pub best_x: Vec<f64>,
    pub best_cost: f64,
    pub diagnostics: Diagnostics,
}

/// Cooperative stop flag shared between the caller and a running search.
/// Checked before every objective evaluation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A trait for receiving updates during optimization.
/// Boolean return value indicates if the search should continue (true) or
/// stop early with the best point found so far (false).
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, iteration: usize, best_cost: f64, best_x: &[f64]) -> bool;
}

pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _: usize, _: f64, _: &[f64]) -> bool {
        true
    }
}
