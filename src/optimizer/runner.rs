use super::differential_evolution::{self, EvolutionOptions};
use super::nelder_mead::{self, NelderMeadOptions};
use super::{
    Algorithm, CancelToken, Diagnostics, KernelResult, OptimizationOutcome, ProgressCallback,
};
use crate::config::Config;
use crate::error::{BeamForgeError, BfResult, OrderViolation};
use crate::model::Model;
use crate::objective::ObjectiveFunction;
use crate::selection::{Bounds, IndexTracker, KnobRegistry, TargetSpec};
use crate::simulation::SimulationOracle;
use std::sync::Arc;
use std::time::Instant;
use strum_macros::Display;
use tracing::{debug, info, warn};

pub struct OptimizationOptions {
    pub num_threads: usize,
    pub nelder_mead: NelderMeadOptions,
    pub evolution: EvolutionOptions,
}

impl Default for OptimizationOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for OptimizationOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            num_threads: cfg.runtime.threads.filter(|n| *n > 0).unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            }),
            nelder_mead: NelderMeadOptions {
                xatol: cfg.nelder_mead.nm_xatol,
                fatol: cfg.nelder_mead.nm_fatol,
                max_iterations: cfg.nelder_mead.nm_max_iterations,
                max_evaluations: cfg.nelder_mead.nm_max_evaluations,
                adaptive: cfg.nelder_mead.nm_adaptive,
            },
            evolution: EvolutionOptions {
                popsize: cfg.evolution.de_popsize,
                mutation: (cfg.evolution.de_mutation_min, cfg.evolution.de_mutation_max),
                recombination: cfg.evolution.de_recombination,
                tol: cfg.evolution.de_tol,
                atol: cfg.evolution.de_atol,
                max_iterations: cfg.evolution.de_max_iterations,
                seed: cfg.evolution.de_seed,
                polish: cfg.evolution.de_polish,
            },
        }
    }
}

/// What to optimise: the knob selection (with any bounds overrides), the
/// target and the algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationRequest {
    pub algorithm: Algorithm,
    pub knobs: KnobRegistry,
    pub target: TargetSpec,
}

impl OptimizationRequest {
    pub fn from_tracker(tracker: &IndexTracker, algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            knobs: tracker.knobs().clone(),
            target: tracker.target().clone(),
        }
    }
}

/// A validated request, bound to an objective and a starting point.
pub struct PreparedRun {
    pub algorithm: Algorithm,
    pub objective: ObjectiveFunction,
    pub start: Vec<f64>,
    pub bounds: Option<Vec<Bounds>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DriverState {
    Idle,
    Validating,
    Running,
    Succeeded,
    Failed,
}

/// Validates optimisation requests and runs them on a dedicated worker
/// pool. The caller blocks until the pool hands back a result.
pub struct OptimizationDriver {
    options: OptimizationOptions,
    pool: rayon::ThreadPool,
    state: DriverState,
    cancel: CancelToken,
}

impl OptimizationDriver {
    pub fn new(options: OptimizationOptions) -> BfResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.num_threads)
            .thread_name(|i| format!("beamforge-opt-{}", i))
            .build()
            .map_err(|e| BeamForgeError::WorkerPool(e.to_string()))?;
        Ok(Self {
            options,
            pool,
            state: DriverState::Idle,
            cancel: CancelToken::new(),
        })
    }

    pub fn options(&self) -> &OptimizationOptions {
        &self.options
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Token that cancels the next (or currently running) search.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Checks the request against `model` and builds the objective. No side
    /// effects on failure; the driver returns to `Idle`.
    pub fn prepare(
        &mut self,
        model: &Model,
        request: &OptimizationRequest,
        oracle: Arc<dyn SimulationOracle>,
    ) -> BfResult<PreparedRun> {
        self.state = DriverState::Validating;
        let prepared = self.validate(model, request, oracle);
        if let Err(e) = &prepared {
            warn!("Optimization request rejected: {}", e);
            self.state = DriverState::Idle;
        }
        prepared
    }

    fn validate(
        &self,
        model: &Model,
        request: &OptimizationRequest,
        oracle: Arc<dyn SimulationOracle>,
    ) -> BfResult<PreparedRun> {
        // 1. Something to tune, somewhere to look
        let target = match request.target.element() {
            Some(id) if !request.knobs.is_empty() => id,
            _ => {
                return Err(BeamForgeError::EmptySelection(
                    "Must select knobs and a target".to_string(),
                ))
            }
        };

        // 2. Every parameter complete
        let goals = request.target.goals()?;

        // 3. Positions still hold
        let lattice = &model.lattice;
        let target_index = lattice
            .index_of(target)
            .ok_or_else(|| BeamForgeError::UnknownElement(target.to_string()))?;
        for knob in request.knobs.knobs() {
            let knob_index = knob
                .index(lattice)
                .ok_or_else(|| BeamForgeError::UnknownElement(knob.label(lattice)))?;
            if knob_index > target_index {
                return Err(OrderViolation::KnobBeyondTarget {
                    knob_index,
                    target_index,
                }
                .into());
            }
        }

        // 4. Start point and search box
        let start = request.knobs.current_values(model)?;
        let bounds = if request.algorithm.needs_bounds() {
            Some(request.knobs.bounds(model)?)
        } else {
            None
        };

        let objective = ObjectiveFunction::new(
            oracle,
            request.knobs.knobs().cloned().collect(),
            goals,
            target_index,
        )
        .with_cancel(self.cancel.clone());

        Ok(PreparedRun {
            algorithm: request.algorithm,
            objective,
            start,
            bounds,
        })
    }

    /// Runs a prepared search on the worker pool. `model` is only read; every
    /// evaluation works on a private clone of it.
    pub fn execute<CB: ProgressCallback>(
        &mut self,
        run: PreparedRun,
        model: &Model,
        callback: &CB,
    ) -> BfResult<OptimizationOutcome> {
        self.state = DriverState::Running;
        info!(
            "⚙️  Running {} over {} knob(s) on {} worker(s)",
            run.algorithm,
            run.start.len(),
            self.options.num_threads
        );

        let started = Instant::now();
        let options = &self.options;
        let result = self.pool.install(|| Self::dispatch(options, &run, model, callback));

        // A cancelled token must not leak into the next run.
        if self.cancel.is_cancelled() {
            self.cancel = CancelToken::new();
        }

        match result {
            Ok(kernel) => {
                self.state = DriverState::Succeeded;
                let diagnostics = Diagnostics {
                    algorithm: run.algorithm,
                    iterations: kernel.iterations,
                    evaluations: run.objective.evaluations(),
                    converged: kernel.converged,
                    stopped_early: kernel.stopped_early,
                    message: kernel.message,
                    elapsed: started.elapsed(),
                };
                info!(
                    "🏁 {} finished: cost {:.6e} after {} evaluations ({})",
                    run.algorithm, kernel.fun, diagnostics.evaluations, diagnostics.message
                );
                Ok(OptimizationOutcome {
                    best_x: kernel.x,
                    best_cost: kernel.fun,
                    diagnostics,
                })
            }
            Err(e) => {
                self.state = DriverState::Failed;
                warn!("❌ {} failed: {}", run.algorithm, e);
                Err(e)
            }
        }
    }

    /// `prepare` followed by `execute`.
    pub fn run<CB: ProgressCallback>(
        &mut self,
        model: &Model,
        request: &OptimizationRequest,
        oracle: Arc<dyn SimulationOracle>,
        callback: &CB,
    ) -> BfResult<OptimizationOutcome> {
        let prepared = self.prepare(model, request, oracle)?;
        self.execute(prepared, model, callback)
    }

    fn dispatch<CB: ProgressCallback>(
        options: &OptimizationOptions,
        run: &PreparedRun,
        model: &Model,
        callback: &CB,
    ) -> BfResult<KernelResult> {
        let objective = &run.objective;
        match run.algorithm {
            Algorithm::NelderMead => {
                let mut work = model.clone();
                nelder_mead::minimize(
                    |x| objective.evaluate(&mut work, x),
                    &run.start,
                    run.bounds.as_deref(),
                    &options.nelder_mead,
                    callback,
                )
            }
            Algorithm::DifferentialEvolution => {
                let bounds = run.bounds.as_deref().ok_or_else(|| {
                    BeamForgeError::MissingBounds {
                        knob: "<all>".to_string(),
                    }
                })?;
                debug!("Search box: {:?}", bounds);
                differential_evolution::minimize(
                    || model.clone(),
                    |m: &mut Model, x: &[f64]| objective.evaluate(m, x),
                    bounds,
                    &options.evolution,
                    callback,
                )
            }
        }
    }
}
