use super::nelder_mead::{self, NelderMeadOptions};
use super::{KernelResult, NoProgress, ProgressCallback};
use crate::error::BfResult;
use crate::selection::Bounds;
use rayon::prelude::*;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionOptions {
    /// Population multiplier: `popsize * n` members, never fewer than 5.
    pub popsize: usize,
    /// Dithering interval for the differential weight, resampled each
    /// generation.
    pub mutation: (f64, f64),
    pub recombination: f64,
    pub tol: f64,
    pub atol: f64,
    pub max_iterations: usize,
    pub seed: Option<u64>,
    /// Refine the winner with a bounded Nelder-Mead run.
    pub polish: bool,
}

impl Default for EvolutionOptions {
    fn default() -> Self {
        Self {
            popsize: 15,
            mutation: (0.5, 1.0),
            recombination: 0.7,
            tol: 0.01,
            atol: 0.0,
            max_iterations: 1000,
            seed: None,
            polish: true,
        }
    }
}

/// Latin hypercube sample of `m` points in the unit cube.
fn latin_hypercube(rng: &mut fastrand::Rng, m: usize, n: usize) -> Vec<Vec<f64>> {
    let seg = 1.0 / m as f64;
    let mut pop = vec![vec![0.0; n]; m];
    for j in 0..n {
        let mut strata: Vec<usize> = (0..m).collect();
        rng.shuffle(&mut strata);
        for (i, member) in pop.iter_mut().enumerate() {
            member[j] = (strata[i] as f64 + rng.f64()) * seg;
        }
    }
    pop
}

fn scale(unit: &[f64], bounds: &[Bounds]) -> Vec<f64> {
    unit.iter()
        .zip(bounds)
        .map(|(u, b)| b.low + u * b.span())
        .collect()
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Index of the lowest energy; the first one wins ties.
fn argmin(energies: &[f64]) -> usize {
    energies
        .iter()
        .enumerate()
        .fold(0, |best, (i, e)| if *e < energies[best] { i } else { best })
}

/// Global minimisation over a box with `rand/best/1/bin` differential
/// evolution.
///
/// Trial vectors of a generation are evaluated in parallel on the current
/// rayon pool. `init` is called once per worker to build the private
/// state `f` evaluates against, so workers never share a model. All random
/// draws happen on the calling thread, which keeps seeded runs
/// reproducible regardless of the worker count.
pub fn minimize<S, I, F, CB>(
    init: I,
    f: F,
    bounds: &[Bounds],
    options: &EvolutionOptions,
    callback: &CB,
) -> BfResult<KernelResult>
where
    S: Send,
    I: Fn() -> S + Sync + Send,
    F: Fn(&mut S, &[f64]) -> BfResult<f64> + Sync + Send,
    CB: ProgressCallback + ?Sized,
{
    let n = bounds.len();
    let members = (options.popsize * n).max(5);
    let mut rng = match options.seed {
        Some(s) => fastrand::Rng::with_seed(s),
        None => fastrand::Rng::new(),
    };

    let evaluate = |unit_pop: &[Vec<f64>]| -> BfResult<Vec<f64>> {
        unit_pop
            .par_iter()
            .map_init(&init, |state, u| f(state, &scale(u, bounds)))
            .collect()
    };

    // 1. Initial population
    let mut population = latin_hypercube(&mut rng, members, n);
    let mut energies = evaluate(&population)?;
    let mut evaluations = members;
    let best = argmin(&energies);
    population.swap(0, best);
    energies.swap(0, best);

    // 2. Generations
    let mut iterations = 0usize;
    let mut converged = false;
    let mut stopped_early = false;

    for generation in 1..=options.max_iterations {
        iterations = generation;
        let weight = options.mutation.0 + rng.f64() * (options.mutation.1 - options.mutation.0);

        // A. Build trials (deferred updating)
        let trials: Vec<Vec<f64>> = (0..members)
            .map(|candidate| {
                let (r0, r1) = pick_two(&mut rng, members, candidate);
                let fill = rng.usize(0..n);
                (0..n)
                    .map(|j| {
                        if j == fill || rng.f64() < options.recombination {
                            let v = population[0][j]
                                + weight * (population[r0][j] - population[r1][j]);
                            if (0.0..=1.0).contains(&v) {
                                v
                            } else {
                                rng.f64()
                            }
                        } else {
                            population[candidate][j]
                        }
                    })
                    .collect()
            })
            .collect();

        // B. Evaluate in parallel
        let trial_energies = evaluate(&trials)?;
        evaluations += members;

        // C. Selection
        for (i, (trial, e)) in trials.into_iter().zip(trial_energies).enumerate() {
            if e < energies[i] {
                population[i] = trial;
                energies[i] = e;
            }
        }
        let best = argmin(&energies);
        population.swap(0, best);
        energies.swap(0, best);

        // D. Report & converge
        let best_x = scale(&population[0], bounds);
        if !callback.on_progress(generation, energies[0], &best_x) {
            stopped_early = true;
            break;
        }

        let (mean, std) = mean_std(&energies);
        if std <= options.atol + options.tol * mean.abs() {
            converged = true;
            break;
        }
    }

    let mut x = scale(&population[0], bounds);
    let mut fun = energies[0];
    debug!(
        "Evolution finished after {} generations (best {:.6e})",
        iterations, fun
    );

    // 3. Polish
    if options.polish && !stopped_early && n > 0 {
        let mut state = init();
        let polished = nelder_mead::minimize(
            |p| f(&mut state, p),
            &x,
            Some(bounds),
            &NelderMeadOptions::default(),
            &NoProgress,
        )?;
        evaluations += polished.evaluations;
        if polished.fun < fun {
            x = polished.x;
            fun = polished.fun;
        }
    }

    let message = if stopped_early {
        "Stopped by progress callback."
    } else if converged {
        "Optimization terminated successfully."
    } else {
        "Maximum number of iterations has been exceeded."
    };

    Ok(KernelResult {
        x,
        fun,
        iterations,
        evaluations,
        converged,
        stopped_early,
        message: message.to_string(),
    })
}

/// Two distinct members, neither equal to `candidate`.
fn pick_two(rng: &mut fastrand::Rng, members: usize, candidate: usize) -> (usize, usize) {
    let mut r0 = rng.usize(0..members);
    while r0 == candidate {
        r0 = rng.usize(0..members);
    }
    let mut r1 = rng.usize(0..members);
    while r1 == candidate || r1 == r0 {
        r1 = rng.usize(0..members);
    }
    (r0, r1)
}
