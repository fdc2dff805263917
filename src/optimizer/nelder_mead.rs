use super::{KernelResult, ProgressCallback};
use crate::error::{BeamForgeError, BfResult};
use crate::selection::Bounds;

const NONZDELT: f64 = 0.05;
const ZDELT: f64 = 0.00025;

#[derive(Debug, Clone, PartialEq)]
pub struct NelderMeadOptions {
    pub xatol: f64,
    pub fatol: f64,
    /// Defaults to `200 * n` when unset.
    pub max_iterations: Option<usize>,
    /// Defaults to `200 * n` when unset.
    pub max_evaluations: Option<usize>,
    /// Dimension-dependent coefficients (Gao & Han 2012).
    pub adaptive: bool,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            xatol: 1e-4,
            fatol: 1e-4,
            max_iterations: None,
            max_evaluations: None,
            adaptive: false,
        }
    }
}

struct Coefficients {
    rho: f64,
    chi: f64,
    psi: f64,
    sigma: f64,
}

impl Coefficients {
    fn new(n: usize, adaptive: bool) -> Self {
        if adaptive && n > 0 {
            let dim = n as f64;
            Self {
                rho: 1.0,
                chi: 1.0 + 2.0 / dim,
                psi: 0.75 - 1.0 / (2.0 * dim),
                sigma: 1.0 - 1.0 / dim,
            }
        } else {
            Self {
                rho: 1.0,
                chi: 2.0,
                psi: 0.5,
                sigma: 0.5,
            }
        }
    }
}

fn clip(x: &mut [f64], bounds: Option<&[Bounds]>) {
    if let Some(bounds) = bounds {
        for (v, b) in x.iter_mut().zip(bounds) {
            *v = b.clamp(*v);
        }
    }
}

/// `a * p + b * q`, elementwise.
fn combine(a: f64, p: &[f64], b: f64, q: &[f64]) -> Vec<f64> {
    p.iter().zip(q).map(|(pi, qi)| a * pi + b * qi).collect()
}

/// Downhill simplex minimisation starting from `x0`.
///
/// When `bounds` are given every trial point is clipped into them. Errors
/// returned by `f` abort the search and are propagated unchanged.
pub fn minimize<F, CB>(
    mut f: F,
    x0: &[f64],
    bounds: Option<&[Bounds]>,
    options: &NelderMeadOptions,
    callback: &CB,
) -> BfResult<KernelResult>
where
    F: FnMut(&[f64]) -> BfResult<f64>,
    CB: ProgressCallback + ?Sized,
{
    let n = x0.len();
    if n == 0 {
        return Err(BeamForgeError::EmptySelection("no knobs to optimize".to_string()));
    }
    let c = Coefficients::new(n, options.adaptive);
    let max_iterations = options.max_iterations.unwrap_or(200 * n.max(1));
    let max_evaluations = options.max_evaluations.unwrap_or(200 * n.max(1));

    let mut evaluations = 0usize;
    macro_rules! eval {
        ($x:expr) => {{
            let point: &[f64] = $x;
            evaluations += 1;
            f(point)?
        }};
    }

    // 1. Initial simplex
    let mut start = x0.to_vec();
    clip(&mut start, bounds);
    let mut sim: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    sim.push(start.clone());
    for k in 0..n {
        let mut y = start.clone();
        y[k] = if y[k] != 0.0 { (1.0 + NONZDELT) * y[k] } else { ZDELT };
        clip(&mut y, bounds);
        sim.push(y);
    }

    let mut fsim = Vec::with_capacity(n + 1);
    for x in &sim {
        fsim.push(eval!(x));
    }
    sort_simplex(&mut sim, &mut fsim);

    // 2. Main loop
    let mut iterations = 1usize;
    let mut stopped_early = false;

    while evaluations < max_evaluations && iterations < max_iterations {
        let x_spread = sim[1..]
            .iter()
            .flat_map(|v| v.iter().zip(&sim[0]).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        let f_spread = fsim[1..]
            .iter()
            .map(|v| (fsim[0] - v).abs())
            .fold(0.0, f64::max);
        if x_spread <= options.xatol && f_spread <= options.fatol {
            break;
        }

        let mut xbar = vec![0.0; n];
        for v in &sim[..n] {
            for (acc, vi) in xbar.iter_mut().zip(v) {
                *acc += vi / n as f64;
            }
        }
        let worst = sim[n].clone();

        let mut xr = combine(1.0 + c.rho, &xbar, -c.rho, &worst);
        clip(&mut xr, bounds);
        let fxr = eval!(&xr);
        let mut shrink = false;

        if fxr < fsim[0] {
            let mut xe = combine(1.0 + c.rho * c.chi, &xbar, -c.rho * c.chi, &worst);
            clip(&mut xe, bounds);
            let fxe = eval!(&xe);
            if fxe < fxr {
                sim[n] = xe;
                fsim[n] = fxe;
            } else {
                sim[n] = xr;
                fsim[n] = fxr;
            }
        } else if fxr < fsim[n - 1] {
            sim[n] = xr;
            fsim[n] = fxr;
        } else if fxr < fsim[n] {
            // Outside contraction
            let mut xc = combine(1.0 + c.psi * c.rho, &xbar, -c.psi * c.rho, &worst);
            clip(&mut xc, bounds);
            let fxc = eval!(&xc);
            if fxc <= fxr {
                sim[n] = xc;
                fsim[n] = fxc;
            } else {
                shrink = true;
            }
        } else {
            // Inside contraction
            let mut xcc = combine(1.0 - c.psi, &xbar, c.psi, &worst);
            clip(&mut xcc, bounds);
            let fxcc = eval!(&xcc);
            if fxcc < fsim[n] {
                sim[n] = xcc;
                fsim[n] = fxcc;
            } else {
                shrink = true;
            }
        }

        if shrink {
            let best = sim[0].clone();
            for j in 1..=n {
                let mut v = combine(1.0 - c.sigma, &best, c.sigma, &sim[j]);
                clip(&mut v, bounds);
                fsim[j] = eval!(&v);
                sim[j] = v;
            }
        }

        iterations += 1;
        sort_simplex(&mut sim, &mut fsim);

        if !callback.on_progress(iterations, fsim[0], &sim[0]) {
            stopped_early = true;
            break;
        }
    }

    let exhausted = evaluations >= max_evaluations || iterations >= max_iterations;
    let message = if stopped_early {
        "Stopped by progress callback."
    } else if evaluations >= max_evaluations {
        "Maximum number of function evaluations has been exceeded."
    } else if iterations >= max_iterations {
        "Maximum number of iterations has been exceeded."
    } else {
        "Optimization terminated successfully."
    };

    Ok(KernelResult {
        x: sim.swap_remove(0),
        fun: fsim[0],
        iterations,
        evaluations,
        converged: !stopped_early && !exhausted,
        stopped_early,
        message: message.to_string(),
    })
}

fn sort_simplex(sim: &mut Vec<Vec<f64>>, fsim: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..fsim.len()).collect();
    order.sort_by(|&a, &b| fsim[a].total_cmp(&fsim[b]));
    *sim = order.iter().map(|&i| sim[i].clone()).collect();
    *fsim = order.iter().map(|&i| fsim[i]).collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::NoProgress;

    fn sphere(x: &[f64]) -> BfResult<f64> {
        Ok((x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2))
    }

    fn rosenbrock(x: &[f64]) -> BfResult<f64> {
        Ok((1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2))
    }

    #[test]
    fn test_sphere_converges() {
        let r = minimize(sphere, &[0.0, 0.0], None, &NelderMeadOptions::default(), &NoProgress)
            .unwrap();
        assert!(r.converged, "{}", r.message);
        assert!((r.x[0] - 3.0).abs() < 1e-3);
        assert!((r.x[1] + 1.0).abs() < 1e-3);
        assert!(r.fun < 1e-6);
    }

    #[test]
    fn test_rosenbrock_converges() {
        let r = minimize(
            rosenbrock,
            &[-1.2, 1.0],
            None,
            &NelderMeadOptions::default(),
            &NoProgress,
        )
        .unwrap();
        assert!((r.x[0] - 1.0).abs() < 1e-2);
        assert!((r.x[1] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_adaptive_converges_on_sphere() {
        let opts = NelderMeadOptions {
            adaptive: true,
            ..Default::default()
        };
        let r = minimize(sphere, &[10.0, 10.0], None, &opts, &NoProgress).unwrap();
        assert!((r.x[0] - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_bounds_clip_trial_points() {
        let bounds = [Bounds::new(0.0, 2.0), Bounds::new(0.0, 2.0)];
        let r = minimize(
            sphere,
            &[1.0, 1.0],
            Some(&bounds),
            &NelderMeadOptions::default(),
            &NoProgress,
        )
        .unwrap();
        assert!(r.x.iter().zip(&bounds).all(|(v, b)| *v >= b.low && *v <= b.high));
        assert!((r.x[0] - 2.0).abs() < 1e-2);
        assert!(r.x[1].abs() < 1e-2);
    }

    #[test]
    fn test_evaluation_limit_reports_not_converged() {
        let opts = NelderMeadOptions {
            max_evaluations: Some(10),
            ..Default::default()
        };
        let r = minimize(rosenbrock, &[-1.2, 1.0], None, &opts, &NoProgress).unwrap();
        assert!(!r.converged);
        assert!(r.evaluations >= 10);
    }

    #[test]
    fn test_errors_propagate() {
        let mut calls = 0;
        let failing = |_: &[f64]| -> BfResult<f64> {
            calls += 1;
            if calls > 3 {
                Err(BeamForgeError::NumericFailure("nan".into()))
            } else {
                Ok(1.0)
            }
        };
        let r = minimize(failing, &[1.0, 1.0], None, &NelderMeadOptions::default(), &NoProgress);
        assert!(r.is_err());
    }
}
