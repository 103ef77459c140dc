/// models/estimator.rs — Maximum-likelihood GARCH(p,q) estimation
///
/// The rest of the crate only sees [`VolatilityEstimator`]: returns in,
/// [`GarchFit`] out. [`GarchEstimator`] maximises the Gaussian likelihood
/// with a Nelder-Mead simplex over an unconstrained parameter vector
///
///   x = [ μ, ln ω, z_α1..z_αq, z_β1..z_βp ]
///
/// mapped back through
///
///   ω = e^{x_1}
///   c_k = e^{z_k} / (1 + Σ_m e^{z_m})      (α's and β's share the softmax)
///
/// so every point the simplex visits satisfies ω > 0, c_k ≥ 0 and
/// Σα + Σβ < 1 without penalty terms.
use ndarray::Array1;
use statrs::statistics::Statistics;
use thiserror::Error;
use tracing::debug;

use super::garch::{log_likelihood, GarchFit, GarchParams};
use crate::config::AppConfig;

/// Largest total lag order accepted (p + q).
pub const MAX_TOTAL_ORDER: usize = 10;

const Z_CLAMP: f64 = 50.0;
const START_ALPHA: f64 = 0.10;
const START_BETA: f64 = 0.80;
const START_ARCH_ONLY: f64 = 0.30;

// Nelder-Mead coefficients: reflection, expansion, contraction, shrink
const NM_ALPHA: f64 = 1.0;
const NM_GAMMA: f64 = 2.0;
const NM_RHO: f64 = 0.5;
const NM_SIGMA: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimatorError {
    #[error("cannot fit GARCH on an empty return series")]
    EmptySeries,
    #[error("invalid GARCH order p={p}, q={q}: {reason}")]
    InvalidOrder { p: usize, q: usize, reason: &'static str },
    #[error("GARCH({p},{q}) needs more than {needed} observations, got {got}")]
    TooFewObservations { p: usize, q: usize, needed: usize, got: usize },
    #[error("return series contains a non-finite value at position {0}")]
    NonFinite(usize),
    #[error("return series has zero variance; nothing to model")]
    ZeroVariance,
    #[error("optimizer did not converge after {iterations} iterations (objective spread {spread:.3e})")]
    NotConverged { iterations: usize, spread: f64 },
    #[error("log-likelihood is not finite at the optimum")]
    DegenerateLikelihood,
}

/// Narrow boundary between the volatility model and the numerics.
pub trait VolatilityEstimator: Send + Sync {
    fn fit(&self, returns: &[f64], p: usize, q: usize) -> Result<GarchFit, EstimatorError>;
}

#[derive(Debug, Clone)]
pub struct GarchEstimator {
    /// Simplex iterations allowed per run (the search runs twice)
    pub max_iterations: usize,
    /// Relative spread of objective values at which a run has converged
    pub tolerance: f64,
}

impl Default for GarchEstimator {
    fn default() -> Self {
        Self { max_iterations: 5_000, tolerance: 1e-9 }
    }
}

impl GarchEstimator {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self { max_iterations, tolerance }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.garch_max_iterations, cfg.garch_tolerance)
    }
}

impl VolatilityEstimator for GarchEstimator {
    fn fit(&self, returns: &[f64], p: usize, q: usize) -> Result<GarchFit, EstimatorError> {
        validate(returns, p, q)?;

        let mean = returns.mean();
        let variance = returns.population_variance();
        if !(variance.is_finite() && variance > 0.0) {
            return Err(EstimatorError::ZeroVariance);
        }

        let start = starting_point(mean, variance, p, q);
        let mut steps = Array1::from_elem(start.len(), 0.25);
        steps[0] = 0.1 * variance.sqrt();

        // Mean log-likelihood keeps the tolerance independent of n.
        let n = returns.len() as f64;
        let objective = |x: &Array1<f64>| {
            let ll = log_likelihood(&decode(x, p, q), returns);
            if ll.is_finite() { -ll / n } else { f64::INFINITY }
        };

        let first = nelder_mead(&objective, &start, &steps, self.max_iterations, self.tolerance);
        debug!(
            "GARCH({},{}) first pass: f={:.6} iters={} converged={}",
            p, q, first.value, first.iterations, first.converged
        );
        // Restart around the best vertex to escape a collapsed simplex.
        let second = nelder_mead(&objective, &first.best, &steps, self.max_iterations, self.tolerance);
        let iterations = first.iterations + second.iterations;

        if !(first.converged && second.converged) {
            return Err(EstimatorError::NotConverged {
                iterations,
                spread: if second.converged { first.spread } else { second.spread },
            });
        }

        let best = if second.value <= first.value { &second.best } else { &first.best };
        let fit = GarchFit::from_params(decode(best, p, q), returns, iterations);
        if !fit.log_likelihood.is_finite() {
            return Err(EstimatorError::DegenerateLikelihood);
        }
        Ok(fit)
    }
}

fn validate(returns: &[f64], p: usize, q: usize) -> Result<(), EstimatorError> {
    if q == 0 {
        return Err(EstimatorError::InvalidOrder { p, q, reason: "q must be at least 1" });
    }
    if p + q > MAX_TOTAL_ORDER {
        return Err(EstimatorError::InvalidOrder { p, q, reason: "p + q must not exceed 10" });
    }
    if returns.is_empty() {
        return Err(EstimatorError::EmptySeries);
    }
    let needed = 2 + p + q;
    if returns.len() <= needed {
        return Err(EstimatorError::TooFewObservations { p, q, needed, got: returns.len() });
    }
    if let Some(pos) = returns.iter().position(|r| !r.is_finite()) {
        return Err(EstimatorError::NonFinite(pos));
    }
    Ok(())
}

fn starting_point(mean: f64, variance: f64, p: usize, q: usize) -> Array1<f64> {
    let (alpha_total, beta_total) = if p == 0 {
        (START_ARCH_ONLY, 0.0)
    } else {
        (START_ALPHA, START_BETA)
    };
    let persistence = alpha_total + beta_total;
    let omega = variance * (1.0 - persistence);

    let mut x = Vec::with_capacity(2 + p + q);
    x.push(mean);
    x.push(omega.ln());
    // inverse softmax: z_k = ln(c_k / (1 − Σc))
    x.extend((0..q).map(|_| (alpha_total / q as f64 / (1.0 - persistence)).ln()));
    x.extend((0..p).map(|_| (beta_total / p as f64 / (1.0 - persistence)).ln()));
    Array1::from(x)
}

fn decode(x: &Array1<f64>, p: usize, q: usize) -> GarchParams {
    let weights: Vec<f64> = x
        .iter()
        .skip(2)
        .map(|z| z.clamp(-Z_CLAMP, Z_CLAMP).exp())
        .collect();
    let denom = 1.0 + weights.iter().sum::<f64>();

    GarchParams {
        mu:    x[0],
        omega: x[1].clamp(-Z_CLAMP, Z_CLAMP).exp(),
        alpha: weights[..q].iter().map(|w| w / denom).collect(),
        beta:  weights[q..q + p].iter().map(|w| w / denom).collect(),
    }
}

struct SimplexOutcome {
    best:       Array1<f64>,
    value:      f64,
    iterations: usize,
    spread:     f64,
    converged:  bool,
}

/// Minimise `f` from `start`; converged once the objective spread across the
/// simplex drops below `tol · (1 + |f_best|)`.
fn nelder_mead<F>(
    f: &F,
    start: &Array1<f64>,
    steps: &Array1<f64>,
    max_iterations: usize,
    tol: f64,
) -> SimplexOutcome
where
    F: Fn(&Array1<f64>) -> f64,
{
    let n = start.len();
    let mut simplex: Vec<(Array1<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((start.clone(), f(start)));
    for i in 0..n {
        let mut vertex = start.clone();
        vertex[i] += steps[i];
        let value = f(&vertex);
        simplex.push((vertex, value));
    }

    let mut iterations = 0;
    loop {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let best = simplex[0].1;
        let spread = (simplex[n].1 - best).abs();
        let converged = spread <= tol * (1.0 + best.abs());

        if converged || iterations >= max_iterations {
            return SimplexOutcome {
                best: simplex[0].0.clone(),
                value: best,
                iterations,
                spread,
                converged,
            };
        }
        iterations += 1;

        let centroid = simplex[..n]
            .iter()
            .fold(Array1::<f64>::zeros(n), |acc, (x, _)| acc + x)
            / n as f64;
        let worst = simplex[n].0.clone();
        let worst_value = simplex[n].1;

        let reflected = &centroid + &((&centroid - &worst) * NM_ALPHA);
        let f_reflected = f(&reflected);

        if f_reflected < simplex[0].1 {
            let expanded = &centroid + &((&reflected - &centroid) * NM_GAMMA);
            let f_expanded = f(&expanded);
            simplex[n] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
            continue;
        }
        if f_reflected < simplex[n - 1].1 {
            simplex[n] = (reflected, f_reflected);
            continue;
        }

        let contracted = if f_reflected < worst_value {
            &centroid + &((&reflected - &centroid) * NM_RHO)
        } else {
            &centroid + &((&worst - &centroid) * NM_RHO)
        };
        let f_contracted = f(&contracted);
        if f_contracted < f_reflected.min(worst_value) {
            simplex[n] = (contracted, f_contracted);
            continue;
        }

        // shrink towards the best vertex
        let anchor = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            vertex.0 = &anchor + &((&vertex.0 - &anchor) * NM_SIGMA);
            vertex.1 = f(&vertex.0);
        }
    }
}
