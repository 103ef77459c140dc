// models/garch.rs — GARCH(p,q) Likelihood, Fitted State and Forecasting
//
// ─────────────────────────────────────────────────────────────────────────
// MATHEMATICAL SPECIFICATION
// ─────────────────────────────────────────────────────────────────────────
//
// Mean model (constant):   ε_t = r_t − μ          r_t in percent
//
// Conditional variance, p lagged variances and q lagged squared shocks:
//
//       σ²_t = ω  +  Σ_{i=1..q} α_i · ε²_{t-i}  +  Σ_{j=1..p} β_j · σ²_{t-j}
//
//   Constraints (covariance stationarity):
//     ω > 0,  α_i ≥ 0,  β_j ≥ 0,  Σα + Σβ < 1
//
// Pre-sample ε² and σ² are replaced by the backcast
//
//       σ²_bc = Σ_{i<τ} w_i · ε²_i,   w_i ∝ 0.94^i,   τ = min(n, 75)
//
// Gaussian log-likelihood:
//
//       LL = −½ Σ_t [ ln(2π) + ln σ²_t + ε²_t / σ²_t ]
//
// Information criteria with k = 2 + p + q free parameters:
//
//       AIC = 2k − 2·LL          BIC = k·ln(n) − 2·LL
//
// Multi-step forecast from the end of the sample (E[ε²_{T+m}] = σ²_{T+m}):
//
//       σ²_{T+h} = ω + Σ α_i · ẽ²_{T+h-i} + Σ β_j · σ²_{T+h-j}
//       ẽ²_s = ε²_s for s ≤ T,   ẽ²_s = σ²_s for s > T
// ─────────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

const LN_2PI: f64 = 1.837_877_066_409_345_5;
const BACKCAST_DECAY: f64 = 0.94;
const BACKCAST_WINDOW: usize = 75;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GarchParams {
    /// μ: constant conditional mean
    pub mu: f64,
    /// ω: variance intercept
    pub omega: f64,
    /// α_1..α_q: ARCH (shock) coefficients
    pub alpha: Vec<f64>,
    /// β_1..β_p: GARCH (persistence) coefficients
    pub beta: Vec<f64>,
}

impl GarchParams {
    pub fn p(&self) -> usize {
        self.beta.len()
    }

    pub fn q(&self) -> usize {
        self.alpha.len()
    }

    pub fn n_params(&self) -> usize {
        2 + self.alpha.len() + self.beta.len()
    }

    /// Σα + Σβ
    pub fn persistence(&self) -> f64 {
        self.alpha.iter().sum::<f64>() + self.beta.iter().sum::<f64>()
    }

    /// σ²_∞ = ω / (1 − Σα − Σβ); `None` when the process is not stationary.
    pub fn longrun_variance(&self) -> Option<f64> {
        let persistence = self.persistence();
        (persistence < 1.0).then(|| self.omega / (1.0 - persistence))
    }
}

/// Exponentially weighted mean of the first τ squared residuals.
pub fn backcast(resid: &[f64]) -> f64 {
    let tau = resid.len().min(BACKCAST_WINDOW);
    if tau == 0 {
        return 0.0;
    }
    let mut weight = 1.0;
    let mut weight_sum = 0.0;
    let mut acc = 0.0;
    for e in &resid[..tau] {
        acc += weight * e * e;
        weight_sum += weight;
        weight *= BACKCAST_DECAY;
    }
    acc / weight_sum
}

/// Run the variance recursion over `resid`, returning σ²_t for every t.
pub fn conditional_variance(params: &GarchParams, resid: &[f64], backcast: f64) -> Vec<f64> {
    let mut sigma2 = Vec::with_capacity(resid.len());
    for t in 0..resid.len() {
        let mut v = params.omega;
        for (i, a) in params.alpha.iter().enumerate() {
            let lag = i + 1;
            let e2 = if t >= lag { resid[t - lag].powi(2) } else { backcast };
            v += a * e2;
        }
        for (j, b) in params.beta.iter().enumerate() {
            let lag = j + 1;
            let s2 = if t >= lag { sigma2[t - lag] } else { backcast };
            v += b * s2;
        }
        sigma2.push(v);
    }
    sigma2
}

/// Gaussian log-likelihood of `returns` under `params`.
///
/// Returns −∞ when any conditional variance is non-positive or non-finite,
/// which the optimizer treats as an infeasible point.
pub fn log_likelihood(params: &GarchParams, returns: &[f64]) -> f64 {
    let resid: Vec<f64> = returns.iter().map(|r| r - params.mu).collect();
    let sigma2 = conditional_variance(params, &resid, backcast(&resid));

    let mut ll = 0.0;
    for (e, v) in resid.iter().zip(&sigma2) {
        if !(v.is_finite() && *v > 0.0) {
            return f64::NEG_INFINITY;
        }
        ll -= 0.5 * (LN_2PI + v.ln() + e * e / v);
    }
    ll
}

/// (AIC, BIC) for a log-likelihood with `k` parameters over `n` observations.
pub fn information_criteria(log_likelihood: f64, k: usize, n: usize) -> (f64, f64) {
    let k = k as f64;
    let aic = 2.0 * k - 2.0 * log_likelihood;
    let bic = k * (n as f64).ln() - 2.0 * log_likelihood;
    (aic, bic)
}

/// h-step variance forecast seeded with the sample tail.
///
/// `tail_resid_sq` holds the last q squared residuals and `tail_variance` the
/// last p conditional variances, both oldest first.
pub fn forecast_variance(
    params: &GarchParams,
    tail_resid_sq: &[f64],
    tail_variance: &[f64],
    horizon: usize,
) -> Vec<f64> {
    let mut e2 = tail_resid_sq.to_vec();
    let mut s2 = tail_variance.to_vec();
    let mut out = Vec::new();

    for _ in 0..horizon {
        let mut v = params.omega;
        for (i, a) in params.alpha.iter().enumerate() {
            v += a * e2[e2.len() - 1 - i];
        }
        for (j, b) in params.beta.iter().enumerate() {
            v += b * s2[s2.len() - 1 - j];
        }
        out.push(v);
        e2.push(v);
        s2.push(v);
    }
    out
}

/// A fitted GARCH(p,q): parameters, fit statistics and the state needed to
/// forecast without the original return series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GarchFit {
    pub params:         GarchParams,
    pub log_likelihood: f64,
    pub aic:            f64,
    pub bic:            f64,
    pub n_obs:          usize,
    /// Optimizer iterations spent, summed over restarts
    pub iterations:     usize,
    pub tail_resid_sq:  Vec<f64>,
    pub tail_variance:  Vec<f64>,
}

impl GarchFit {
    /// Evaluate `params` on `returns` and capture the forecasting tail.
    ///
    /// `returns` must hold more than max(p, q) observations.
    pub fn from_params(params: GarchParams, returns: &[f64], iterations: usize) -> Self {
        let resid: Vec<f64> = returns.iter().map(|r| r - params.mu).collect();
        let sigma2 = conditional_variance(&params, &resid, backcast(&resid));
        let log_likelihood = log_likelihood(&params, returns);
        let (aic, bic) = information_criteria(log_likelihood, params.n_params(), returns.len());

        let n = resid.len();
        let tail_resid_sq = resid[n - params.q()..].iter().map(|e| e * e).collect();
        let tail_variance = sigma2[n - params.p()..].to_vec();

        Self {
            params,
            log_likelihood,
            aic,
            bic,
            n_obs: n,
            iterations,
            tail_resid_sq,
            tail_variance,
        }
    }

    pub fn forecast_variance(&self, horizon: usize) -> Vec<f64> {
        forecast_variance(&self.params, &self.tail_resid_sq, &self.tail_variance, horizon)
    }

    /// √σ²_{T+h} for h = 1..horizon, clamped at zero.
    pub fn forecast_volatility(&self, horizon: usize) -> Vec<f64> {
        self.forecast_variance(horizon)
            .into_iter()
            .map(|v| v.max(0.0).sqrt())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn garch11() -> GarchParams {
        GarchParams { mu: 0.0, omega: 0.05, alpha: vec![0.10], beta: vec![0.85] }
    }

    #[test]
    fn backcast_of_constant_shocks() {
        let resid = vec![2.0; 200];
        assert!((backcast(&resid) - 4.0).abs() < 1e-12);
        assert_eq!(backcast(&[]), 0.0);
    }

    #[test]
    fn variance_reacts_to_shock() {
        let params = garch11();
        let mut resid = vec![0.1; 20];
        resid[10] = 5.0; // shock
        let s2 = conditional_variance(&params, &resid, 1.0);
        assert!(s2[11] > s2[10]);
        assert!(s2[12] < s2[11]);
    }

    #[test]
    fn forecast_converges_to_longrun() {
        let params = garch11();
        let longrun = params.longrun_variance().unwrap();
        let path = forecast_variance(&params, &[9.0], &[4.0], 400);
        assert!((path[399] - longrun).abs() < 1e-6, "{} vs {longrun}", path[399]);
        // starts above σ²_∞ and decays monotonically
        assert!(path.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn first_forecast_step_matches_recursion() {
        let params = garch11();
        let path = forecast_variance(&params, &[9.0], &[4.0], 1);
        assert!((path[0] - (0.05 + 0.10 * 9.0 + 0.85 * 4.0)).abs() < 1e-12);
    }

    #[test]
    fn infeasible_variance_gives_neg_infinity() {
        let params = GarchParams { mu: 0.0, omega: -1.0, alpha: vec![0.0], beta: vec![] };
        assert_eq!(log_likelihood(&params, &[0.5, -0.5, 0.2]), f64::NEG_INFINITY);
    }

    #[test]
    fn information_criteria_penalise_parameters() {
        let (aic, bic) = information_criteria(-100.0, 4, 100);
        assert!((aic - 208.0).abs() < 1e-12);
        assert!((bic - (4.0 * 100f64.ln() + 200.0)).abs() < 1e-12);
    }

    #[test]
    fn fit_tail_has_order_lengths() {
        let params = GarchParams { mu: 0.0, omega: 0.1, alpha: vec![0.05, 0.05], beta: vec![0.8] };
        let returns: Vec<f64> = (0..50).map(|i| ((i * 7) % 11) as f64 / 5.0 - 1.0).collect();
        let fit = GarchFit::from_params(params, &returns, 0);
        assert_eq!(fit.tail_resid_sq.len(), 2);
        assert_eq!(fit.tail_variance.len(), 1);
        assert_eq!(fit.forecast_volatility(3).len(), 3);
        assert!(fit.forecast_volatility(3).iter().all(|v| *v > 0.0));
    }
}
