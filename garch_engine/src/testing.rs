/// testing.rs — Deterministic price fixtures for unit tests
use chrono::NaiveDate;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::distribution::Normal;

use crate::calendar::business_days_after;
use crate::models::PriceBar;

/// `n_days` business-day bars starting 2024-01-01, closes following a
/// random walk with GARCH(1,1) shocks (percent units).
pub fn synthetic_bars(n_days: usize, seed: u64) -> Vec<PriceBar> {
    let mut rng = StdRng::seed_from_u64(seed);
    let z = Normal::new(0.0, 1.0).unwrap();
    let start = NaiveDate::from_ymd_opt(2023, 12, 29).unwrap();

    let (omega, alpha, beta) = (0.05, 0.10, 0.85);
    let mut sigma2 = omega / (1.0 - alpha - beta);
    let mut shock: f64 = 0.0;
    let mut close = 100.0;

    business_days_after(start, n_days)
        .into_iter()
        .map(|date| {
            sigma2 = omega + alpha * shock.powi(2) + beta * sigma2;
            shock = sigma2.sqrt() * z.sample(&mut rng);
            close *= 1.0 + shock / 100.0;
            PriceBar {
                date,
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1_000_000.0,
            }
        })
        .collect()
}
