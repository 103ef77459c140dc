/// returns.rs — Return Series Builder
///
///   r_t = 100 · (close_t / close_{t-1} − 1)
///
/// Percent units, not decimals: the GARCH likelihood is badly conditioned
/// when ω has to live around 1e-5.
use crate::models::{PriceBar, ReturnPoint, ReturnSeries};

/// Sort by date, drop duplicate dates (first row wins), and compute
/// close-to-close percentage returns. The first row has no predecessor and
/// produces no return, so 0 or 1 bars give an empty series.
pub fn build(bars: &[PriceBar]) -> ReturnSeries {
    let mut sorted = bars.to_vec();
    sorted.sort_by_key(|b| b.date);
    sorted.dedup_by_key(|b| b.date);

    let points = sorted
        .windows(2)
        .map(|w| ReturnPoint {
            date: w[1].date,
            pct_return: 100.0 * (w[1].close / w[0].close - 1.0),
        })
        .collect();

    ReturnSeries::from_sorted(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn length_is_input_minus_one_and_ascending() {
        // deliberately most-recent-first, as AlphaVantage returns it
        let bars = vec![bar(5, 110.0), bar(4, 100.0), bar(3, 125.0), bar(2, 100.0)];
        let series = build(&bars);

        assert_eq!(series.len(), bars.len() - 1);
        let dates: Vec<_> = series.points().iter().map(|p| p.date).collect();
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn percentage_returns() {
        let series = build(&[bar(2, 100.0), bar(3, 125.0), bar(4, 100.0)]);
        let values = series.values();
        assert!((values[0] - 25.0).abs() < 1e-12);
        assert!((values[1] + 20.0).abs() < 1e-12);
        assert_eq!(series.first_date(), NaiveDate::from_ymd_opt(2024, 1, 3));
        assert_eq!(series.last_date(), NaiveDate::from_ymd_opt(2024, 1, 4));
    }

    #[test]
    fn short_input_gives_empty_series() {
        assert!(build(&[]).is_empty());
        assert!(build(&[bar(2, 100.0)]).is_empty());
    }

    #[test]
    fn duplicate_dates_collapse() {
        let series = build(&[bar(2, 100.0), bar(2, 100.0), bar(3, 101.0)]);
        assert_eq!(series.len(), 1);
    }
}
