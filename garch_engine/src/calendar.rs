/// calendar.rs — Business-day stepping (Mon–Fri, no holiday calendar)
use chrono::{Datelike, NaiveDate, Weekday};

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// First business day strictly after `date`.
pub fn next_business_day(date: NaiveDate) -> Option<NaiveDate> {
    let mut d = date.succ_opt()?;
    while !is_business_day(d) {
        d = d.succ_opt()?;
    }
    Some(d)
}

/// The `n` business days following `date`, ascending.
///
/// Stops early only at the end of chrono's representable range.
pub fn business_days_after(date: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut cursor = date;
    while out.len() < n {
        match next_business_day(cursor) {
            Some(d) => {
                out.push(d);
                cursor = d;
            }
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn friday_rolls_to_monday() {
        // 2024-03-08 is a Friday
        assert_eq!(next_business_day(d(2024, 3, 8)), Some(d(2024, 3, 11)));
        assert_eq!(next_business_day(d(2024, 3, 9)), Some(d(2024, 3, 11)));
        assert_eq!(next_business_day(d(2024, 3, 11)), Some(d(2024, 3, 12)));
    }

    #[test]
    fn skips_weekends_over_a_horizon() {
        let days = business_days_after(d(2024, 3, 7), 5);
        assert_eq!(
            days,
            vec![d(2024, 3, 8), d(2024, 3, 11), d(2024, 3, 12), d(2024, 3, 13), d(2024, 3, 14)]
        );
        assert!(days.iter().all(|day| is_business_day(*day)));
    }

    #[test]
    fn zero_horizon_is_empty() {
        assert!(business_days_after(d(2024, 1, 1), 0).is_empty());
    }
}
