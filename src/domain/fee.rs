//! Rental fee computation.
//!
//! Billing counts whole elapsed days between checkout and return; a partial
//! day is not billed, so a same-day return costs nothing.

use crate::domain::movie::DailyRate;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Whole days elapsed between `checked_out_at` and `returned_at`.
///
/// A return stamped before the checkout (clock skew between hosts) counts as
/// zero days rather than producing a negative fee.
pub fn billable_days(checked_out_at: DateTime<Utc>, returned_at: DateTime<Utc>) -> i64 {
    (returned_at - checked_out_at).num_days().max(0)
}

pub fn rental_fee(
    checked_out_at: DateTime<Utc>,
    returned_at: DateTime<Utc>,
    daily_rate: DailyRate,
) -> Decimal {
    Decimal::from(billable_days(checked_out_at, returned_at)) * daily_rate.value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn day_zero() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn rate(value: Decimal) -> DailyRate {
        DailyRate::new(value).unwrap()
    }

    #[test]
    fn test_seven_day_rental_at_rate_two() {
        let returned = day_zero() + Duration::days(7);
        assert_eq!(rental_fee(day_zero(), returned, rate(dec!(2))), dec!(14));
    }

    #[test]
    fn test_same_day_return_is_free() {
        let returned = day_zero() + Duration::hours(23) + Duration::minutes(59);
        assert_eq!(billable_days(day_zero(), returned), 0);
        assert_eq!(rental_fee(day_zero(), returned, rate(dec!(3))), dec!(0));
    }

    #[test]
    fn test_partial_days_are_truncated() {
        let returned = day_zero() + Duration::days(2) + Duration::hours(20);
        assert_eq!(billable_days(day_zero(), returned), 2);
        assert_eq!(rental_fee(day_zero(), returned, rate(dec!(1.5))), dec!(3.0));
    }

    #[test]
    fn test_return_before_checkout_costs_nothing() {
        let returned = day_zero() - Duration::days(1);
        assert_eq!(billable_days(day_zero(), returned), 0);
        assert_eq!(rental_fee(day_zero(), returned, rate(dec!(2))), dec!(0));
    }

    #[test]
    fn test_zero_rate_is_free() {
        let returned = day_zero() + Duration::days(30);
        assert_eq!(rental_fee(day_zero(), returned, rate(dec!(0))), dec!(0));
    }
}
