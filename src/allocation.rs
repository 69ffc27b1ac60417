use serde::Serialize;
use tabled::Tabled;

use crate::error::{AppError, AppResult};

/// How a paycheck is split across the three buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub to_saving: f64,
    pub to_spending: f64,
    pub to_investing: f64,
}

impl Allocation {
    pub fn total(&self) -> f64 {
        self.to_saving + self.to_spending + self.to_investing
    }
}

/// Splits `paycheck` by the given percentages and reconciles the previous
/// period's spending against the new allowance.
///
/// The carry-over is credited to savings and deducted from spending, with
/// spending floored at zero. Percentages are used as given and need not sum
/// to 100; call [`validate_split`] first when a strict split is wanted.
pub fn allocate(
    paycheck: f64,
    saving_percent: f64,
    spending_percent: f64,
    investing_percent: f64,
    carry_over: f64,
) -> Allocation {
    Allocation {
        to_saving: paycheck * saving_percent / 100.0 + carry_over,
        to_spending: (paycheck * spending_percent / 100.0 - carry_over).max(0.0),
        to_investing: paycheck * investing_percent / 100.0,
    }
}

/// Checks that each percentage is within 0..=100 and that they add up to 100.
pub fn validate_split(saving_percent: f64, spending_percent: f64, investing_percent: f64) -> AppResult<()> {
    for (name, value) in [
        ("savingPercent", saving_percent),
        ("spendingPercent", spending_percent),
        ("investingPercent", investing_percent),
    ] {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(AppError::Validation(format!("{name} must be between 0 and 100")));
        }
    }

    let sum = saving_percent + spending_percent + investing_percent;
    if (sum - 100.0).abs() > 1e-9 {
        return Err(AppError::Validation(format!(
            "allocation percentages must add up to 100 (got {sum})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
    }

    #[test]
    fn test_allocate_with_carry_over() {
        let a = allocate(1000.0, 70.0, 10.0, 20.0, 50.0);
        assert_close(a.to_saving, 750.0);
        assert_close(a.to_spending, 50.0);
        assert_close(a.to_investing, 200.0);
    }

    #[test]
    fn test_allocate_spending_floor() {
        let a = allocate(1000.0, 70.0, 10.0, 20.0, 200.0);
        assert_close(a.to_saving, 900.0);
        assert_eq!(a.to_spending, 0.0);
        assert_close(a.to_investing, 200.0);
    }

    #[test]
    fn test_allocate_conserves_paycheck_without_carry_over() {
        for (paycheck, s, sp, i) in [
            (1000.0, 70.0, 10.0, 20.0),
            (1234.56, 33.3, 33.3, 33.4),
            (0.0, 50.0, 25.0, 25.0),
            (2871.13, 0.0, 100.0, 0.0),
        ] {
            assert_close(allocate(paycheck, s, sp, i, 0.0).total(), paycheck);
        }
    }

    #[test]
    fn test_allocate_spending_never_negative() {
        for carry in [0.0, 99.0, 100.0, 101.0, 5_000.0] {
            assert!(allocate(1000.0, 70.0, 10.0, 20.0, carry).to_spending >= 0.0);
        }
    }

    #[test]
    fn test_allocate_unnormalized_percentages() {
        let a = allocate(1000.0, 80.0, 20.0, 20.0, 0.0);
        assert_close(a.total(), 1200.0);
    }

    #[test]
    fn test_validate_split() {
        assert!(validate_split(70.0, 10.0, 20.0).is_ok());
        assert!(validate_split(33.3, 33.3, 33.4).is_ok());
        assert!(matches!(validate_split(80.0, 20.0, 20.0), Err(AppError::Validation(_))));
        assert!(matches!(validate_split(-10.0, 90.0, 20.0), Err(AppError::Validation(_))));
        assert!(matches!(validate_split(f64::NAN, 50.0, 50.0), Err(AppError::Validation(_))));
    }
}
