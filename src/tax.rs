//! Australian resident income tax and Medicare levy estimates.
//!
//! These are deliberately simple estimates: tax offsets, the Medicare levy
//! surcharge, study loan repayments and other adjustments are not modelled.

use serde::Serialize;
use tabled::Tabled;

/// Pay periods per year when paid fortnightly.
pub const FORTNIGHTS_PER_YEAR: f64 = 26.0;

/// Flat Medicare levy rate.
pub const MEDICARE_RATE: f64 = 0.02;
/// Income at or below which no levy is payable under the low-income reduction.
pub const MEDICARE_LOWER_THRESHOLD: f64 = 27_222.0;
/// Rate at which the levy phases in above the lower threshold.
pub const MEDICARE_PHASE_IN_RATE: f64 = 0.10;

/// One progressive bracket: income above `floor` is taxed at `rate`
/// on top of the cumulative `base`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxBracket {
    pub floor: f64,
    pub base: f64,
    pub rate: f64,
}

pub const BRACKETS: [TaxBracket; 5] = [
    TaxBracket { floor: 0.0, base: 0.0, rate: 0.0 },
    TaxBracket { floor: 18_200.0, base: 0.0, rate: 0.16 },
    TaxBracket { floor: 45_000.0, base: 4_288.0, rate: 0.30 },
    TaxBracket { floor: 135_000.0, base: 31_288.0, rate: 0.37 },
    TaxBracket { floor: 190_000.0, base: 51_638.0, rate: 0.45 },
];

/// Annual income tax on `taxable_income`. Negative or non-finite income is
/// treated as zero.
pub fn annual_income_tax(taxable_income: f64) -> f64 {
    let income = clamp_income(taxable_income);
    let bracket = BRACKETS
        .iter()
        .rev()
        .find(|b| income >= b.floor)
        .unwrap_or(&BRACKETS[0]);
    bracket.base + bracket.rate * (income - bracket.floor)
}

/// Medicare levy on `taxable_income`.
///
/// Without the reduction this is always the flat rate. With it, nothing is
/// payable up to the lower threshold and the levy then phases in at
/// [`MEDICARE_PHASE_IN_RATE`] until it meets the flat amount.
pub fn medicare_levy(taxable_income: f64, apply_low_income_reduction: bool) -> f64 {
    let income = clamp_income(taxable_income);
    let flat = income * MEDICARE_RATE;
    if !apply_low_income_reduction {
        return flat;
    }
    if income <= MEDICARE_LOWER_THRESHOLD {
        return 0.0;
    }
    flat.min((income - MEDICARE_LOWER_THRESHOLD) * MEDICARE_PHASE_IN_RATE)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Tabled)]
pub struct PayEstimate {
    pub gross: f64,
    pub tax: f64,
    pub net: f64,
}

/// Estimated take-home pay for one fortnight of `hours` at `hourly_wage`.
///
/// The fortnight's gross is annualized, taxed, and the annual tax spread
/// back over 26 fortnights.
pub fn fortnightly_net_pay(hours: f64, hourly_wage: f64, apply_low_income_reduction: bool) -> PayEstimate {
    let gross = clamp_income(hours * hourly_wage);
    let annual = gross * FORTNIGHTS_PER_YEAR;
    let annual_tax = annual_income_tax(annual) + medicare_levy(annual, apply_low_income_reduction);
    let tax = annual_tax / FORTNIGHTS_PER_YEAR;
    PayEstimate {
        gross,
        tax,
        net: (gross - tax).max(0.0),
    }
}

fn clamp_income(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}
