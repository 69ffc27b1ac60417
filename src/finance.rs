//! Request-level finance operations: everything that combines period,
//! tax and allocation math with stored state.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::{Map, Value};

use crate::allocation::{allocate, validate_split};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{
    AccountSummary, Currency, FortnightOverview, FortnightSpendingRecord, NewHolding,
    PaycheckAllocation, ProfileField, ProfileUpdate, StockHolding,
};
use crate::period::{FortnightCalendar, PeriodSelector};
use crate::tax::FORTNIGHTS_PER_YEAR;

/// Parses the optional `period` field of a spending request.
pub fn parse_period(raw: Option<&str>) -> AppResult<PeriodSelector> {
    raw.map_or(Ok(PeriodSelector::Current), |p| p.parse().map_err(AppError::Validation))
}

/// Extracts a non-negative spending amount from a raw JSON value.
pub fn parse_amount(raw: Option<&Value>) -> AppResult<f64> {
    match raw.and_then(Value::as_f64) {
        Some(amount) if amount.is_finite() && amount >= 0.0 => Ok(amount),
        _ => Err(AppError::Validation("amount must be a non-negative number".into())),
    }
}

/// Sets the spending total for the selected fortnight, replacing any
/// earlier value for that period.
pub fn record_spending(
    conn: &Connection,
    calendar: &FortnightCalendar,
    user_id: &str,
    amount: f64,
    period: PeriodSelector,
    now: DateTime<Utc>,
) -> AppResult<FortnightSpendingRecord> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::Validation("amount must be a non-negative number".into()));
    }
    let period_start = calendar.resolve(period, now).date_naive();
    let record = db::upsert_spending(conn, user_id, period_start, amount, now)?;
    tracing::info!(user_id, %period_start, amount, "recorded fortnight spending");
    Ok(record)
}

pub fn fortnight_overview(
    conn: &Connection,
    calendar: &FortnightCalendar,
    user_id: &str,
    now: DateTime<Utc>,
) -> AppResult<FortnightOverview> {
    let current = calendar.current_period_start(now);
    let previous = calendar.previous_period_start(now);
    let amount_for = |start: DateTime<Utc>| -> AppResult<f64> {
        Ok(db::spending_for_period(conn, user_id, start.date_naive())?
            .map(|r| r.amount_spent)
            .unwrap_or(0.0))
    };

    Ok(FortnightOverview {
        current_period_start: current,
        previous_period_start: previous,
        current_period_end: calendar.period_end(now),
        current_amount: amount_for(current)?,
        previous_amount: amount_for(previous)?,
    })
}

/// Applies every recognised, in-range field of `patch` and reports which
/// keys were applied and which were dropped. Fails only when nothing is left
/// to apply.
pub fn apply_profile_patch(conn: &Connection, user_id: &str, patch: &Map<String, Value>) -> AppResult<ProfileUpdate> {
    let mut changes = Vec::new();
    let mut ignored = Vec::new();

    for (key, value) in patch {
        let accepted = ProfileField::from_key(key)
            .zip(value.as_f64())
            .filter(|(field, v)| field.accepts(*v));
        match accepted {
            Some(change) => changes.push(change),
            None => ignored.push(key.clone()),
        }
    }

    if changes.is_empty() {
        return Err(AppError::Validation("nothing to update".into()));
    }
    if !ignored.is_empty() {
        tracing::warn!(user_id, ?ignored, "dropped invalid profile fields");
    }

    let profile = db::update_profile(conn, user_id, &changes)?;
    Ok(ProfileUpdate {
        profile,
        applied: changes.iter().map(|(f, _)| f.key().to_string()).collect(),
        ignored,
    })
}

/// Splits a paycheck using the stored percentages, carrying over what was
/// spent in the previous fortnight.
pub fn allocate_paycheck(
    conn: &Connection,
    calendar: &FortnightCalendar,
    user_id: &str,
    paycheck_amount: f64,
    strict: bool,
    now: DateTime<Utc>,
) -> AppResult<PaycheckAllocation> {
    if !paycheck_amount.is_finite() || paycheck_amount < 0.0 {
        return Err(AppError::Validation("paycheckAmount must be a non-negative number".into()));
    }

    let profile = db::get_or_create_profile(conn, user_id)?;
    if strict {
        validate_split(profile.saving_percent, profile.spending_percent, profile.investing_percent)?;
    }

    let previous = calendar.previous_period_start(now).date_naive();
    let previous_period_spent = db::spending_for_period(conn, user_id, previous)?
        .map(|r| r.amount_spent)
        .unwrap_or(0.0);

    let split = allocate(
        paycheck_amount,
        profile.saving_percent,
        profile.spending_percent,
        profile.investing_percent,
        previous_period_spent,
    );
    Ok(PaycheckAllocation {
        paycheck_amount,
        previous_period_spent,
        to_saving: split.to_saving,
        to_spending: split.to_spending,
        to_investing: split.to_investing,
    })
}

/// Balances plus holdings at cost, totalled per currency.
pub fn account_summary(conn: &Connection, user_id: &str) -> AppResult<AccountSummary> {
    let profile = db::get_or_create_profile(conn, user_id)?;
    let holdings = db::list_holdings(conn, user_id)?;

    let cost_in = |currency: Currency| -> f64 {
        holdings
            .iter()
            .filter(|h| h.currency == currency)
            .map(StockHolding::cost_value)
            .sum()
    };
    let holdings_cost_aud = cost_in(Currency::Aud);
    let holdings_cost_usd = cost_in(Currency::Usd);

    Ok(AccountSummary {
        savings_balance: profile.savings_balance,
        spending_balance: profile.spending_balance,
        investing_cash_balance: profile.investing_cash_balance,
        investing_cash_balance_usd: profile.investing_cash_balance_usd,
        holdings_cost_aud,
        holdings_cost_usd,
        total_aud: profile.savings_balance
            + profile.spending_balance
            + profile.investing_cash_balance
            + holdings_cost_aud,
        total_usd: profile.investing_cash_balance_usd + holdings_cost_usd,
        projected_fortnightly_interest: profile.savings_balance * profile.savings_interest_rate_pa
            / 100.0
            / FORTNIGHTS_PER_YEAR,
    })
}

/// Trims and upper-cases the ticker and checks the numeric fields.
pub fn validate_holding(mut holding: NewHolding) -> AppResult<NewHolding> {
    holding.ticker = holding.ticker.trim().to_ascii_uppercase();
    holding.exchange = holding.exchange.trim().to_ascii_uppercase();
    if holding.ticker.is_empty() {
        return Err(AppError::Validation("ticker is required".into()));
    }
    if holding.exchange.is_empty() {
        return Err(AppError::Validation("exchange is required".into()));
    }
    if !(holding.shares.is_finite() && holding.shares > 0.0) {
        return Err(AppError::Validation("shares must be greater than 0".into()));
    }
    if !(holding.average_price.is_finite() && holding.average_price > 0.0) {
        return Err(AppError::Validation("averagePrice must be greater than 0".into()));
    }
    Ok(holding)
}

pub fn create_holding(
    conn: &Connection,
    user_id: &str,
    holding: NewHolding,
    now: DateTime<Utc>,
) -> AppResult<StockHolding> {
    let holding = validate_holding(holding)?;
    let created = db::add_holding(conn, user_id, &holding, now)?;
    tracing::info!(user_id, id = created.id, ticker = %created.ticker, "added holding");
    Ok(created)
}

pub fn update_holding(conn: &Connection, user_id: &str, id: i64, holding: NewHolding) -> AppResult<StockHolding> {
    let holding = validate_holding(holding)?;
    db::update_holding(conn, user_id, id, &holding)?
        .ok_or_else(|| AppError::NotFound(format!("holding {id} not found")))
}

pub fn delete_holding(conn: &Connection, user_id: &str, id: i64) -> AppResult<()> {
    if db::remove_holding(conn, user_id, id)? {
        tracing::info!(user_id, id, "removed holding");
        Ok(())
    } else {
        Err(AppError::NotFound(format!("holding {id} not found")))
    }
}
