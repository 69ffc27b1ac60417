use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Split applied to a freshly created profile.
pub const DEFAULT_SAVING_PERCENT: f64 = 70.0;
pub const DEFAULT_SPENDING_PERCENT: f64 = 10.0;
pub const DEFAULT_INVESTING_PERCENT: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct FinanceProfile {
    pub user_id: String,
    pub savings_balance: f64,
    pub spending_balance: f64,
    pub investing_cash_balance: f64,
    /// USD cash held in the investing account, kept apart from AUD balances
    pub investing_cash_balance_usd: f64,
    /// Savings interest, percent per annum
    #[serde(rename = "savingsInterestRatePA")]
    pub savings_interest_rate_pa: f64,
    pub saving_percent: f64,
    pub spending_percent: f64,
    pub investing_percent: f64,
}

/// Profile fields a client may update, with their storage column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    SavingsBalance,
    SpendingBalance,
    InvestingCashBalance,
    InvestingCashBalanceUsd,
    SavingsInterestRatePa,
    SavingPercent,
    SpendingPercent,
    InvestingPercent,
}

impl ProfileField {
    pub const ALL: [ProfileField; 8] = [
        ProfileField::SavingsBalance,
        ProfileField::SpendingBalance,
        ProfileField::InvestingCashBalance,
        ProfileField::InvestingCashBalanceUsd,
        ProfileField::SavingsInterestRatePa,
        ProfileField::SavingPercent,
        ProfileField::SpendingPercent,
        ProfileField::InvestingPercent,
    ];

    /// JSON key used by the API.
    pub fn key(self) -> &'static str {
        match self {
            ProfileField::SavingsBalance => "savingsBalance",
            ProfileField::SpendingBalance => "spendingBalance",
            ProfileField::InvestingCashBalance => "investingCashBalance",
            ProfileField::InvestingCashBalanceUsd => "investingCashBalanceUsd",
            ProfileField::SavingsInterestRatePa => "savingsInterestRatePA",
            ProfileField::SavingPercent => "savingPercent",
            ProfileField::SpendingPercent => "spendingPercent",
            ProfileField::InvestingPercent => "investingPercent",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            ProfileField::SavingsBalance => "savings_balance",
            ProfileField::SpendingBalance => "spending_balance",
            ProfileField::InvestingCashBalance => "investing_cash_balance",
            ProfileField::InvestingCashBalanceUsd => "investing_cash_balance_usd",
            ProfileField::SavingsInterestRatePa => "savings_interest_rate_pa",
            ProfileField::SavingPercent => "saving_percent",
            ProfileField::SpendingPercent => "spending_percent",
            ProfileField::InvestingPercent => "investing_percent",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    pub fn is_percent(self) -> bool {
        matches!(
            self,
            ProfileField::SavingPercent | ProfileField::SpendingPercent | ProfileField::InvestingPercent
        )
    }

    /// Accepts finite, non-negative values; percentages are also capped at 100.
    pub fn accepts(self, value: f64) -> bool {
        value.is_finite() && value >= 0.0 && (!self.is_percent() || value <= 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub profile: FinanceProfile,
    /// Keys that were written
    pub applied: Vec<String>,
    /// Keys that were dropped because they were unknown or out of range
    pub ignored: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct FortnightSpendingRecord {
    pub user_id: String,
    pub period_start: DateTime<Utc>,
    pub amount_spent: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct FortnightOverview {
    pub current_period_start: DateTime<Utc>,
    pub previous_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub current_amount: f64,
    pub previous_amount: f64,
}

/// Body of `POST /finance/fortnight`. The amount is kept raw so a missing or
/// non-numeric value becomes a validation error rather than a parse failure.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordSpendingRequest {
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default)]
    pub period: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocateRequest {
    pub paycheck_amount: f64,
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct PaycheckAllocation {
    pub paycheck_amount: f64,
    pub previous_period_spent: f64,
    pub to_saving: f64,
    pub to_spending: f64,
    pub to_investing: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Aud,
    Usd,
}

impl Currency {
    pub fn code(self) -> &'static str {
        match self {
            Currency::Aud => "AUD",
            Currency::Usd => "USD",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "AUD" => Some(Currency::Aud),
            "USD" => Some(Currency::Usd),
            _ => None,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct StockHolding {
    pub id: i64,
    #[tabled(skip)]
    pub user_id: String,
    pub ticker: String,
    pub exchange: String,
    pub shares: f64,
    pub average_price: f64,
    pub currency: Currency,
    #[tabled(skip)]
    pub created_at: DateTime<Utc>,
}

impl StockHolding {
    /// Value at cost basis; live quotes are not available here.
    pub fn cost_value(&self) -> f64 {
        self.shares * self.average_price
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHolding {
    pub ticker: String,
    pub exchange: String,
    pub shares: f64,
    pub average_price: f64,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub savings_balance: f64,
    pub spending_balance: f64,
    pub investing_cash_balance: f64,
    pub investing_cash_balance_usd: f64,
    pub holdings_cost_aud: f64,
    pub holdings_cost_usd: f64,
    pub total_aud: f64,
    pub total_usd: f64,
    pub projected_fortnightly_interest: f64,
}
