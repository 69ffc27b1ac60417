use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, OptionalExtension, Result, Row, params, params_from_iter};

use crate::models::{
    Currency, DEFAULT_INVESTING_PERCENT, DEFAULT_SAVING_PERCENT, DEFAULT_SPENDING_PERCENT,
    FinanceProfile, FortnightSpendingRecord, NewHolding, ProfileField, StockHolding,
};
use crate::period::midnight;

/// Creates tables on the given connection.
pub fn init_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS finance_profiles (
            user_id                     TEXT PRIMARY KEY,
            savings_balance             REAL NOT NULL DEFAULT 0.0,
            spending_balance            REAL NOT NULL DEFAULT 0.0,
            investing_cash_balance      REAL NOT NULL DEFAULT 0.0,
            investing_cash_balance_usd  REAL NOT NULL DEFAULT 0.0,
            savings_interest_rate_pa    REAL NOT NULL DEFAULT 0.0,
            saving_percent              REAL NOT NULL DEFAULT {DEFAULT_SAVING_PERCENT:.1},
            spending_percent            REAL NOT NULL DEFAULT {DEFAULT_SPENDING_PERCENT:.1},
            investing_percent           REAL NOT NULL DEFAULT {DEFAULT_INVESTING_PERCENT:.1}
        );
        CREATE TABLE IF NOT EXISTS fortnight_spending (
            user_id       TEXT NOT NULL,
            period_start  TEXT NOT NULL,
            amount_spent  REAL NOT NULL,
            updated_at    TEXT NOT NULL,
            UNIQUE (user_id, period_start)
        );
        CREATE TABLE IF NOT EXISTS stock_holdings (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id        TEXT NOT NULL,
            ticker         TEXT NOT NULL,
            exchange       TEXT NOT NULL,
            shares         REAL NOT NULL CHECK (shares > 0),
            average_price  REAL NOT NULL CHECK (average_price > 0),
            currency       TEXT NOT NULL CHECK (currency IN ('AUD', 'USD')),
            created_at     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_stock_holdings_user ON stock_holdings (user_id);"
    ))?;
    Ok(())
}

/// Opens (or creates) the SQLite database file and ensures tables exist.
pub fn init_db(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init_tables(&conn)?;
    Ok(conn)
}

impl ToSql for Currency {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for Currency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_str()?;
        Currency::from_code(code).ok_or_else(|| FromSqlError::Other(format!("unknown currency {code}").into()))
    }
}

const PROFILE_COLUMNS: &str = "user_id, savings_balance, spending_balance, investing_cash_balance,
    investing_cash_balance_usd, savings_interest_rate_pa, saving_percent, spending_percent,
    investing_percent";

fn profile_from_row(row: &Row<'_>) -> Result<FinanceProfile> {
    Ok(FinanceProfile {
        user_id: row.get(0)?,
        savings_balance: row.get(1)?,
        spending_balance: row.get(2)?,
        investing_cash_balance: row.get(3)?,
        investing_cash_balance_usd: row.get(4)?,
        savings_interest_rate_pa: row.get(5)?,
        saving_percent: row.get(6)?,
        spending_percent: row.get(7)?,
        investing_percent: row.get(8)?,
    })
}

/// Returns the user's profile, inserting one with column defaults if absent.
pub fn get_or_create_profile(conn: &Connection, user_id: &str) -> Result<FinanceProfile> {
    let created = conn.execute(
        "INSERT INTO finance_profiles (user_id) VALUES (?1) ON CONFLICT (user_id) DO NOTHING",
        params![user_id],
    )?;
    if created > 0 {
        tracing::info!(user_id, "created finance profile");
    }
    conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM finance_profiles WHERE user_id = ?1"),
        params![user_id],
        profile_from_row,
    )
}

/// Writes the given fields and returns the resulting profile. Creates the
/// profile first if needed; both steps run in one transaction.
pub fn update_profile(conn: &Connection, user_id: &str, changes: &[(ProfileField, f64)]) -> Result<FinanceProfile> {
    let tx = conn.unchecked_transaction()?;
    get_or_create_profile(&tx, user_id)?;

    if !changes.is_empty() {
        let assignments = changes
            .iter()
            .enumerate()
            .map(|(i, (field, _))| format!("{} = ?{}", field.column(), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE finance_profiles SET {assignments} WHERE user_id = ?{}",
            changes.len() + 1
        );
        let values = changes
            .iter()
            .map(|(_, v)| Value::Real(*v))
            .chain(std::iter::once(Value::Text(user_id.to_string())));
        tx.execute(&sql, params_from_iter(values))?;
    }

    let profile = get_or_create_profile(&tx, user_id)?;
    tx.commit()?;
    Ok(profile)
}

fn spending_from_row(row: &Row<'_>) -> Result<FortnightSpendingRecord> {
    let period_start: NaiveDate = row.get(1)?;
    Ok(FortnightSpendingRecord {
        user_id: row.get(0)?,
        period_start: midnight(period_start),
        amount_spent: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

/// Inserts or overwrites the spending total for one period in a single
/// statement, relying on the `(user_id, period_start)` unique constraint.
pub fn upsert_spending(
    conn: &Connection,
    user_id: &str,
    period_start: NaiveDate,
    amount_spent: f64,
    updated_at: DateTime<Utc>,
) -> Result<FortnightSpendingRecord> {
    conn.query_row(
        "INSERT INTO fortnight_spending (user_id, period_start, amount_spent, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (user_id, period_start)
         DO UPDATE SET amount_spent = excluded.amount_spent, updated_at = excluded.updated_at
         RETURNING user_id, period_start, amount_spent, updated_at",
        params![user_id, period_start, amount_spent, updated_at],
        spending_from_row,
    )
}

pub fn spending_for_period(
    conn: &Connection,
    user_id: &str,
    period_start: NaiveDate,
) -> Result<Option<FortnightSpendingRecord>> {
    conn.query_row(
        "SELECT user_id, period_start, amount_spent, updated_at
         FROM fortnight_spending
         WHERE user_id = ?1 AND period_start = ?2",
        params![user_id, period_start],
        spending_from_row,
    )
    .optional()
}

const HOLDING_COLUMNS: &str = "id, user_id, ticker, exchange, shares, average_price, currency, created_at";

fn holding_from_row(row: &Row<'_>) -> Result<StockHolding> {
    Ok(StockHolding {
        id: row.get(0)?,
        user_id: row.get(1)?,
        ticker: row.get(2)?,
        exchange: row.get(3)?,
        shares: row.get(4)?,
        average_price: row.get(5)?,
        currency: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn list_holdings(conn: &Connection, user_id: &str) -> Result<Vec<StockHolding>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {HOLDING_COLUMNS} FROM stock_holdings WHERE user_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt.query_map(params![user_id], holding_from_row)?;

    let mut holdings = Vec::new();
    for holding in rows {
        holdings.push(holding?);
    }
    Ok(holdings)
}

pub fn add_holding(
    conn: &Connection,
    user_id: &str,
    holding: &NewHolding,
    created_at: DateTime<Utc>,
) -> Result<StockHolding> {
    conn.query_row(
        &format!(
            "INSERT INTO stock_holdings (user_id, ticker, exchange, shares, average_price, currency, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             RETURNING {HOLDING_COLUMNS}"
        ),
        params![
            user_id,
            holding.ticker,
            holding.exchange,
            holding.shares,
            holding.average_price,
            holding.currency,
            created_at
        ],
        holding_from_row,
    )
}

/// Replaces a holding's fields. Returns `None` if the user has no holding
/// with that id.
pub fn update_holding(
    conn: &Connection,
    user_id: &str,
    id: i64,
    holding: &NewHolding,
) -> Result<Option<StockHolding>> {
    conn.query_row(
        &format!(
            "UPDATE stock_holdings
             SET ticker = ?1, exchange = ?2, shares = ?3, average_price = ?4, currency = ?5
             WHERE id = ?6 AND user_id = ?7
             RETURNING {HOLDING_COLUMNS}"
        ),
        params![
            holding.ticker,
            holding.exchange,
            holding.shares,
            holding.average_price,
            holding.currency,
            id,
            user_id
        ],
        holding_from_row,
    )
    .optional()
}

pub fn remove_holding(conn: &Connection, user_id: &str, id: i64) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM stock_holdings WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(changed > 0)
}
