use std::net::SocketAddr;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};

use crate::period::FortnightCalendar;

/// Settings shared by the CLI and the server.
pub struct StoreConfig {
    pub db_path: String,
    pub calendar: FortnightCalendar,
    pub log_format: String,
}

impl StoreConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let calendar = match std::env::var("FINANCE_PERIOD_ANCHOR") {
            Ok(raw) => FortnightCalendar::from_date(parse_anchor(&raw)?),
            Err(_) => FortnightCalendar::default(),
        };
        Ok(Self {
            db_path: env_or("FINANCE_DB_PATH", "finance_tracker.db"),
            calendar,
            log_format: env_or("FINANCE_LOG_FORMAT", "text"),
        })
    }
}

/// Server settings; the listen address and HTTP options are only read here.
pub struct Config {
    pub store: StoreConfig,
    pub listen_addr: SocketAddr,
    /// Header carrying the authenticated user id, set by the fronting auth layer
    pub user_header: String,
    pub cors_allow: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = StoreConfig::from_env()?;
        let listen_addr: SocketAddr = env_or("FINANCE_LISTEN_ADDR", "127.0.0.1:3000")
            .parse()
            .context("Invalid FINANCE_LISTEN_ADDR")?;
        let user_header = env_or("FINANCE_USER_HEADER", "x-user-id").to_ascii_lowercase();
        let cors_allow = env_or("FINANCE_CORS_ALLOW_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            store,
            listen_addr,
            user_header,
            cors_allow,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Accepts either a plain date (`2026-02-15`) or an RFC 3339 timestamp,
/// which is reduced to its UTC date.
pub fn parse_anchor(raw: &str) -> anyhow::Result<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .with_context(|| format!("Invalid FINANCE_PERIOD_ANCHOR: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_anchor() {
        let expected = NaiveDate::from_ymd_opt(2026, 2, 15).unwrap();
        assert_eq!(parse_anchor("2026-02-15").unwrap(), expected);
        assert_eq!(parse_anchor(" 2026-02-15T00:00:00Z ").unwrap(), expected);
        // 2026-02-16 10:00 in Sydney is still the 15th in UTC.
        assert_eq!(parse_anchor("2026-02-16T10:00:00+11:00").unwrap(), expected);
        assert!(parse_anchor("fortnight").is_err());
    }
}
