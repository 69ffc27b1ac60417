use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// Length of one tracking period in days.
pub const PERIOD_DAYS: i64 = 14;

/// Which fortnight a request refers to, relative to "now".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PeriodSelector {
    #[default]
    Current,
    Previous,
}

impl FromStr for PeriodSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(PeriodSelector::Current),
            "previous" => Ok(PeriodSelector::Previous),
            other => Err(format!("period must be \"current\" or \"previous\", got \"{other}\"")),
        }
    }
}

/// Buckets instants into fixed 14-day periods anchored on a calendar date.
///
/// All arithmetic is done on UTC calendar dates. Instants are truncated to
/// UTC midnight before counting whole days from the anchor, and the block
/// count is floor-divided so dates before the anchor land in negative blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FortnightCalendar {
    anchor: NaiveDate,
}

impl Default for FortnightCalendar {
    fn default() -> Self {
        Self::from_date(NaiveDate::from_ymd_opt(2026, 2, 15).expect("valid anchor date"))
    }
}

impl FortnightCalendar {
    /// Anchors the calendar on the UTC day containing `anchor`.
    pub fn new(anchor: DateTime<Utc>) -> Self {
        Self::from_date(anchor.date_naive())
    }

    pub fn from_date(anchor: NaiveDate) -> Self {
        Self { anchor }
    }

    pub fn anchor(&self) -> DateTime<Utc> {
        midnight(self.anchor)
    }

    /// Start of the fortnight containing `at`.
    pub fn period_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        midnight(self.period_start_date(at))
    }

    /// Calendar date of the fortnight containing `at`.
    pub fn period_start_date(&self, at: DateTime<Utc>) -> NaiveDate {
        let days = (at.date_naive() - self.anchor).num_days();
        let blocks = days.div_euclid(PERIOD_DAYS);
        self.anchor + Duration::days(blocks * PERIOD_DAYS)
    }

    pub fn current_period_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.period_start(now)
    }

    pub fn previous_period_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.current_period_start(now) - Duration::days(PERIOD_DAYS)
    }

    /// Last millisecond of the current fortnight (day 13, 23:59:59.999).
    pub fn period_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.current_period_start(now) + Duration::days(PERIOD_DAYS) - Duration::milliseconds(1)
    }

    pub fn resolve(&self, selector: PeriodSelector, now: DateTime<Utc>) -> DateTime<Utc> {
        match selector {
            PeriodSelector::Current => self.current_period_start(now),
            PeriodSelector::Previous => self.previous_period_start(now),
        }
    }
}

pub(crate) fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}
