use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tabled::{Table, Tabled};

use fortnight_finance::allocation::{allocate, validate_split};
use fortnight_finance::config::StoreConfig;
use fortnight_finance::period::PeriodSelector;
use fortnight_finance::tax::{annual_income_tax, fortnightly_net_pay, medicare_levy};
use fortnight_finance::{LogTarget, db, finance, init_tracing};

/// Fortnight finance tracker — spending periods, pay estimates and paycheck splits
#[derive(Parser)]
#[command(name = "finance-tracker", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the fortnight containing a moment (default: now)
    Period {
        /// RFC 3339 timestamp, e.g. 2026-02-20T09:00:00Z
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Annual income tax and Medicare levy for a taxable income
    Tax {
        #[arg(long, allow_hyphen_values = true)]
        income: f64,
        /// Skip the low-income Medicare reduction
        #[arg(long)]
        no_reduction: bool,
    },

    /// Estimate take-home pay for one fortnight of work
    Pay {
        #[arg(long)]
        hours: f64,
        /// Hourly wage in dollars
        #[arg(long)]
        wage: f64,
        /// Skip the low-income Medicare reduction
        #[arg(long)]
        no_reduction: bool,
    },

    /// Split a paycheck across savings, spending and investing
    Allocate {
        #[arg(long)]
        paycheck: f64,
        #[arg(long, default_value_t = 70.0)]
        saving: f64,
        #[arg(long, default_value_t = 10.0)]
        spending: f64,
        #[arg(long, default_value_t = 20.0)]
        investing: f64,
        /// Amount spent in the previous fortnight
        #[arg(long, default_value_t = 0.0)]
        carry_over: f64,
        /// Require the percentages to add up to 100
        #[arg(long)]
        strict: bool,
    },

    /// Set the amount spent this (or last) fortnight
    RecordSpending {
        #[arg(long)]
        user: String,
        #[arg(long, allow_hyphen_values = true)]
        amount: f64,
        /// Record against the previous fortnight instead
        #[arg(long)]
        previous: bool,
    },

    /// Show spending for the current and previous fortnight
    Fortnight {
        #[arg(long)]
        user: String,
    },

    /// Show a user's finance profile
    Profile {
        #[arg(long)]
        user: String,
    },

    /// List a user's stock holdings
    Holdings {
        #[arg(long)]
        user: String,
    },

    /// Balances and holdings totalled per currency
    Summary {
        #[arg(long)]
        user: String,
    },
}

#[derive(Tabled)]
struct PeriodRow {
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    previous_period_start: DateTime<Utc>,
}

#[derive(Tabled)]
struct TaxRow {
    taxable_income: f64,
    income_tax: f64,
    medicare_levy: f64,
    total: f64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = StoreConfig::from_env()?;
    init_tracing(&config.log_format, LogTarget::Stderr);
    let calendar = config.calendar;
    let now = Utc::now();

    match cli.command {
        Commands::Period { at } => {
            let at = at.unwrap_or(now);
            let row = PeriodRow {
                period_start: calendar.current_period_start(at),
                period_end: calendar.period_end(at),
                previous_period_start: calendar.previous_period_start(at),
            };
            println!("{}", Table::new([row]));
        }

        Commands::Tax { income, no_reduction } => {
            let income_tax = annual_income_tax(income);
            let levy = medicare_levy(income, !no_reduction);
            let row = TaxRow {
                taxable_income: income,
                income_tax,
                medicare_levy: levy,
                total: income_tax + levy,
            };
            println!("{}", Table::new([row]));
        }

        Commands::Pay { hours, wage, no_reduction } => {
            let estimate = fortnightly_net_pay(hours, wage, !no_reduction);
            println!("{}", Table::new([estimate]));
        }

        Commands::Allocate {
            paycheck,
            saving,
            spending,
            investing,
            carry_over,
            strict,
        } => {
            if strict {
                validate_split(saving, spending, investing)?;
            }
            let split = allocate(paycheck, saving, spending, investing, carry_over);
            println!("{}", Table::new([split]));
        }

        Commands::RecordSpending { user, amount, previous } => {
            let conn = db::init_db(&config.db_path)?;
            let period = if previous {
                PeriodSelector::Previous
            } else {
                PeriodSelector::Current
            };
            let record = finance::record_spending(&conn, &calendar, &user, amount, period, now)?;
            println!("{}", Table::new([record]));
        }

        Commands::Fortnight { user } => {
            let conn = db::init_db(&config.db_path)?;
            let overview = finance::fortnight_overview(&conn, &calendar, &user, now)?;
            println!("{}", Table::new([overview]));
        }

        Commands::Profile { user } => {
            let conn = db::init_db(&config.db_path)?;
            let profile = db::get_or_create_profile(&conn, &user)?;
            println!("{}", Table::new([profile]));
        }

        Commands::Holdings { user } => {
            let conn = db::init_db(&config.db_path)?;
            let holdings = db::list_holdings(&conn, &user)?;
            if holdings.is_empty() {
                println!("No holdings found for '{}'", user);
            } else {
                println!("{}", Table::new(&holdings));
            }
        }

        Commands::Summary { user } => {
            let conn = db::init_db(&config.db_path)?;
            let summary = finance::account_summary(&conn, &user)?;
            println!("{}", Table::new([summary]));
        }
    }

    Ok(())
}
