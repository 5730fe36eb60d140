//! CLI interface for cbreport
//!
//! Defines the command-line interface using clap. Each subcommand reads
//! already-fetched input (a billing CSV export or an audit JSON file),
//! runs the aggregation, and prints the formatted report to stdout.
//!
//! # Example
//!
//! ```bash
//! # Bulk cost report for yesterday
//! cbreport bulk --report data/billingReport.csv.gz
//!
//! # Personalized reports for a specific day, written to a directory
//! cbreport owners --report data/billingReport.csv.gz \
//!     --date 2024-03-01 --out-dir /tmp/personalizedReports
//!
//! # Compliance summary as JSON
//! cbreport compliance --audit audit.json --json
//! ```

use crate::error::{ReportError, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Aggregate cloud billing data into daily and monthly cost reports
#[derive(Parser, Debug, Clone)]
#[command(name = "cbreport")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to the configuration file
    #[arg(long, global = true, default_value = "config.json")]
    pub config: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available report commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate the bulk cost report
    Bulk {
        /// Path to the billing CSV export (.csv or .csv.gz)
        #[arg(long)]
        report: PathBuf,

        /// Day to report on (YYYY-MM-DD), defaults to yesterday
        #[arg(long)]
        date: Option<String>,
    },

    /// Generate one personalized cost report per owner
    Owners {
        /// Path to the billing CSV export (.csv or .csv.gz)
        #[arg(long)]
        report: PathBuf,

        /// Day to report on (YYYY-MM-DD), defaults to yesterday
        #[arg(long)]
        date: Option<String>,

        /// Write one file per owner into this directory instead of stdout
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Summarize a tagging-compliance audit
    Compliance {
        /// Path to the audit JSON file (array of audit rows)
        #[arg(long)]
        audit: PathBuf,
    },
}

/// Parse a report date in YYYY-MM-DD form
pub fn parse_report_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ReportError::InvalidDate(value.to_string()))
}

/// The default report day: yesterday
pub fn default_report_date() -> NaiveDate {
    chrono::Utc::now().date_naive() - chrono::Days::new(1)
}

/// Resolve the report date argument, falling back to yesterday
pub fn resolve_report_date(value: Option<&str>) -> Result<NaiveDate> {
    match value {
        Some(raw) => parse_report_date(raw),
        None => Ok(default_report_date()),
    }
}
