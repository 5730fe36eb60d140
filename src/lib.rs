//! cbreport - Aggregate cloud billing data into daily and monthly cost reports
//!
//! This library provides functionality to:
//! - Parse billing CSV exports into per-resource cost records
//! - Roll resource collections up along arbitrary dimension orders
//! - Reconcile tagging-compliance audits against managed accounts
//! - Generate reports in table and JSON formats
//!
//! # Examples
//!
//! ```no_run
//! use cbreport::{
//!     aggregation::ResourceAggregator,
//!     config::Config,
//!     data_loader::DataLoader,
//!     report::ReportBuilder,
//! };
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> cbreport::Result<()> {
//!     let config = Config::load("config.json")?;
//!     let report_date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//!
//!     let loader = DataLoader::new("data/billingReport.csv.gz");
//!     let rows = loader.load_billing_rows();
//!
//!     let mut aggregator = ResourceAggregator::new(report_date);
//!     let resources = aggregator.collect_resources(rows).await?;
//!
//!     let builder = ReportBuilder::new(&config, report_date);
//!     let bulk = builder.build_bulk(&resources)?;
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod cli;
pub mod compliance;
pub mod config;
pub mod data_loader;
pub mod error;
pub mod output;
pub mod owners;
pub mod report;
pub mod resource;
pub mod types;

// Re-export commonly used types
pub use error::{ReportError, Result};
pub use types::{BillingRow, CostAccumulator, CostPacket, Dimension, ResourceKey};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
