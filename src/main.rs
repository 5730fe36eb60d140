//! cbreport - Aggregate cloud billing data into daily and monthly cost reports

use cbreport::{
    aggregation::ResourceAggregator,
    cli::{Cli, Command, resolve_report_date},
    compliance::{AuditRow, ComplianceRecord},
    config::Config,
    data_loader::DataLoader,
    error::Result,
    output::get_formatter,
    report::ReportBuilder,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging. The --quiet flag should override RUST_LOG.
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("warn")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cbreport=info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(&cli.config)?;
    let formatter = get_formatter(cli.json, config.warning_threshold);
    let show_progress = !cli.json && is_terminal::is_terminal(std::io::stdout());

    match cli.command {
        Command::Bulk { report, date } => {
            let report_date = resolve_report_date(date.as_deref())?;
            info!(%report_date, "running bulk cost report");

            let loader = DataLoader::new(report);
            let rows = loader.load_billing_rows();
            let mut aggregator =
                ResourceAggregator::new(report_date).with_progress(show_progress);
            let resources = aggregator.collect_resources(rows).await?;

            let builder = ReportBuilder::new(&config, report_date);
            let bulk = builder.build_bulk(&resources)?;
            println!("{}", formatter.format_bulk(&bulk));
        }

        Command::Owners {
            report,
            date,
            out_dir,
        } => {
            let report_date = resolve_report_date(date.as_deref())?;
            info!(%report_date, "running personalized cost reports");

            let loader = DataLoader::new(report);
            let rows = loader.load_billing_rows();
            let mut aggregator =
                ResourceAggregator::new(report_date).with_progress(show_progress);
            let resources = aggregator.collect_resources(rows).await?;

            let builder = ReportBuilder::new(&config, report_date);
            let reports = builder.build_owner_reports(&resources)?;

            match out_dir {
                Some(dir) => {
                    tokio::fs::create_dir_all(&dir).await?;
                    for owner_report in &reports {
                        // One file per owner, named by the address local part
                        let local_part = owner_report
                            .owner
                            .split('@')
                            .next()
                            .unwrap_or(&owner_report.owner);
                        let extension = if cli.json { "json" } else { "txt" };
                        let path = dir.join(format!("{local_part}.{extension}"));
                        tokio::fs::write(&path, formatter.format_owner(owner_report)).await?;
                    }
                    info!(count = reports.len(), dir = %dir.display(), "wrote owner reports");
                }
                None => {
                    for owner_report in &reports {
                        println!("{}", formatter.format_owner(owner_report));
                    }
                }
            }
        }

        Command::Compliance { audit } => {
            info!(audit = %audit.display(), "running compliance report");

            let raw = tokio::fs::read_to_string(&audit).await?;
            let rows: Vec<AuditRow> = serde_json::from_str(&raw)?;
            let records: Vec<ComplianceRecord> =
                rows.into_iter().map(ComplianceRecord::from_row).collect();

            let builder = ReportBuilder::new(&config, resolve_report_date(None)?);
            let compliance = builder.build_compliance(records);
            println!("{}", formatter.format_compliance(&compliance));
        }
    }

    Ok(())
}
