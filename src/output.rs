//! Output formatting module for cbreport
//!
//! Formatters for the assembled reports:
//! - Table format for human-readable terminal output
//! - JSON format for machine-readable output and downstream renderers
//!
//! Amounts are whole dollars; daily amounts above the configured warning
//! threshold are flagged so a spend spike stands out in the table view.

use crate::aggregation::AggregateNode;
use crate::compliance::ComplianceRecord;
use crate::report::{BulkReport, ComplianceReport, OwnerReport};
use prettytable::{Table, format, row};
use serde_json::json;

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format the bulk cost report
    fn format_bulk(&self, report: &BulkReport) -> String;

    /// Format one personalized owner report
    fn format_owner(&self, report: &OwnerReport) -> String;

    /// Format the tagging-compliance report
    fn format_compliance(&self, report: &ComplianceReport) -> String;
}

/// Table formatter for human-readable output
pub struct TableFormatter {
    warning_threshold: i64,
}

impl TableFormatter {
    /// Create a new TableFormatter
    pub fn new(warning_threshold: i64) -> Self {
        Self { warning_threshold }
    }

    /// Format a whole-dollar amount with thousands separators
    fn format_amount(amount: i64) -> String {
        let s = amount.to_string();
        let mut result = String::new();
        for (count, ch) in s.chars().rev().enumerate() {
            if count > 0 && count % 3 == 0 {
                result.push(',');
            }
            result.push(ch);
        }
        let digits: String = result.chars().rev().collect();
        format!("${digits}")
    }

    /// Daily amounts above the warning threshold get flagged
    fn format_daily_amount(&self, amount: i64) -> String {
        let formatted = Self::format_amount(amount);
        if amount > self.warning_threshold {
            format!("{formatted} (!)")
        } else {
            formatted
        }
    }

    /// Render a one-level tree as a (key, daily, monthly) table
    fn one_level_table(&self, title: &str, key_header: &str, node: &AggregateNode) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![b -> key_header, b -> "Daily", b -> "Monthly"]);

        for (key, child) in node.entries() {
            if let Some(packet) = child.as_leaf() {
                table.add_row(row![
                    key,
                    r -> self.format_daily_amount(packet.daily_cost),
                    r -> Self::format_amount(packet.monthly_cost)
                ]);
            }
        }

        format!("{title}\n{table}")
    }

    /// Render a two-level tree as a (key, sub-key, daily, monthly) table
    fn two_level_table(
        &self,
        title: &str,
        key_header: &str,
        sub_header: &str,
        node: &AggregateNode,
    ) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![
            b -> key_header,
            b -> sub_header,
            b -> "Daily",
            b -> "Monthly"
        ]);

        for (key, subtree) in node.entries() {
            let mut first = true;
            for (sub_key, child) in subtree.entries() {
                if let Some(packet) = child.as_leaf() {
                    table.add_row(row![
                        if first { key.as_str() } else { "" },
                        sub_key,
                        r -> self.format_daily_amount(packet.daily_cost),
                        r -> Self::format_amount(packet.monthly_cost)
                    ]);
                    first = false;
                }
            }
        }

        format!("{title}\n{table}")
    }
}

impl OutputFormatter for TableFormatter {
    fn format_bulk(&self, report: &BulkReport) -> String {
        let date = report.report_date.format("%Y/%m/%d");
        let mut sections = vec![format!("Cost report for {date}")];
        sections.push(self.one_level_table(
            "Managed accounts",
            "Account",
            &report.managed_account_sum,
        ));
        sections.push(self.one_level_table(
            "Unmanaged accounts",
            "Account",
            &report.unmanaged_account_sum,
        ));
        sections.push(self.two_level_table(
            "Cost by account and service",
            "Account",
            "Service",
            &report.account_service_sum,
        ));
        sections.push(self.one_level_table("Cost by service", "Service", &report.service_sum));
        sections.push(self.two_level_table(
            "Cost by owner",
            "Owner",
            "Service",
            &report.owner_service_sum,
        ));
        sections.push(self.two_level_table(
            "Expensive resources",
            "Resource",
            "Usage type",
            &report.resource_usage_sum,
        ));
        sections.push(self.two_level_table(
            "Top services by usage type",
            "Service",
            "Usage type",
            &report.service_usage_sum,
        ));
        sections.join("\n")
    }

    fn format_owner(&self, report: &OwnerReport) -> String {
        let date = report.report_date.format("%Y/%m/%d");
        let title = format!("Cost report for {} ({date})", report.owner);
        let mut sections = vec![title];
        for (account, resources) in report.summary.entries() {
            sections.push(self.one_level_table(
                &format!("Account {account}"),
                "Resource",
                resources,
            ));
        }
        sections.join("\n")
    }

    fn format_compliance(&self, report: &ComplianceReport) -> String {
        let mut sections = vec![format!(
            "Tagging compliance: {} compliant, {} non-compliant",
            report.compliant.len(),
            report.non_compliant.len()
        )];

        let mut findings = Table::new();
        findings.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        findings.set_titles(row![b -> "Account", b -> "Findings"]);
        for (account, records) in &report.findings_by_account {
            findings.add_row(row![account, r -> records.len()]);
        }
        sections.push(format!("Findings per managed account\n{findings}"));

        let mut details = Table::new();
        details.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        details.set_titles(row![
            b -> "Account",
            b -> "Region",
            b -> "Type",
            b -> "Resource"
        ]);
        for records in report.findings_by_account.values() {
            for record in records {
                details.add_row(row![
                    record.account_name,
                    record.region,
                    record.resource_type,
                    record.resource_id
                ]);
            }
        }
        sections.push(format!("Non-compliant resources\n{details}"));

        let mut owners = Table::new();
        owners.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        owners.set_titles(row![b -> "Owner", b -> "Resources"]);
        for (owner, records) in &report.owner_resources {
            owners.add_row(row![owner, r -> records.len()]);
        }
        sections.push(format!("Personalized delivery\n{owners}"));

        sections.join("\n")
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_bulk(&self, report: &BulkReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_owner(&self, report: &OwnerReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_compliance(&self, report: &ComplianceReport) -> String {
        let value = json!({
            "compliant": report.compliant,
            "non_compliant": report.non_compliant,
            "owner_resources": report.owner_resources,
            "findings_by_account": report.findings_by_account,
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Get the appropriate formatter based on output format preference
pub fn get_formatter(json: bool, warning_threshold: i64) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter::new(warning_threshold))
    }
}
