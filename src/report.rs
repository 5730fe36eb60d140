//! Report assembly
//!
//! Composes the aggregation passes that make up the shipped reports: the
//! bulk cost summary, the personalized per-owner summaries, and the
//! tagging-compliance summary. Each pass is a [`rollup`] over a fixed
//! dimension order with the thresholds the reports have always used.

use crate::aggregation::{AggregateNode, RollupOptions, TOTAL_KEY, rollup};
use crate::compliance::{ComplianceRecord, ComplianceReconciler};
use crate::config::Config;
use crate::error::Result;
use crate::owners::{self, OwnerResolution};
use crate::resource::BilledResource;
use crate::types::Dimension;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// The assembled bulk cost report
#[derive(Debug, Clone, Serialize)]
pub struct BulkReport {
    /// Day the report covers
    pub report_date: NaiveDate,
    /// Managed accounts, cost per account
    pub managed_account_sum: AggregateNode,
    /// Unmanaged accounts, cost per account
    pub unmanaged_account_sum: AggregateNode,
    /// Every account broken down by service, with totals
    pub account_service_sum: AggregateNode,
    /// Managed spend per service, minor services dropped
    pub service_sum: AggregateNode,
    /// Managed spend per owner per service, minor owners dropped
    pub owner_service_sum: AggregateNode,
    /// Expensive resources broken down by usage type
    pub resource_usage_sum: AggregateNode,
    /// Top services broken down by usage type
    pub service_usage_sum: AggregateNode,
}

/// Personalized cost summary for one owner
#[derive(Debug, Clone, Serialize)]
pub struct OwnerReport {
    /// Day the report covers
    pub report_date: NaiveDate,
    /// Resolved owner address
    pub owner: String,
    /// The owner's resources grouped by account
    pub summary: AggregateNode,
}

/// The assembled tagging-compliance report
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    /// Resources satisfying the tagging policy
    pub compliant: Vec<ComplianceRecord>,
    /// Resources violating the tagging policy
    pub non_compliant: Vec<ComplianceRecord>,
    /// Compliant resources bucketed by resolved delivery address
    pub owner_resources: Vec<(String, Vec<ComplianceRecord>)>,
    /// Non-compliant findings per managed account, zero-finding accounts included
    pub findings_by_account: BTreeMap<String, Vec<ComplianceRecord>>,
}

/// Assembles reports from aggregated resources and audit batches
pub struct ReportBuilder<'a> {
    config: &'a Config,
    report_date: NaiveDate,
}

impl<'a> ReportBuilder<'a> {
    /// Create a builder for the given configuration and report day
    pub fn new(config: &'a Config, report_date: NaiveDate) -> Self {
        Self {
            config,
            report_date,
        }
    }

    /// Partition resources by whether their account is managed
    pub fn split_managed(
        &self,
        resources: &[BilledResource],
    ) -> (Vec<BilledResource>, Vec<BilledResource>) {
        resources
            .iter()
            .cloned()
            .partition(|r| self.config.is_managed(r.account_id()))
    }

    /// Build the bulk cost report
    pub fn build_bulk(&self, resources: &[BilledResource]) -> Result<BulkReport> {
        let (managed, unmanaged) = self.split_managed(resources);
        info!(
            managed = managed.len(),
            unmanaged = unmanaged.len(),
            "assembling bulk report"
        );

        let managed_account_sum =
            rollup(&[Dimension::Account], &managed, RollupOptions::new())?;
        let unmanaged_account_sum =
            rollup(&[Dimension::Account], &unmanaged, RollupOptions::new())?;

        let account_service_sum = rollup(
            &[Dimension::Account, Dimension::Service],
            resources,
            RollupOptions::new().with_total(true),
        )?;

        let service_sum = rollup(
            &[Dimension::Service],
            &managed,
            RollupOptions::new().with_threshold(1),
        )?;

        // Owners below $1/month are noise in the bulk report
        let owner_service_sum = retain_by_total(
            rollup(
                &[Dimension::Owner, Dimension::Service],
                &managed,
                RollupOptions::new().with_total(true).with_threshold(1),
            )?,
            1,
        );

        let resource_usage_sum = retain_by_total(
            rollup(
                &[Dimension::Resource, Dimension::UsageType],
                &managed,
                RollupOptions::new().with_total(true).with_threshold(1),
            )?,
            20,
        );

        let service_usage_sum = top_by_total(
            rollup(
                &[Dimension::Service, Dimension::UsageType],
                &managed,
                RollupOptions::new().with_total(true).with_threshold(1),
            )?,
            3,
        );

        Ok(BulkReport {
            report_date: self.report_date,
            managed_account_sum,
            unmanaged_account_sum,
            account_service_sum,
            service_sum,
            owner_service_sum,
            resource_usage_sum,
            service_usage_sum,
        })
    }

    /// Build one personalized report per deliverable owner
    ///
    /// Owner tags run through the same classifier as the audit records;
    /// tags that resolve to no address (shared, untagged, non-email
    /// values) get no personalized report.
    pub fn build_owner_reports(
        &self,
        resources: &[BilledResource],
    ) -> Result<Vec<OwnerReport>> {
        let (managed, _) = self.split_managed(resources);
        let by_owner = rollup(
            &[Dimension::Owner, Dimension::Account, Dimension::Resource],
            &managed,
            RollupOptions::new(),
        )?;

        let mut reports = Vec::new();
        if let AggregateNode::Branch(entries) = by_owner {
            for (owner_tag, summary) in entries {
                let OwnerResolution::Email(owner) = owners::classify_tag(&owner_tag) else {
                    continue;
                };
                reports.push(OwnerReport {
                    report_date: self.report_date,
                    owner,
                    summary,
                });
            }
        }
        info!(count = reports.len(), "assembled personalized reports");
        Ok(reports)
    }

    /// Build the tagging-compliance report from a merged audit batch
    pub fn build_compliance(&self, records: Vec<ComplianceRecord>) -> ComplianceReport {
        let reconciler = ComplianceReconciler::new(self.config.managed_account_names());
        let (compliant, non_compliant) = reconciler.partition(records);
        let owner_resources = reconciler.owners_to_resources(&compliant);
        let findings_by_account = reconciler.non_compliant_by_managed_account(&non_compliant);
        info!(
            compliant = compliant.len(),
            non_compliant = non_compliant.len(),
            owners = owner_resources.len(),
            "assembled compliance report"
        );
        ComplianceReport {
            compliant,
            non_compliant,
            owner_resources,
            findings_by_account,
        }
    }
}

/// Keep branch entries whose `Total` monthly cost is strictly above the cutoff
fn retain_by_total(node: AggregateNode, cutoff: i64) -> AggregateNode {
    match node {
        AggregateNode::Branch(entries) => AggregateNode::Branch(
            entries
                .into_iter()
                .filter(|(_, child)| child.total_monthly_cost().is_some_and(|t| t > cutoff))
                .collect(),
        ),
        leaf => leaf,
    }
}

/// Keep the `n` branch entries with the highest `Total` monthly cost
fn top_by_total(node: AggregateNode, n: usize) -> AggregateNode {
    match node {
        AggregateNode::Branch(mut entries) => {
            entries.sort_by_key(|(_, child)| {
                std::cmp::Reverse(child.total_monthly_cost().unwrap_or(0))
            });
            entries.truncate(n);
            AggregateNode::Branch(entries)
        }
        leaf => leaf,
    }
}
