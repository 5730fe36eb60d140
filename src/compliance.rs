//! Tagging-compliance audit records and reconciliation
//!
//! The compliance audit is an independent scan of cloud resources,
//! fetched per account and region and merged into one immutable batch
//! before anything here runs. Audit records are never joined with billed
//! resources by key; the two datasets are aggregated and reported side by
//! side because their id spaces differ (billing resource id vs. audit
//! ARN) and so do their cadences.

use crate::owners::{self, OwnerResolution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compliance verdict for one audited resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    /// Resource satisfies the tagging policy
    Compliant,
    /// Resource violates the tagging policy
    NonCompliant,
}

/// One row of the audit feed as fetched from the scan
///
/// The status may be absent, in which case it is derived locally: a
/// resource is non-compliant iff the noncompliant-marker tag is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRow {
    /// Resource ARN or id
    pub resource_id: String,
    /// Resource type as reported by the scan
    pub resource_type: String,
    /// Account the resource belongs to
    pub account_id: String,
    /// Human-readable account name
    pub account_name: String,
    /// Region the resource was scanned in
    pub region: String,
    /// Verdict, when the scan reported one directly
    #[serde(default)]
    pub compliance_status: Option<ComplianceStatus>,
    /// Owner tag, capitalized key
    #[serde(rename = "Owner", default)]
    pub owner_tag: Option<String>,
    /// Owner tag, lowercase key
    #[serde(rename = "owner", default)]
    pub owner_tag_lower: Option<String>,
    /// Marker tag applied by the tag-enforcement service
    #[serde(rename = "noncompliant-maid-service", default)]
    pub noncompliant_tag: Option<String>,
}

/// One audited resource with its derived owner classification
///
/// Identity is the (resource id, account id) pairing; ARNs alone can
/// collide across accounts. Records are immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceRecord {
    /// Resource ARN or id
    pub resource_id: String,
    /// Resource type as reported by the scan
    pub resource_type: String,
    /// Account the resource belongs to
    pub account_id: String,
    /// Human-readable account name
    pub account_name: String,
    /// Region the resource was scanned in
    pub region: String,
    /// Compliance verdict, provided or derived
    pub status: ComplianceStatus,
    /// Recipient identity resolved from the owner tags
    pub owner: OwnerResolution,
}

impl ComplianceRecord {
    /// Build a record from an audit row, deriving status and owner
    pub fn from_row(row: AuditRow) -> Self {
        let status = row.compliance_status.unwrap_or_else(|| {
            if row.noncompliant_tag.is_some() {
                ComplianceStatus::NonCompliant
            } else {
                ComplianceStatus::Compliant
            }
        });
        let owner = owners::resolve_owner([
            row.owner_tag.as_deref(),
            row.owner_tag_lower.as_deref(),
        ]);
        Self {
            resource_id: row.resource_id,
            resource_type: row.resource_type,
            account_id: row.account_id,
            account_name: row.account_name,
            region: row.region,
            status,
            owner,
        }
    }

    /// Resolved delivery address, if any
    pub fn email(&self) -> Option<&str> {
        self.owner.email()
    }

    /// True when the owner tag marked the resource as shared
    pub fn is_shared(&self) -> bool {
        self.owner.is_shared()
    }

    /// True when this record is compliant
    pub fn is_compliant(&self) -> bool {
        self.status == ComplianceStatus::Compliant
    }
}

/// Classifies audit batches and buckets them for delivery
///
/// Holds the managed account names so the per-account findings map can be
/// pre-seeded: every managed account gets a row in the bulk report even
/// with zero findings.
pub struct ComplianceReconciler {
    managed_account_names: Vec<String>,
}

impl ComplianceReconciler {
    /// Create a reconciler for the given managed account names
    pub fn new(managed_account_names: Vec<String>) -> Self {
        Self {
            managed_account_names,
        }
    }

    /// Split a batch into (compliant, non-compliant), preserving order
    pub fn partition(
        &self,
        records: Vec<ComplianceRecord>,
    ) -> (Vec<ComplianceRecord>, Vec<ComplianceRecord>) {
        records.into_iter().partition(ComplianceRecord::is_compliant)
    }

    /// Bucket compliant records by resolved delivery address
    ///
    /// Shared and unowned records carry no address and are excluded from
    /// personalized delivery; they still appear in the partition and the
    /// bulk report. Every record with an address lands in exactly one
    /// bucket, in first-seen order.
    pub fn owners_to_resources(
        &self,
        compliant: &[ComplianceRecord],
    ) -> Vec<(String, Vec<ComplianceRecord>)> {
        let mut index: BTreeMap<String, usize> = BTreeMap::new();
        let mut buckets: Vec<(String, Vec<ComplianceRecord>)> = Vec::new();
        for record in compliant {
            let Some(email) = record.email() else {
                continue;
            };
            match index.get(email) {
                Some(&i) => buckets[i].1.push(record.clone()),
                None => {
                    index.insert(email.to_string(), buckets.len());
                    buckets.push((email.to_string(), vec![record.clone()]));
                }
            }
        }
        buckets
    }

    /// Group non-compliant records by managed account name
    ///
    /// The map is pre-seeded with every managed account so accounts with
    /// zero findings still render. Records from accounts outside the
    /// managed set are omitted.
    pub fn non_compliant_by_managed_account(
        &self,
        non_compliant: &[ComplianceRecord],
    ) -> BTreeMap<String, Vec<ComplianceRecord>> {
        let mut by_account: BTreeMap<String, Vec<ComplianceRecord>> = self
            .managed_account_names
            .iter()
            .map(|name| (name.clone(), Vec::new()))
            .collect();
        for record in non_compliant {
            if let Some(bucket) = by_account.get_mut(&record.account_name) {
                bucket.push(record.clone());
            }
        }
        by_account
    }
}
