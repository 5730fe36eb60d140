//! Aggregation engine for billing rows
//!
//! This module turns a raw billing row stream into [`BilledResource`]
//! records (one pass, one record per distinct resource id) and rolls a
//! resource collection up along an ordered list of [`Dimension`]s into a
//! nested totals tree.
//!
//! The rollup recursion partitions the collection by each dimension in
//! turn and collapses the final dimension's groups into whole-dollar
//! [`CostPacket`]s. Threshold filtering, descending-cost sorting and the
//! synthetic `Total` entry apply at the leaf level only; intermediate
//! levels pass every group through unfiltered. Sibling branches always
//! recurse over their own owned sublists, so no aggregation state is
//! shared across branches.
//!
//! # Examples
//!
//! ```no_run
//! use cbreport::{
//!     aggregation::{ResourceAggregator, RollupOptions, rollup},
//!     data_loader::DataLoader,
//!     types::Dimension,
//! };
//! use chrono::NaiveDate;
//!
//! # async fn example() -> cbreport::Result<()> {
//! let report_date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! let loader = DataLoader::new("data/billingReport.csv.gz");
//! let rows = loader.load_billing_rows();
//!
//! let mut aggregator = ResourceAggregator::new(report_date);
//! let resources = aggregator.collect_resources(rows).await?;
//!
//! let by_account_service = rollup(
//!     &[Dimension::Account, Dimension::Service],
//!     &resources,
//!     RollupOptions::new().with_total(true),
//! )?;
//! # Ok(())
//! # }
//! ```

use crate::error::{ReportError, Result};
use crate::resource::BilledResource;
use crate::types::{
    BillingRow, CostPacket, Dimension, IdSource, RandomIdSource, ResourceKey, truncate_cost,
};
use chrono::NaiveDate;
use futures::stream::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// Key under which the leaf-level grand total is injected
pub const TOTAL_KEY: &str = "Total";

/// Builds the per-resource record map from a billing row stream
///
/// The row stream is consumed exactly once. Credits, refunds and savings
/// plan negations are filtered out; every other row must parse cleanly or
/// the whole run aborts.
pub struct ResourceAggregator {
    report_date: NaiveDate,
    show_progress: bool,
    id_source: Box<dyn IdSource + Send>,
}

impl ResourceAggregator {
    /// Create an aggregator for the given report day
    pub fn new(report_date: NaiveDate) -> Self {
        Self {
            report_date,
            show_progress: false,
            id_source: Box::new(RandomIdSource),
        }
    }

    /// Enable or disable the progress spinner
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Replace the synthetic id source (deterministic ids for tests)
    pub fn with_id_source(mut self, id_source: Box<dyn IdSource + Send>) -> Self {
        self.id_source = id_source;
        self
    }

    /// The report day defining the daily cost window
    pub fn report_date(&self) -> NaiveDate {
        self.report_date
    }

    /// Consume the row stream and build the resource records
    ///
    /// Records come back in first-seen order. A row whose usage window
    /// falls entirely on the report day contributes to both the daily and
    /// monthly cost; every non-skipped row contributes to the monthly
    /// cost.
    pub async fn collect_resources(
        &mut self,
        rows: impl Stream<Item = Result<BillingRow>>,
    ) -> Result<Vec<BilledResource>> {
        let mut by_key: HashMap<ResourceKey, usize> = HashMap::new();
        let mut resources: Vec<BilledResource> = Vec::new();

        let progress = if self.show_progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg} [{elapsed_precise}] {pos} rows processed")
                    .unwrap(),
            );
            pb.set_message("Aggregating billing rows");
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            Some(pb)
        } else {
            None
        };

        let mut count = 0u64;
        let mut skipped = 0u64;

        tokio::pin!(rows);
        while let Some(result) = rows.next().await {
            let row = result?;
            count += 1;
            if let Some(ref pb) = progress {
                pb.set_position(count);
            }

            if row.is_skipped() {
                skipped += 1;
                continue;
            }

            let key = match row.resource_id.as_deref() {
                Some(id) if !id.is_empty() => ResourceKey::Known(id.to_string()),
                _ => ResourceKey::Synthetic(self.id_source.next_synthetic()),
            };

            let index = match by_key.get(&key) {
                Some(&index) => index,
                None => {
                    let resource = BilledResource::new(
                        key.clone(),
                        row.product_name.clone(),
                        row.account_id.clone(),
                        row.region.clone(),
                    );
                    resources.push(resource);
                    by_key.insert(key, resources.len() - 1);
                    resources.len() - 1
                }
            };
            let resource = &mut resources[index];

            for tag in row.owner_tags() {
                resource.set_owner_tag(tag);
            }

            let cost = row.cost()?;
            let start = BillingRow::parse_usage_timestamp(&row.usage_start)?.date();
            let end = BillingRow::parse_usage_timestamp(&row.usage_end)?.date();
            let daily = if start >= self.report_date && end <= self.report_date {
                cost
            } else {
                Decimal::ZERO
            };

            resource.add_usage(&row.usage_type, daily, cost)?;
        }

        if let Some(pb) = progress {
            pb.finish_with_message(format!(
                "Aggregated {} rows into {} resources ({} skipped)",
                count,
                resources.len(),
                skipped
            ));
        }

        tracing::debug!(
            rows = count,
            resources = resources.len(),
            skipped,
            "billing rows aggregated"
        );

        Ok(resources)
    }
}

/// Group a resource collection, preserving first-seen key order
fn group_by<F>(resources: &[BilledResource], key_fn: F) -> Vec<(String, Vec<BilledResource>)>
where
    F: Fn(&BilledResource) -> String,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<BilledResource>)> = Vec::new();
    for resource in resources {
        let key = key_fn(resource);
        match index.get(&key) {
            Some(&i) => groups[i].1.push(resource.clone()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![resource.clone()]));
            }
        }
    }
    groups
}

/// Group by billing account id
pub fn group_by_account(resources: &[BilledResource]) -> Vec<(String, Vec<BilledResource>)> {
    group_by(resources, |r| r.account_id().to_string())
}

/// Group by service/product name
pub fn group_by_service(resources: &[BilledResource]) -> Vec<(String, Vec<BilledResource>)> {
    group_by(resources, |r| r.service_type().to_string())
}

/// Group by resolved owner; unowned resources share the `(untagged)` bucket
pub fn group_by_owner(resources: &[BilledResource]) -> Vec<(String, Vec<BilledResource>)> {
    group_by(resources, |r| r.owner_key().to_string())
}

/// Identity grouping, one group per resource id
pub fn group_by_resource(resources: &[BilledResource]) -> Vec<(String, Vec<BilledResource>)> {
    group_by(resources, |r| r.key().to_string())
}

/// Explode each resource into per-usage-type derived copies
///
/// A resource with three usage types appears in three groups, each copy
/// carrying only that usage type's costs.
pub fn group_by_usage_type(resources: &[BilledResource]) -> Vec<(String, Vec<BilledResource>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<BilledResource>)> = Vec::new();
    for resource in resources {
        for usage_type in resource.usage_types().keys() {
            if let Some(copy) = resource.single_usage_type(usage_type) {
                match index.get(usage_type.as_str()) {
                    Some(&i) => groups[i].1.push(copy),
                    None => {
                        index.insert(usage_type.clone(), groups.len());
                        groups.push((usage_type.clone(), vec![copy]));
                    }
                }
            }
        }
    }
    groups
}

impl Dimension {
    /// Apply this dimension's grouping view
    pub fn group(&self, resources: &[BilledResource]) -> Vec<(String, Vec<BilledResource>)> {
        match self {
            Self::Account => group_by_account(resources),
            Self::Service => group_by_service(resources),
            Self::Owner => group_by_owner(resources),
            Self::Resource => group_by_resource(resources),
            Self::UsageType => group_by_usage_type(resources),
        }
    }
}

/// Leaf-level options for a rollup pass
#[derive(Debug, Clone, Copy, Default)]
pub struct RollupOptions {
    /// Inject a synthetic `Total` entry after filtering and sorting
    pub add_total: bool,
    /// Drop leaf entries whose monthly cost is strictly below this value
    pub threshold: i64,
}

impl RollupOptions {
    /// Options with no total and no threshold
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the grand total entry is injected
    pub fn with_total(mut self, add_total: bool) -> Self {
        self.add_total = add_total;
        self
    }

    /// Set the leaf-level monthly-cost threshold
    pub fn with_threshold(mut self, threshold: i64) -> Self {
        self.threshold = threshold;
        self
    }
}

/// Nested aggregation result
///
/// Branches keep their entries in render order (descending monthly cost
/// at the leaf level, `Total` last), so the variant holds an ordered list
/// rather than a map. Serialization produces JSON objects whose keys
/// appear in that order.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateNode {
    /// Interior level keyed by a dimension's values
    Branch(Vec<(String, AggregateNode)>),
    /// Collapsed cost pair for a final-dimension group
    Leaf(CostPacket),
}

impl AggregateNode {
    /// Child entries; empty for a leaf
    pub fn entries(&self) -> &[(String, AggregateNode)] {
        match self {
            Self::Branch(entries) => entries,
            Self::Leaf(_) => &[],
        }
    }

    /// Look up a child by key
    pub fn get(&self, key: &str) -> Option<&AggregateNode> {
        self.entries()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, node)| node)
    }

    /// The cost packet when this node is a leaf
    pub fn as_leaf(&self) -> Option<&CostPacket> {
        match self {
            Self::Leaf(packet) => Some(packet),
            Self::Branch(_) => None,
        }
    }

    /// Monthly cost of this node's `Total` leaf, when present
    pub fn total_monthly_cost(&self) -> Option<i64> {
        self.get(TOTAL_KEY)?.as_leaf().map(|p| p.monthly_cost)
    }
}

impl Serialize for AggregateNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Leaf(packet) => packet.serialize(serializer),
            Self::Branch(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, node) in entries {
                    map.serialize_entry(key, node)?;
                }
                map.end()
            }
        }
    }
}

/// Roll a resource collection up along an ordered dimension list
///
/// Each level partitions its input with the level's dimension. The final
/// dimension collapses each group into a [`CostPacket`]; grand totals are
/// accumulated across all groups at that level before the threshold
/// filter runs, so a `Total` entry always reflects the unfiltered sum.
pub fn rollup(
    dimensions: &[Dimension],
    resources: &[BilledResource],
    options: RollupOptions,
) -> Result<AggregateNode> {
    let (dimension, rest) = dimensions
        .split_first()
        .ok_or(ReportError::EmptyDimensions)?;

    let groups = dimension.group(resources);

    if rest.is_empty() {
        let mut daily_total = 0i64;
        let mut monthly_total = 0i64;
        let mut entries: Vec<(String, CostPacket)> = Vec::with_capacity(groups.len());

        for (key, members) in groups {
            let daily = truncate_cost(members.iter().map(BilledResource::daily_total).sum())?;
            let monthly = truncate_cost(members.iter().map(BilledResource::monthly_total).sum())?;
            daily_total += daily;
            monthly_total += monthly;
            entries.push((key, CostPacket::new(daily, monthly)));
        }

        entries.retain(|(_, packet)| packet.monthly_cost >= options.threshold);
        entries.sort_by(|a, b| b.1.monthly_cost.cmp(&a.1.monthly_cost));

        let mut nodes: Vec<(String, AggregateNode)> = entries
            .into_iter()
            .map(|(key, packet)| (key, AggregateNode::Leaf(packet)))
            .collect();

        if options.add_total {
            nodes.push((
                TOTAL_KEY.to_string(),
                AggregateNode::Leaf(CostPacket::new(daily_total, monthly_total)),
            ));
        }

        return Ok(AggregateNode::Branch(nodes));
    }

    let mut nodes: Vec<(String, AggregateNode)> = Vec::with_capacity(groups.len());
    for (key, members) in groups {
        nodes.push((key, rollup(rest, &members, options)?));
    }
    Ok(AggregateNode::Branch(nodes))
}
