//! Core domain types for cbreport
//!
//! This module contains the fundamental types used throughout the cbreport
//! library: the validated cost accumulator, the truncated per-group cost
//! packet, resource identity, raw billing rows, and the closed set of
//! aggregation dimensions.

use crate::error::{ReportError, Result};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp format used by the billing export for usage windows
pub const USAGE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Line-item types that never contribute cost and are filtered out of
/// aggregation. This is an intentional filter, not an error path.
pub const SKIPPED_LINE_ITEM_TYPES: &[&str] = &["credit", "refund", "SavingsPlanNegation"];

/// Mutable accumulator for a (daily, monthly) cost pair
///
/// Both values start at zero and only ever grow: every increment is
/// validated to be non-negative, so a corrupted upstream row can never
/// silently deflate a total.
///
/// # Examples
/// ```
/// use cbreport::types::CostAccumulator;
/// use rust_decimal::Decimal;
///
/// let mut acc = CostAccumulator::new();
/// acc.add_monthly(Decimal::new(250, 2)).unwrap();
/// assert_eq!(acc.monthly(), Decimal::new(250, 2));
/// assert!(acc.add_daily(Decimal::NEGATIVE_ONE).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CostAccumulator {
    daily: Decimal,
    monthly: Decimal,
}

impl CostAccumulator {
    /// Create a zero-initialized accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an accumulator with explicit starting values
    pub fn with_costs(daily: Decimal, monthly: Decimal) -> Self {
        Self { daily, monthly }
    }

    /// Add to the daily cost, rejecting negative amounts
    pub fn add_daily(&mut self, amount: Decimal) -> Result<()> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ReportError::NegativeCost(amount));
        }
        self.daily += amount;
        Ok(())
    }

    /// Add to the monthly cost, rejecting negative amounts
    pub fn add_monthly(&mut self, amount: Decimal) -> Result<()> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ReportError::NegativeCost(amount));
        }
        self.monthly += amount;
        Ok(())
    }

    /// Accumulated daily cost
    pub fn daily(&self) -> Decimal {
        self.daily
    }

    /// Accumulated monthly cost
    pub fn monthly(&self) -> Decimal {
        self.monthly
    }
}

/// Truncated (daily, monthly) cost pair attached to an aggregation leaf
///
/// Costs are truncated to whole dollars, so a group whose monthly cost is
/// below $1 collapses to 0. Values are never negative because every
/// contributing increment was validated on the way in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostPacket {
    /// Whole-dollar cost for the report day
    pub daily_cost: i64,
    /// Whole-dollar month-to-date cost
    pub monthly_cost: i64,
}

impl CostPacket {
    /// Create a new CostPacket
    pub fn new(daily_cost: i64, monthly_cost: i64) -> Self {
        Self {
            daily_cost,
            monthly_cost,
        }
    }
}

/// Truncate a decimal cost sum to whole dollars
pub fn truncate_cost(amount: Decimal) -> Result<i64> {
    amount.trunc().to_i64().ok_or(ReportError::CostOverflow)
}

/// Identity of a billed resource
///
/// Line items that carry no resource id still have to be accumulated
/// somewhere, so each such row is keyed by a synthesized placeholder id
/// drawn from an [`IdSource`]. Keeping the two cases as distinct variants
/// means equality never depends on how the placeholder was generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKey {
    /// Resource id present in the billing row (instance id, ARN, bucket name)
    Known(String),
    /// Synthesized placeholder for a resource-less line item
    Synthetic(String),
}

/// Marker prefix rendered in front of synthesized resource ids
pub const SYNTHETIC_ID_PREFIX: &str = "NA";

impl ResourceKey {
    /// True when this key was synthesized rather than read from a row
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Synthetic(_))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(id) => write!(f, "{id}"),
            Self::Synthetic(suffix) => write!(f, "{SYNTHETIC_ID_PREFIX}{suffix}"),
        }
    }
}

/// Source of placeholder id suffixes for resource-less line items
///
/// Production uses random ids; tests inject a deterministic source so
/// synthesized keys are reproducible.
pub trait IdSource {
    /// Produce the next placeholder suffix
    fn next_synthetic(&mut self) -> String;
}

/// Random placeholder ids backed by UUID v4
#[derive(Debug, Default)]
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn next_synthetic(&mut self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Sequential placeholder ids for deterministic tests
#[derive(Debug, Default)]
pub struct SequentialIdSource {
    next: u64,
}

impl IdSource for SequentialIdSource {
    fn next_synthetic(&mut self) -> String {
        let id = self.next;
        self.next += 1;
        format!("{id:08}")
    }
}

/// One line item of a cost & usage export
///
/// Field names map straight onto the CSV column headers of the billing
/// report, so a `csv` deserializer produces these rows without a manual
/// mapping step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRow {
    /// Account the usage was billed to
    #[serde(rename = "lineItem/UsageAccountId")]
    pub account_id: String,

    /// Human-readable service name
    #[serde(rename = "product/ProductName")]
    pub product_name: String,

    /// Provider-specific usage sub-classification
    #[serde(rename = "product/usagetype")]
    pub usage_type: String,

    /// Line-item kind; credits and refunds are filtered out
    #[serde(rename = "lineItem/LineItemType")]
    pub line_item_type: String,

    /// Cost amount as a decimal string
    #[serde(rename = "lineItem/BlendedCost")]
    pub blended_cost: String,

    /// Usage window start, ISO-8601
    #[serde(rename = "lineItem/UsageStartDate")]
    pub usage_start: String,

    /// Usage window end, ISO-8601
    #[serde(rename = "lineItem/UsageEndDate")]
    pub usage_end: String,

    /// Resource id; absent for resource-less items like support charges
    #[serde(rename = "lineItem/ResourceId", default)]
    pub resource_id: Option<String>,

    /// Region the resource lives in
    #[serde(rename = "product/region", default)]
    pub region: Option<String>,

    /// Owner tag, capitalized key
    #[serde(rename = "resourceTags/user:Owner", default)]
    pub owner_tag: Option<String>,

    /// Owner tag, lowercase key
    #[serde(rename = "resourceTags/user:owner", default)]
    pub owner_tag_lower: Option<String>,
}

impl BillingRow {
    /// Parse the cost field; failure aborts the run
    pub fn cost(&self) -> Result<Decimal> {
        self.blended_cost
            .trim()
            .parse::<Decimal>()
            .map_err(|_| ReportError::InvalidCost {
                value: self.blended_cost.clone(),
            })
    }

    /// Parse one of the usage window timestamps
    pub fn parse_usage_timestamp(value: &str) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(value, USAGE_TIMESTAMP_FORMAT)
            .map_err(|_| ReportError::InvalidTimestamp(value.to_string()))
    }

    /// True when this row's line-item type never contributes cost
    pub fn is_skipped(&self) -> bool {
        SKIPPED_LINE_ITEM_TYPES.contains(&self.line_item_type.as_str())
    }

    /// Owner tag values in precedence order, first recognized tag wins
    pub fn owner_tags(&self) -> [Option<&str>; 2] {
        [self.owner_tag.as_deref(), self.owner_tag_lower.as_deref()]
    }
}

/// Closed set of aggregation dimensions
///
/// Each variant maps to one grouping view over a resource collection.
/// Parsing an unknown name fails before any aggregation work begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// Group by billing account id
    Account,
    /// Group by service/product name
    Service,
    /// Group by resolved owner tag
    Owner,
    /// Identity grouping by resource id
    Resource,
    /// Explode each resource into per-usage-type entries
    UsageType,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account => write!(f, "account"),
            Self::Service => write!(f, "service"),
            Self::Owner => write!(f, "owner"),
            Self::Resource => write!(f, "resource"),
            Self::UsageType => write!(f, "usage"),
        }
    }
}

impl std::str::FromStr for Dimension {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "account" => Ok(Self::Account),
            "service" => Ok(Self::Service),
            "owner" => Ok(Self::Owner),
            "resource" => Ok(Self::Resource),
            "usage" => Ok(Self::UsageType),
            _ => Err(ReportError::UnknownDimension(s.to_string())),
        }
    }
}
