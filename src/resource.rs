//! Billed resource records
//!
//! A [`BilledResource`] accumulates every billing line item that references
//! the same resource id within a single run. Each resource owns a map from
//! usage type to a validated [`CostAccumulator`], plus the owner identity
//! resolved from the first usable tag the row stream produced.

use crate::error::Result;
use crate::types::{CostAccumulator, ResourceKey};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Grouping key used for resources that resolved no owner tag
pub const UNTAGGED: &str = "(untagged)";

/// One distinct billed resource accumulated across many billing rows
///
/// # Examples
/// ```
/// use cbreport::resource::BilledResource;
/// use cbreport::types::ResourceKey;
/// use rust_decimal::Decimal;
///
/// let mut resource = BilledResource::new(
///     ResourceKey::Known("i-123".to_string()),
///     "Amazon Elastic Compute Cloud",
///     "111122223333",
///     Some("us-west-2".to_string()),
/// );
/// resource
///     .add_usage("BoxUsage:m5.large", Decimal::ONE, Decimal::TEN)
///     .unwrap();
/// assert_eq!(resource.monthly_total(), Decimal::TEN);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BilledResource {
    key: ResourceKey,
    service_type: String,
    account_id: String,
    region: Option<String>,
    owner: Option<String>,
    usage_types: BTreeMap<String, CostAccumulator>,
}

impl BilledResource {
    /// Create an empty record for a newly-seen resource
    pub fn new(
        key: ResourceKey,
        service_type: impl Into<String>,
        account_id: impl Into<String>,
        region: Option<String>,
    ) -> Self {
        Self {
            key,
            service_type: service_type.into(),
            account_id: account_id.into(),
            region,
            owner: None,
            usage_types: BTreeMap::new(),
        }
    }

    /// Resource identity
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Service/product name from the billing rows
    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    /// Account the resource is billed to
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Region, when the billing row carried one
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Resolved owner tag value, if any row carried one
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Owner value used as a grouping key; unowned resources share the
    /// `(untagged)` bucket
    pub fn owner_key(&self) -> &str {
        self.owner.as_deref().unwrap_or(UNTAGGED)
    }

    /// Set the owner from a tag value, first non-empty value wins
    ///
    /// Rows seen after the owner is set never overwrite it, which keeps
    /// the result deterministic for a pinned row order.
    pub fn set_owner_tag(&mut self, value: Option<&str>) {
        if self.owner.is_none()
            && let Some(tag) = value
            && !tag.is_empty()
        {
            self.owner = Some(tag.to_string());
        }
    }

    /// Accumulate one row's cost under its usage type
    ///
    /// The monthly amount is always added; the daily amount is zero for
    /// rows outside the report-day window. Negative amounts fail.
    pub fn add_usage(
        &mut self,
        usage_type: &str,
        daily: Decimal,
        monthly: Decimal,
    ) -> Result<()> {
        let packet = self.usage_types.entry(usage_type.to_string()).or_default();
        packet.add_daily(daily)?;
        packet.add_monthly(monthly)?;
        Ok(())
    }

    /// Usage-type cost map
    pub fn usage_types(&self) -> &BTreeMap<String, CostAccumulator> {
        &self.usage_types
    }

    /// Detached copy carrying only the named usage type's costs
    ///
    /// Used by the usage-type dimension, where one resource appears once
    /// per usage type. The copy is not tracked as a distinct resource.
    pub fn single_usage_type(&self, usage_type: &str) -> Option<BilledResource> {
        let costs = self.usage_types.get(usage_type)?;
        let mut copy = BilledResource::new(
            self.key.clone(),
            self.service_type.clone(),
            self.account_id.clone(),
            self.region.clone(),
        );
        copy.owner = self.owner.clone();
        copy.usage_types
            .insert(usage_type.to_string(), costs.clone());
        Some(copy)
    }

    /// Daily cost summed across usage types
    pub fn daily_total(&self) -> Decimal {
        self.usage_types.values().map(CostAccumulator::daily).sum()
    }

    /// Monthly cost summed across usage types
    pub fn monthly_total(&self) -> Decimal {
        self.usage_types
            .values()
            .map(CostAccumulator::monthly)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_resource() -> BilledResource {
        BilledResource::new(
            ResourceKey::Known("i-123".to_string()),
            "Amazon Elastic Compute Cloud",
            "111122223333",
            Some("us-west-2".to_string()),
        )
    }

    #[test]
    fn test_owner_first_tag_wins() {
        let mut resource = test_resource();
        resource.set_owner_tag(None);
        resource.set_owner_tag(Some(""));
        assert_eq!(resource.owner(), None);
        assert_eq!(resource.owner_key(), UNTAGGED);

        resource.set_owner_tag(Some("a@x.com"));
        resource.set_owner_tag(Some("b@y.com"));
        assert_eq!(resource.owner(), Some("a@x.com"));
        assert_eq!(resource.owner_key(), "a@x.com");
    }

    #[test]
    fn test_usage_accumulation() {
        let mut resource = test_resource();
        resource
            .add_usage("BoxUsage:m5.large", dec!(1.50), dec!(4.25))
            .unwrap();
        resource
            .add_usage("BoxUsage:m5.large", dec!(0.50), dec!(2.00))
            .unwrap();
        resource
            .add_usage("DataTransfer-Out-Bytes", dec!(0), dec!(0.75))
            .unwrap();

        assert_eq!(resource.usage_types().len(), 2);
        assert_eq!(resource.daily_total(), dec!(2.00));
        assert_eq!(resource.monthly_total(), dec!(7.00));
    }

    #[test]
    fn test_negative_usage_rejected() {
        let mut resource = test_resource();
        assert!(resource
            .add_usage("BoxUsage:m5.large", dec!(0), dec!(-1))
            .is_err());
    }

    #[test]
    fn test_single_usage_type_copy() {
        let mut resource = test_resource();
        resource.set_owner_tag(Some("a@x.com"));
        resource
            .add_usage("BoxUsage:m5.large", dec!(1), dec!(4))
            .unwrap();
        resource
            .add_usage("DataTransfer-Out-Bytes", dec!(0), dec!(2))
            .unwrap();

        let copy = resource.single_usage_type("BoxUsage:m5.large").unwrap();
        assert_eq!(copy.key(), resource.key());
        assert_eq!(copy.owner(), Some("a@x.com"));
        assert_eq!(copy.usage_types().len(), 1);
        assert_eq!(copy.monthly_total(), dec!(4));

        // The copy is detached from the parent
        assert_eq!(resource.monthly_total(), dec!(6));
        assert!(resource.single_usage_type("missing").is_none());
    }
}
