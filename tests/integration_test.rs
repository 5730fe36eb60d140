//! Integration tests for cbreport

use cbreport::{
    aggregation::{
        ResourceAggregator, RollupOptions, TOTAL_KEY, group_by_resource, rollup,
    },
    config::Config,
    report::ReportBuilder,
    resource::UNTAGGED,
    types::{BillingRow, Dimension, SequentialIdSource},
};
use chrono::NaiveDate;
use futures::stream;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

fn billing_row(
    account: &str,
    service: &str,
    usage_type: &str,
    cost: &str,
    resource_id: Option<&str>,
    owner: Option<&str>,
) -> BillingRow {
    BillingRow {
        account_id: account.to_string(),
        product_name: service.to_string(),
        usage_type: usage_type.to_string(),
        line_item_type: "Usage".to_string(),
        blended_cost: cost.to_string(),
        usage_start: "2024-03-01T00:00:00Z".to_string(),
        usage_end: "2024-03-01T01:00:00Z".to_string(),
        resource_id: resource_id.map(str::to_string),
        region: Some("us-west-2".to_string()),
        owner_tag: owner.map(str::to_string),
        owner_tag_lower: None,
    }
}

fn report_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

async fn aggregate(rows: Vec<BillingRow>) -> Vec<cbreport::resource::BilledResource> {
    let mut aggregator = ResourceAggregator::new(report_date())
        .with_id_source(Box::new(SequentialIdSource::default()));
    aggregator
        .collect_resources(stream::iter(rows.into_iter().map(Ok)))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_account_and_owner_rollup() {
    let rows = vec![
        billing_row(
            "111",
            "Amazon Elastic Compute Cloud",
            "BoxUsage:m5.large",
            "5.00",
            Some("i-123"),
            Some("a@x.com"),
        ),
        billing_row(
            "111",
            "Amazon Elastic Compute Cloud",
            "BoxUsage:m5.large",
            "3.00",
            Some("i-123"),
            None,
        ),
        billing_row(
            "222",
            "Amazon Simple Storage Service",
            "TimedStorage-ByteHrs",
            "10.00",
            Some("i-456"),
            None,
        ),
    ];
    let resources = aggregate(rows).await;
    assert_eq!(resources.len(), 2);

    let by_account = rollup(&[Dimension::Account], &resources, RollupOptions::new()).unwrap();
    assert_eq!(by_account.get("111").unwrap().as_leaf().unwrap().monthly_cost, 8);
    assert_eq!(by_account.get("111").unwrap().as_leaf().unwrap().daily_cost, 8);
    assert_eq!(by_account.get("222").unwrap().as_leaf().unwrap().monthly_cost, 10);

    let by_owner = rollup(&[Dimension::Owner], &resources, RollupOptions::new()).unwrap();
    assert_eq!(by_owner.get("a@x.com").unwrap().as_leaf().unwrap().monthly_cost, 8);
    assert_eq!(by_owner.get(UNTAGGED).unwrap().as_leaf().unwrap().monthly_cost, 10);
}

#[tokio::test]
async fn test_monthly_cost_conservation() {
    let rows = vec![
        billing_row("111", "EC2", "BoxUsage", "5.25", Some("i-1"), None),
        billing_row("111", "EC2", "BoxUsage", "3.75", Some("i-1"), None),
        billing_row("111", "S3", "TimedStorage", "2.00", None, None),
        billing_row("222", "S3", "TimedStorage", "4.50", None, None),
        // Credit rows are filtered and contribute nothing
        BillingRow {
            line_item_type: "credit".to_string(),
            blended_cost: "-3.00".to_string(),
            ..billing_row("111", "EC2", "BoxUsage", "0", Some("i-1"), None)
        },
    ];

    let expected: Decimal = dec!(5.25) + dec!(3.75) + dec!(2.00) + dec!(4.50);
    let resources = aggregate(rows).await;
    let total: Decimal = resources.iter().map(|r| r.monthly_total()).sum();
    assert_eq!(total, expected);
}

#[tokio::test]
async fn test_by_resource_round_trip() {
    let rows = vec![
        billing_row("111", "EC2", "BoxUsage", "5.25", Some("i-1"), None),
        billing_row("111", "EC2", "DataTransfer", "1.75", Some("i-1"), None),
        billing_row("222", "S3", "TimedStorage", "4.50", Some("bucket-1"), None),
    ];
    let resources = aggregate(rows).await;

    // Grouping by resource and flattening reproduces per-resource totals
    let groups = group_by_resource(&resources);
    assert_eq!(groups.len(), resources.len());
    for (key, members) in groups {
        assert_eq!(members.len(), 1);
        let original = resources
            .iter()
            .find(|r| r.key().to_string() == key)
            .unwrap();
        assert_eq!(members[0].monthly_total(), original.monthly_total());
        assert_eq!(members[0].daily_total(), original.daily_total());
    }
}

#[tokio::test]
async fn test_rollup_depth_consistency() {
    // Whole-dollar costs so leaf truncation is exact at both depths
    let rows = vec![
        billing_row("111", "EC2", "BoxUsage", "5.00", Some("i-1"), None),
        billing_row("111", "S3", "TimedStorage", "3.00", Some("b-1"), None),
        billing_row("222", "EC2", "BoxUsage", "7.00", Some("i-2"), None),
        billing_row("222", "Lambda", "Request", "2.00", Some("fn-1"), None),
    ];
    let resources = aggregate(rows).await;

    let flat = rollup(&[Dimension::Account], &resources, RollupOptions::new()).unwrap();
    let nested = rollup(
        &[Dimension::Account, Dimension::Service],
        &resources,
        RollupOptions::new(),
    )
    .unwrap();

    for (account, leaf) in flat.entries() {
        let summed: i64 = nested
            .get(account)
            .unwrap()
            .entries()
            .iter()
            .filter_map(|(_, node)| node.as_leaf())
            .map(|p| p.monthly_cost)
            .sum();
        assert_eq!(leaf.as_leaf().unwrap().monthly_cost, summed);
    }
}

#[tokio::test]
async fn test_leaf_order_non_increasing() {
    let rows = vec![
        billing_row("111", "EC2", "BoxUsage", "5.00", Some("i-1"), None),
        billing_row("222", "S3", "TimedStorage", "50.00", Some("b-1"), None),
        billing_row("333", "Lambda", "Request", "20.00", Some("fn-1"), None),
    ];
    let resources = aggregate(rows).await;

    let tree = rollup(&[Dimension::Account], &resources, RollupOptions::new()).unwrap();
    let monthly: Vec<i64> = tree
        .entries()
        .iter()
        .filter_map(|(_, node)| node.as_leaf())
        .map(|p| p.monthly_cost)
        .collect();
    assert_eq!(monthly, vec![50, 20, 5]);
}

#[tokio::test]
async fn test_aggregation_idempotent() {
    let rows = vec![
        billing_row("111", "EC2", "BoxUsage", "5.00", Some("i-1"), Some("a@x.com")),
        billing_row("222", "S3", "TimedStorage", "10.00", Some("b-1"), None),
    ];

    let first = aggregate(rows.clone()).await;
    let second = aggregate(rows).await;
    assert_eq!(first, second);

    let dims = [Dimension::Owner, Dimension::Service];
    let opts = RollupOptions::new().with_total(true).with_threshold(1);
    assert_eq!(
        rollup(&dims, &first, opts).unwrap(),
        rollup(&dims, &second, opts).unwrap()
    );
}

#[tokio::test]
async fn test_daily_window_excludes_prior_days() {
    let mut in_window = billing_row("111", "EC2", "BoxUsage", "5.00", Some("i-1"), None);
    in_window.usage_start = "2024-03-01T10:00:00Z".to_string();
    in_window.usage_end = "2024-03-01T11:00:00Z".to_string();

    let mut out_of_window = billing_row("111", "EC2", "BoxUsage", "3.00", Some("i-1"), None);
    out_of_window.usage_start = "2024-02-15T10:00:00Z".to_string();
    out_of_window.usage_end = "2024-02-15T11:00:00Z".to_string();

    let resources = aggregate(vec![in_window, out_of_window]).await;
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].daily_total(), dec!(5.00));
    assert_eq!(resources[0].monthly_total(), dec!(8.00));
}

fn test_config() -> Config {
    Config {
        accounts: BTreeMap::from([
            ("111".to_string(), "genomics".to_string()),
            ("222".to_string(), "imaging".to_string()),
        ]),
        managed_accounts: BTreeMap::from([("111".to_string(), "genomics".to_string())]),
        from: "billing@ucsc.edu".to_string(),
        recipients: vec!["ops@ucsc.edu".to_string()],
        warning_threshold: 200,
    }
}

#[tokio::test]
async fn test_bulk_report_end_to_end() {
    let rows = vec![
        billing_row(
            "111",
            "Amazon Elastic Compute Cloud",
            "BoxUsage:m5.large",
            "120.00",
            Some("i-1"),
            Some("a@x.com"),
        ),
        billing_row(
            "111",
            "Amazon Simple Storage Service",
            "TimedStorage-ByteHrs",
            "30.00",
            Some("b-1"),
            Some("b@y.com"),
        ),
        billing_row(
            "222",
            "Amazon Elastic Compute Cloud",
            "BoxUsage:m5.large",
            "45.00",
            Some("i-2"),
            None,
        ),
    ];
    let resources = aggregate(rows).await;

    let config = test_config();
    let builder = ReportBuilder::new(&config, report_date());
    let bulk = builder.build_bulk(&resources).unwrap();

    // Managed split: only account 111 is managed
    assert!(bulk.managed_account_sum.get("111").is_some());
    assert!(bulk.managed_account_sum.get("222").is_none());
    assert!(bulk.unmanaged_account_sum.get("222").is_some());

    // The all-accounts tree carries per-account totals at the leaf level
    assert_eq!(
        bulk.account_service_sum.get("111").unwrap().total_monthly_cost(),
        Some(150)
    );
    assert_eq!(
        bulk.account_service_sum.get("222").unwrap().total_monthly_cost(),
        Some(45)
    );
    assert!(bulk.account_service_sum.get(TOTAL_KEY).is_none());

    // Owner summary covers managed spend only, in first-seen owner order
    let owners: Vec<_> = bulk
        .owner_service_sum
        .entries()
        .iter()
        .map(|(k, _)| k.as_str())
        .collect();
    assert_eq!(owners, vec!["a@x.com", "b@y.com"]);

    let reports = builder.build_owner_reports(&resources).unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].owner, "a@x.com");
    assert_eq!(
        reports[0]
            .summary
            .get("111")
            .unwrap()
            .get("i-1")
            .unwrap()
            .as_leaf()
            .unwrap()
            .monthly_cost,
        120
    );
}

#[tokio::test]
async fn test_owner_tag_order_pinned() {
    // The first row carrying a non-empty tag decides the owner
    let rows = vec![
        billing_row("111", "EC2", "BoxUsage", "1.00", Some("i-1"), None),
        billing_row("111", "EC2", "BoxUsage", "1.00", Some("i-1"), Some("first@x.com")),
        billing_row("111", "EC2", "BoxUsage", "1.00", Some("i-1"), Some("second@y.com")),
    ];
    let resources = aggregate(rows).await;
    assert_eq!(resources[0].owner(), Some("first@x.com"));
}

#[tokio::test]
async fn test_empty_inputs_produce_empty_aggregates() {
    let resources = aggregate(vec![]).await;
    assert!(resources.is_empty());

    let tree = rollup(&[Dimension::Account], &resources, RollupOptions::new()).unwrap();
    assert!(tree.entries().is_empty());

    let config = test_config();
    let builder = ReportBuilder::new(&config, report_date());
    let bulk = builder.build_bulk(&resources).unwrap();
    assert!(bulk.service_sum.entries().is_empty());
    // No accounts means no leaf level for the total to land on
    assert!(bulk.account_service_sum.entries().is_empty());
}
