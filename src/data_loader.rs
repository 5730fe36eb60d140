//! Billing report loader
//!
//! Reads an already-downloaded cost & usage CSV export from disk, gzipped
//! or plain, and exposes its rows as an async stream for the aggregator.
//! Fetching the export from object storage is a deployment concern and
//! happens before this process runs.
//!
//! # Examples
//!
//! ```no_run
//! use cbreport::data_loader::DataLoader;
//! use futures::StreamExt;
//!
//! # async fn example() -> cbreport::Result<()> {
//! let loader = DataLoader::new("data/billingReport.csv.gz");
//! let rows = loader.load_billing_rows();
//! tokio::pin!(rows);
//! while let Some(row) = rows.next().await {
//!     let row = row?;
//!     println!("{} {}", row.account_id, row.blended_cost);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::types::BillingRow;
use flate2::read::GzDecoder;
use futures::stream::Stream;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Rows buffered between the blocking CSV reader and the async consumer
const CHANNEL_CAPACITY: usize = 256;

/// Streams billing rows out of a local CSV export
pub struct DataLoader {
    path: PathBuf,
}

impl DataLoader {
    /// Create a loader for the given report file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The report file this loader reads
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream every billing row from the export
    ///
    /// Parsing runs on a blocking thread and rows are handed over through
    /// a bounded channel, so a large export never has to fit in memory at
    /// once. Any unparseable row surfaces as an `Err` item; a billing
    /// export with a malformed row must never produce a partial report.
    pub fn load_billing_rows(&self) -> impl Stream<Item = Result<BillingRow>> + use<> {
        let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            debug!("reading billing rows from {}", path.display());
            let reader = match open_report(&path) {
                Ok(reader) => reader,
                Err(e) => {
                    let _ = tx.blocking_send(Err(e));
                    return;
                }
            };

            let mut csv_reader = csv::Reader::from_reader(reader);
            for result in csv_reader.deserialize::<BillingRow>() {
                let item = result.map_err(Into::into);
                let failed = item.is_err();
                if tx.blocking_send(item).is_err() || failed {
                    // Receiver dropped or the run is aborting anyway
                    return;
                }
            }
        });

        ReceiverStream::new(rx)
    }
}

/// Open a plain or gzipped CSV export for reading
fn open_report(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;
    use tempfile::TempDir;

    const SAMPLE_CSV: &str = "\
lineItem/UsageAccountId,product/ProductName,product/usagetype,lineItem/LineItemType,lineItem/BlendedCost,lineItem/UsageStartDate,lineItem/UsageEndDate,lineItem/ResourceId,product/region,resourceTags/user:Owner,resourceTags/user:owner
111122223333,Amazon Elastic Compute Cloud,BoxUsage:m5.large,Usage,1.50,2024-03-01T00:00:00Z,2024-03-01T01:00:00Z,i-1234567890abcdef0,us-west-2,jdoe@ucsc.edu,
111122223333,Amazon Simple Storage Service,TimedStorage-ByteHrs,Usage,0.25,2024-03-01T00:00:00Z,2024-03-01T01:00:00Z,genomics-archive,us-west-2,,
";

    #[tokio::test]
    async fn test_load_plain_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("billingReport.csv");
        std::fs::write(&path, SAMPLE_CSV).unwrap();

        let loader = DataLoader::new(&path);
        let rows: Vec<BillingRow> = loader
            .load_billing_rows()
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].account_id, "111122223333");
        assert_eq!(rows[0].resource_id.as_deref(), Some("i-1234567890abcdef0"));
        assert_eq!(rows[0].owner_tag.as_deref(), Some("jdoe@ucsc.edu"));
        assert_eq!(rows[1].product_name, "Amazon Simple Storage Service");
        // Empty CSV cells come back as empty strings, not missing fields
        assert_eq!(rows[1].owner_tag.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_load_gzipped_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("billingReport.csv.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(SAMPLE_CSV.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let loader = DataLoader::new(&path);
        let rows: Vec<BillingRow> = loader
            .load_billing_rows()
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].blended_cost, "0.25");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let loader = DataLoader::new("/nonexistent/billingReport.csv");
        let results: Vec<_> = loader.load_billing_rows().collect().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
