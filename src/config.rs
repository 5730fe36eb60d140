//! Report configuration
//!
//! Configuration lives in a JSON file keyed by platform, mirroring the
//! shape the reporting deployment has always shipped with: account
//! id-to-name maps, the managed (compliance-enforced) subset, and the
//! delivery addressing for the rendered reports.

use crate::error::{ReportError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Account name rendered for accounts missing from the configured map
pub const UNKNOWN_ACCOUNT: &str = "(unknown)";

fn default_warning_threshold() -> i64 {
    200
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    aws: AwsSection,
}

#[derive(Debug, Deserialize)]
struct AwsSection {
    accounts: BTreeMap<String, String>,
    #[serde(default)]
    compliance: ComplianceSection,
    from: String,
    recipients: Vec<String>,
    #[serde(default = "default_warning_threshold")]
    warning_threshold: i64,
}

#[derive(Debug, Default, Deserialize)]
struct ComplianceSection {
    #[serde(default)]
    accounts: BTreeMap<String, String>,
}

/// Loaded report configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// All known accounts, id to name
    pub accounts: BTreeMap<String, String>,
    /// Accounts subject to compliance enforcement, id to name
    pub managed_accounts: BTreeMap<String, String>,
    /// Sender address for the rendered reports
    pub from: String,
    /// Bulk report recipients
    pub recipients: Vec<String>,
    /// Daily cost above which a line is flagged as unusual
    pub warning_threshold: i64,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ReportError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let file: ConfigFile = serde_json::from_str(&raw)?;
        Ok(Self::from_section(file.aws))
    }

    fn from_section(section: AwsSection) -> Self {
        Self {
            accounts: section.accounts,
            managed_accounts: section.compliance.accounts,
            from: section.from,
            recipients: section.recipients,
            warning_threshold: section.warning_threshold,
        }
    }

    /// True when the account id is subject to compliance enforcement
    pub fn is_managed(&self, account_id: &str) -> bool {
        self.managed_accounts.contains_key(account_id)
    }

    /// Human-readable name for an account id
    pub fn account_name(&self, account_id: &str) -> &str {
        self.accounts
            .get(account_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_ACCOUNT)
    }

    /// Names of all managed accounts
    pub fn managed_account_names(&self) -> Vec<String> {
        self.managed_accounts.values().cloned().collect()
    }
}
