//! Owner-tag classification
//!
//! Tag values attached to cloud resources are free-form: they may hold an
//! email address, a team marker like `Shared-Infra`, an administrative
//! alias, or nothing at all. Downstream grouping depends on the exact
//! precedence between those cases, so the classification is expressed as
//! an ordered rule list evaluated in a fixed sequence, each rule testable
//! on its own.

use serde::{Deserialize, Serialize};

/// Administrative tag value that is rerouted rather than mailed directly
const CLUSTER_ADMIN_TAG: &str = "cluster-admin@soe.ucsc.edu";

/// Delivery alias the administrative tag reroutes to
const CLUSTER_ADMIN_REROUTE: &str = "cluster-support@ucsc.edu";

/// Recipient identity resolved from a resource's owner tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerResolution {
    /// Tag resolved to a deliverable email address
    Email(String),
    /// Tag marks the resource as shared infrastructure
    Shared,
    /// No usable tag value
    Unowned,
}

impl OwnerResolution {
    /// The resolved email address, if any
    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Email(addr) => Some(addr),
            _ => None,
        }
    }

    /// True when the tag marked the resource as shared
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared)
    }
}

type Rule = fn(&str) -> Option<OwnerResolution>;

/// Classification rules in precedence order. First match wins, and the
/// order is load-bearing: the administrative reroute must run before the
/// email-shape check or the alias would be delivered to directly.
const RULES: &[Rule] = &[reroute_rule, email_shape_rule, shared_rule];

fn reroute_rule(value: &str) -> Option<OwnerResolution> {
    (value == CLUSTER_ADMIN_TAG).then(|| OwnerResolution::Email(CLUSTER_ADMIN_REROUTE.to_string()))
}

fn email_shape_rule(value: &str) -> Option<OwnerResolution> {
    looks_like_email(value).then(|| OwnerResolution::Email(value.to_string()))
}

fn shared_rule(value: &str) -> Option<OwnerResolution> {
    value
        .to_ascii_lowercase()
        .contains("shared")
        .then_some(OwnerResolution::Shared)
}

/// An "@" with a "." somewhere after it is treated as an email address
fn looks_like_email(value: &str) -> bool {
    match value.find('@') {
        Some(at) => value[at + 1..].contains('.'),
        None => false,
    }
}

/// Classify a single tag value
pub fn classify_tag(value: &str) -> OwnerResolution {
    for rule in RULES {
        if let Some(resolution) = rule(value) {
            return resolution;
        }
    }
    OwnerResolution::Unowned
}

/// Resolve an owner from tag values in precedence order
///
/// The first non-empty value is classified; empty and absent values fall
/// through to [`OwnerResolution::Unowned`].
pub fn resolve_owner<'a, I>(values: I) -> OwnerResolution
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    for value in values.into_iter().flatten() {
        if !value.is_empty() {
            return classify_tag(value);
        }
    }
    OwnerResolution::Unowned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reroute_rule() {
        assert_eq!(
            classify_tag("cluster-admin@soe.ucsc.edu"),
            OwnerResolution::Email("cluster-support@ucsc.edu".to_string())
        );
        // Near-misses fall through to the email-shape rule instead
        assert_eq!(
            classify_tag("cluster-admin@ucsc.edu"),
            OwnerResolution::Email("cluster-admin@ucsc.edu".to_string())
        );
    }

    #[test]
    fn test_email_shape_rule() {
        assert_eq!(
            classify_tag("jdoe@ucsc.edu"),
            OwnerResolution::Email("jdoe@ucsc.edu".to_string())
        );
        // An "@" without a following "." is not an email
        assert_eq!(classify_tag("jdoe@localhost"), OwnerResolution::Unowned);
        assert_eq!(classify_tag("not-an-email"), OwnerResolution::Unowned);
    }

    #[test]
    fn test_shared_rule() {
        assert_eq!(classify_tag("Shared-Team-X"), OwnerResolution::Shared);
        assert_eq!(classify_tag("SHARED"), OwnerResolution::Shared);
        assert_eq!(classify_tag("genomics-shared-cache"), OwnerResolution::Shared);
    }

    #[test]
    fn test_email_beats_shared() {
        // A deliverable address wins even when it mentions "shared"
        assert_eq!(
            classify_tag("shared-services@ucsc.edu"),
            OwnerResolution::Email("shared-services@ucsc.edu".to_string())
        );
    }

    #[test]
    fn test_resolve_owner_precedence() {
        // First non-empty value wins
        let resolution = resolve_owner([None, Some(""), Some("jdoe@ucsc.edu"), Some("other@x.com")]);
        assert_eq!(
            resolution,
            OwnerResolution::Email("jdoe@ucsc.edu".to_string())
        );
    }

    #[test]
    fn test_resolve_owner_empty() {
        assert_eq!(resolve_owner([None, None]), OwnerResolution::Unowned);
        assert_eq!(resolve_owner([Some(""), None]), OwnerResolution::Unowned);
        let unowned = resolve_owner([None::<&str>]);
        assert!(!unowned.is_shared());
        assert_eq!(unowned.email(), None);
    }
}
