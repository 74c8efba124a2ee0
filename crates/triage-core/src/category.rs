//! Ticket category taxonomy
//!
//! Every classification in the system carries exactly one of three
//! categories. Upstream sources (LLM output, dataset queue names) emit
//! free-form labels; `Category::normalize` is the total mapping that keeps
//! the closed-enum invariant true at every boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Support ticket category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// IT issues, software problems, hardware failures, system errors
    Technical,
    /// Payment issues, invoices, charges, refunds, pricing questions
    Billing,
    /// Product inquiries, feature requests, general customer questions
    General,
}

/// Synonym table consulted when a raw label is not a canonical name.
/// First containment match wins; entries are checked in order.
const SYNONYMS: &[(&str, Category)] = &[
    ("technical", Category::Technical),
    ("it support", Category::Technical),
    ("bug", Category::Technical),
    ("outage", Category::Technical),
    ("incident", Category::Technical),
    ("billing", Category::Billing),
    ("payment", Category::Billing),
    ("finance", Category::Billing),
    ("invoice", Category::Billing),
    ("refund", Category::Billing),
];

impl Category {
    /// All categories, in display order
    pub const ALL: [Category; 3] = [Category::Technical, Category::Billing, Category::General];

    /// Canonical lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Billing => "billing",
            Self::General => "general",
        }
    }

    /// Map an arbitrary upstream label onto the closed taxonomy.
    ///
    /// Total: exact case-insensitive match against the canonical names
    /// first, then a fixed synonym table by containment, then `General`.
    pub fn normalize(raw: &str) -> Self {
        let label = raw.trim().to_lowercase();

        match label.as_str() {
            "technical" => return Self::Technical,
            "billing" => return Self::Billing,
            "general" => return Self::General,
            _ => {}
        }

        for (needle, category) in SYNONYMS {
            if label.contains(needle) {
                return *category;
            }
        }

        Self::General
    }

    /// Map dataset queue identifiers to categories.
    ///
    /// Queues containing "technical" or "it support" map to `Technical`,
    /// "billing" or "payment" to `Billing`, everything else to `General`.
    pub fn from_queue(queue: &str) -> Self {
        let queue = queue.to_lowercase();

        if queue.contains("technical") || queue.contains("it support") {
            Self::Technical
        } else if queue.contains("billing") || queue.contains("payment") {
            Self::Billing
        } else {
            Self::General
        }
    }
}

/// Convert dataset priority levels to confidence scores.
///
/// Critical and high priority tickets carry more reliable labels in the
/// source dataset; unknown values get the medium default.
pub fn priority_confidence(priority: &str) -> f64 {
    match priority.to_lowercase().as_str() {
        "critical" | "high" => 0.9,
        "medium" => 0.7,
        "low" => 0.5,
        _ => 0.7,
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    /// Parsing never fails; unknown labels normalize to `General`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::normalize(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn canonical_labels_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::normalize(category.as_str()), category);
        }
    }

    #[test]
    fn normalize_is_case_insensitive() {
        assert_eq!(Category::normalize("TECHNICAL"), Category::Technical);
        assert_eq!(Category::normalize("Billing"), Category::Billing);
        assert_eq!(Category::normalize("  general  "), Category::General);
    }

    #[test]
    fn normalize_maps_synonyms() {
        assert_eq!(Category::normalize("Billing Issue"), Category::Billing);
        assert_eq!(Category::normalize("payment dispute"), Category::Billing);
        assert_eq!(Category::normalize("finance"), Category::Billing);
        assert_eq!(Category::normalize("bug report"), Category::Technical);
        assert_eq!(Category::normalize("Service Outage"), Category::Technical);
    }

    #[test]
    fn normalize_defaults_to_general() {
        assert_eq!(Category::normalize(""), Category::General);
        assert_eq!(Category::normalize("spam"), Category::General);
        assert_eq!(Category::normalize("???"), Category::General);
    }

    #[test]
    fn queue_mapping() {
        assert_eq!(Category::from_queue("Technical Support"), Category::Technical);
        assert_eq!(Category::from_queue("IT Support Desk"), Category::Technical);
        assert_eq!(Category::from_queue("Billing and Payments"), Category::Billing);
        assert_eq!(Category::from_queue("Customer Service"), Category::General);
    }

    #[test]
    fn priority_mapping() {
        assert_eq!(priority_confidence("critical"), 0.9);
        assert_eq!(priority_confidence("High"), 0.9);
        assert_eq!(priority_confidence("medium"), 0.7);
        assert_eq!(priority_confidence("low"), 0.5);
        assert_eq!(priority_confidence("unknown"), 0.7);
    }

    proptest! {
        #[test]
        fn normalize_is_total(raw in ".*") {
            // Any string, any casing or punctuation, lands on one of the
            // three variants without panicking.
            let category = Category::normalize(&raw);
            prop_assert!(Category::ALL.contains(&category));
        }
    }
}
