//! Keyword fallback classifier
//!
//! Lexicon-based classifier used when the remote backend is unavailable.
//! Deterministic and purely local: the same text always produces the same
//! category and confidence.
//!
//! Matching policy: case-insensitive substring matches, counting *distinct*
//! lexicon entries per category so a repeated word scores once.

use crate::classifier::Classifier;
use aho_corasick::AhoCorasick;
use std::collections::HashSet;
use std::time::Instant;
use triage_core::{Category, Classification, Error, Result};

/// Engine identifier stamped on every fallback classification
pub const KEYWORD_MODEL_NAME: &str = "keyword-fallback-v1";

/// Confidence assigned when no lexicon entry matches (or on a tie)
const ZERO_MATCH_CONFIDENCE: f64 = 0.3;

/// Confidence cap; the fallback never approaches AI-path certainty
const MAX_CONFIDENCE: f64 = 0.8;

const TECHNICAL_KEYWORDS: &[&str] = &[
    "error",
    "crash",
    "bug",
    "system",
    "software",
    "hardware",
    "server",
    "database",
    "application",
    "platform",
    "technical",
    "computer",
    "network",
    "installation",
    "update",
    "memory",
];

const BILLING_KEYWORDS: &[&str] = &[
    "invoice",
    "billing",
    "payment",
    "charge",
    "refund",
    "price",
    "cost",
    "fee",
    "subscription",
    "overcharge",
    "bill",
    "money",
    "credit",
    "debit",
    "transaction",
    "purchase",
];

const GENERAL_KEYWORDS: &[&str] = &[
    "question",
    "information",
    "help",
    "support",
    "inquiry",
    "feedback",
    "guidance",
    "feature request",
];

/// One compiled lexicon per category
struct Lexicon {
    category: Category,
    matcher: AhoCorasick,
}

impl Lexicon {
    fn new(category: Category, keywords: &[&str]) -> Result<Self> {
        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(keywords)
            .map_err(|e| {
                Error::classifier(format!(
                    "failed to build {} keyword matcher: {e}",
                    category.as_str()
                ))
            })?;

        Ok(Self { category, matcher })
    }

    /// Count distinct lexicon entries appearing in the text
    fn distinct_matches(&self, text: &str) -> usize {
        let mut seen = HashSet::new();
        for m in self.matcher.find_iter(text) {
            seen.insert(m.pattern().as_usize());
        }
        seen.len()
    }
}

/// Deterministic lexicon classifier for the fallback path
pub struct KeywordClassifier {
    name: String,
    lexicons: Vec<Lexicon>,
}

impl KeywordClassifier {
    pub fn new() -> Result<Self> {
        Self::with_name("keyword-fallback")
    }

    pub fn with_name(name: impl Into<String>) -> Result<Self> {
        let lexicons = vec![
            Lexicon::new(Category::Technical, TECHNICAL_KEYWORDS)?,
            Lexicon::new(Category::Billing, BILLING_KEYWORDS)?,
            Lexicon::new(Category::General, GENERAL_KEYWORDS)?,
        ];

        Ok(Self {
            name: name.into(),
            lexicons,
        })
    }

    /// Score the text against every lexicon and pick the winner.
    ///
    /// Ties for the highest count, and the all-zero case, resolve to
    /// `General` at the zero-match confidence: a tied signal is an
    /// ambiguous signal, so the curve only rewards a strict winner.
    fn score(&self, text: &str) -> (Category, f64) {
        let counts: Vec<(Category, usize)> = self
            .lexicons
            .iter()
            .map(|lexicon| (lexicon.category, lexicon.distinct_matches(text)))
            .collect();

        let best = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
        let leaders = counts.iter().filter(|(_, n)| *n == best).count();

        if best == 0 || leaders > 1 {
            return (Category::General, ZERO_MATCH_CONFIDENCE);
        }

        let (winner, _) = counts
            .into_iter()
            .find(|(_, n)| *n == best)
            .expect("non-empty counts");

        (winner, confidence_for(best))
    }
}

/// Monotonic confidence curve: 0.3 base plus 0.1 per distinct match,
/// capped at 0.8.
fn confidence_for(distinct_matches: usize) -> f64 {
    (ZERO_MATCH_CONFIDENCE + 0.1 * distinct_matches as f64).min(MAX_CONFIDENCE)
}

#[async_trait::async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        let start = Instant::now();

        let (category, confidence) = self.score(text);

        Ok(
            Classification::new(category, confidence, None, KEYWORD_MODEL_NAME)
                .with_processing_time(start.elapsed().as_millis() as u64),
        )
    }

    fn name(&self) -> &str {
        &self.name
    }
}
