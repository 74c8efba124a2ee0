//! Core types for the triage service

use crate::category::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum summary length in characters; longer model output is truncated.
pub const MAX_SUMMARY_CHARS: usize = 150;

/// A submitted customer support request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique ticket identifier
    pub id: i64,

    /// Optional subject line
    pub subject: Option<String>,

    /// Ticket body content
    pub body: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Concatenated subject and body for classification
    pub fn full_text(&self) -> String {
        match &self.subject {
            Some(subject) => format!("{}\n\n{}", subject, self.body),
            None => self.body.clone(),
        }
    }
}

/// A ticket before it has been assigned an identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDraft {
    /// Optional subject line
    pub subject: Option<String>,

    /// Ticket body content
    pub body: String,
}

impl TicketDraft {
    /// Create a new draft
    pub fn new(subject: Option<String>, body: impl Into<String>) -> Self {
        Self {
            subject,
            body: body.into(),
        }
    }

    /// Concatenated subject and body for classification
    pub fn full_text(&self) -> String {
        match &self.subject {
            Some(subject) => format!("{}\n\n{}", subject, self.body),
            None => self.body.clone(),
        }
    }
}

/// The structured output of classifying a ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    /// Assigned category
    pub category: Category,

    /// Confidence score, always within [0.0, 1.0]
    pub confidence_score: f64,

    /// One-sentence summary of the issue, when the engine can produce one
    pub summary: Option<String>,

    /// Identifier of the engine that produced this result
    pub model_name: String,

    /// Wall-clock classification duration in milliseconds
    pub processing_time_ms: u64,
}

impl Classification {
    /// Create a new classification, clamping confidence and truncating the
    /// summary so the invariants hold regardless of the source.
    pub fn new(
        category: Category,
        confidence_score: f64,
        summary: Option<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            category,
            confidence_score: clamp_confidence(confidence_score),
            summary: summary.map(|s| truncate_summary(&s)).filter(|s| !s.is_empty()),
            model_name: model_name.into(),
            processing_time_ms: 0,
        }
    }

    /// Stamp the measured processing time
    pub fn with_processing_time(mut self, elapsed_ms: u64) -> Self {
        self.processing_time_ms = elapsed_ms;
        self
    }
}

/// Clamp a confidence value into [0.0, 1.0]. Non-finite input maps to 0.0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Truncate a summary to [`MAX_SUMMARY_CHARS`] characters, appending an
/// ellipsis when content was dropped.
pub fn truncate_summary(summary: &str) -> String {
    let summary = summary.trim();
    if summary.chars().count() <= MAX_SUMMARY_CHARS {
        return summary.to_string();
    }

    let truncated: String = summary.chars().take(MAX_SUMMARY_CHARS - 3).collect();
    format!("{}...", truncated.trim_end())
}
