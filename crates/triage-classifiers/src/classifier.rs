//! Classifier trait

use async_trait::async_trait;
use triage_core::{Classification, Result};

/// Trait for all ticket classification engines
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the given ticket text.
    ///
    /// Implementations stamp `model_name` with their own engine identifier
    /// and must uphold the output invariants: category is one of the three
    /// taxonomy variants and confidence lies in [0.0, 1.0].
    async fn classify(&self, text: &str) -> Result<Classification>;

    /// Get the classifier name
    fn name(&self) -> &str;
}
