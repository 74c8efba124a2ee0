//! Triage Classifiers
//!
//! Classification engines for support tickets and the dispatch policy that
//! selects between them.
//!
//! Two engines are provided:
//! - [`RemoteClassifier`]: the primary path, an OpenAI-compatible chat
//!   completions call constrained to a fixed JSON verdict schema
//! - [`KeywordClassifier`]: the fallback path, a deterministic lexicon
//!   scorer with zero external dependencies
//!
//! [`ClassifierDispatcher`] ties them together: it tries the primary path
//! when the circuit breaker allows it and recovers every primary failure by
//! falling back locally, so callers always receive a classification.

pub mod classifier;
pub mod dispatch;
pub mod keyword;
pub mod remote;

pub use classifier::Classifier;
pub use dispatch::{BreakerConfig, BreakerState, CircuitBreaker, ClassifierDispatcher};
pub use keyword::{KeywordClassifier, KEYWORD_MODEL_NAME};
pub use remote::{RemoteClassifier, RemoteConfig};
