//! Phishing classifier.
//!
//! The rest of the crate only sees the [`Classifier`] trait. The concrete
//! implementation is a TF-IDF vectorizer feeding a binary linear model, both
//! loaded once from JSON artifacts at startup (see [`linear`]).

pub mod linear;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::ModelError;

pub use linear::{LinearClassifier, LinearModel, TfidfVectorizer};

/// Binary classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Legitimate,
    Phishing,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legitimate => "legitimate",
            Self::Phishing => "phishing",
        }
    }

    /// Numeric class value as the model emits it: 0 legitimate, 1 phishing.
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Legitimate => 0.0,
            Self::Phishing => 1.0,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text → label. Implementations are read-only after construction and
/// shared between the poller and the HTTP endpoint.
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Label, ModelError>;
}

/// Load the vectorizer and model artifacts named in `config`.
pub fn load_classifier(config: &ModelConfig) -> Result<Arc<dyn Classifier>, ModelError> {
    let classifier = LinearClassifier::load(&config.vectorizer_path, &config.model_path)?;
    tracing::info!(
        vocabulary = classifier.vocabulary_len(),
        model = %config.model_path.display(),
        "Loaded phishing classifier"
    );
    Ok(Arc::new(classifier))
}
