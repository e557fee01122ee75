//! TF-IDF vectorizer + linear decision function.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use super::{Classifier, Label};
use crate::error::ModelError;

/// Runs of two or more word characters.
const TOKEN_PATTERN: &str = r"\b\w\w+\b";

fn default_true() -> bool {
    true
}

/// On-disk form of the vectorizer.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorizerArtifact {
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default)]
    pub sublinear_tf: bool,
}

/// Text → sparse, L2-normalized TF-IDF vector.
#[derive(Debug)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    lowercase: bool,
    sublinear_tf: bool,
    token_re: Regex,
}

impl TfidfVectorizer {
    pub fn from_artifact(artifact: VectorizerArtifact) -> Result<Self, ModelError> {
        if let Some((term, col)) = artifact
            .vocabulary
            .iter()
            .find(|(_, col)| **col >= artifact.idf.len())
        {
            return Err(ModelError::Shape(format!(
                "vocabulary term '{term}' maps to column {col} but idf has {} entries",
                artifact.idf.len()
            )));
        }

        let token_re =
            Regex::new(TOKEN_PATTERN).map_err(|e| ModelError::Shape(format!("token pattern: {e}")))?;

        Ok(Self {
            vocabulary: artifact.vocabulary,
            idf: artifact.idf,
            lowercase: artifact.lowercase,
            sublinear_tf: artifact.sublinear_tf,
            token_re,
        })
    }

    /// Number of feature columns.
    pub fn dimension(&self) -> usize {
        self.idf.len()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Vectorize `text`. Columns come back in ascending order so downstream
    /// sums are reproducible.
    pub fn transform(&self, text: &str) -> Result<BTreeMap<usize, f64>, ModelError> {
        if let Some(pos) = text.find('\0') {
            return Err(ModelError::NonText(format!(
                "NUL character at byte {pos}; input looks like binary data"
            )));
        }

        let normalized;
        let text = if self.lowercase {
            normalized = text.to_lowercase();
            normalized.as_str()
        } else {
            text
        };

        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in self.token_re.find_iter(text) {
            if let Some(&col) = self.vocabulary.get(token.as_str()) {
                *counts.entry(col).or_insert(0.0) += 1.0;
            }
        }

        for (col, value) in counts.iter_mut() {
            let tf = if self.sublinear_tf {
                1.0 + value.ln()
            } else {
                *value
            };
            *value = tf * self.idf[*col];
        }

        let norm = counts.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in counts.values_mut() {
                *value /= norm;
            }
        }

        Ok(counts)
    }
}

/// On-disk form of the linear model.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn decision(&self, features: &BTreeMap<usize, f64>) -> f64 {
        features
            .iter()
            .map(|(col, value)| self.coefficients[*col] * value)
            .sum::<f64>()
            + self.intercept
    }
}

/// The production classifier: vectorize, score, threshold at zero.
#[derive(Debug)]
pub struct LinearClassifier {
    vectorizer: TfidfVectorizer,
    model: LinearModel,
}

impl LinearClassifier {
    pub fn new(vectorizer: TfidfVectorizer, model: LinearModel) -> Result<Self, ModelError> {
        if vectorizer.dimension() != model.coefficients.len() {
            return Err(ModelError::Shape(format!(
                "vectorizer produces {} features but model has {} coefficients",
                vectorizer.dimension(),
                model.coefficients.len()
            )));
        }
        Ok(Self { vectorizer, model })
    }

    /// Load both artifacts from JSON files.
    pub fn load(vectorizer_path: &Path, model_path: &Path) -> Result<Self, ModelError> {
        let vectorizer: VectorizerArtifact = read_artifact("vectorizer", vectorizer_path)?;
        let model: LinearModel = read_artifact("model", model_path)?;
        Self::new(TfidfVectorizer::from_artifact(vectorizer)?, model)
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vectorizer.vocabulary_len()
    }

    /// Raw decision score; positive means phishing.
    pub fn score(&self, text: &str) -> Result<f64, ModelError> {
        let features = self.vectorizer.transform(text)?;
        Ok(self.model.decision(&features))
    }
}

impl Classifier for LinearClassifier {
    fn classify(&self, text: &str) -> Result<Label, ModelError> {
        if self.score(text)? > 0.0 {
            Ok(Label::Phishing)
        } else {
            Ok(Label::Legitimate)
        }
    }
}

fn read_artifact<T: serde::de::DeserializeOwned>(
    artifact: &str,
    path: &Path,
) -> Result<T, ModelError> {
    let load_err = |reason: String| ModelError::Load {
        artifact: artifact.to_string(),
        path: path.display().to_string(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| load_err(e.to_string()))
}
