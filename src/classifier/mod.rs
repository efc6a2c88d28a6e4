//! Text classification providers.
//!
//! A provider turns text into a probability distribution over its model's
//! labels. The service runs two of them: a fine-grained emotion classifier and
//! a three-class sentiment classifier. Both sit behind [`TextClassifier`] so the
//! request path never depends on the inference runtime.

#[cfg(feature = "onnx")]
mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;

use thiserror::Error;

use crate::models::ModelFiles;

/// Maximum number of tokens fed to a model; longer inputs are truncated
pub const MAX_TOKENS: usize = 256;

/// Errors that can occur while loading or running a classifier
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Failed to load model: {0}")]
    ModelLoadError(String),

    #[error("Tokenizer error: {0}")]
    TokenizerError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Unexpected model output: {0}")]
    InvalidOutput(String),

    #[error("Feature not enabled: ONNX inference requires the 'onnx' feature")]
    FeatureNotEnabled,
}

/// Probabilities over a model's labels, in the model's label order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelDistribution {
    entries: Vec<(String, f64)>,
}

impl LabelDistribution {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    /// Pair each label with the probability at the same index
    pub fn from_labels(labels: &[String], probs: &[f64]) -> Self {
        let entries = labels
            .iter()
            .cloned()
            .zip(probs.iter().copied())
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(label, probability)` pairs in label order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.entries.iter().map(|(label, p)| (label.as_str(), *p))
    }

    /// Probabilities only, in label order
    pub fn probabilities(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, p)| *p).collect()
    }

    /// Label with the highest probability, if any
    pub fn top(&self) -> Option<(&str, f64)> {
        self.iter()
            .fold(None, |best: Option<(&str, f64)>, (label, p)| match best {
                Some((_, best_p)) if best_p >= p => best,
                _ => Some((label, p)),
            })
    }
}

/// A text classifier producing a label distribution.
///
/// Implementations must be usable from several request threads at once.
pub trait TextClassifier: Send + Sync {
    /// Short name for logs (usually the model id)
    fn name(&self) -> &str;

    /// Classify `text`, truncating it to the model's token limit.
    fn classify(&self, text: &str) -> Result<LabelDistribution, ClassifierError>;
}

/// Options for loading a classifier from model files
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Name used in logs
    pub name: String,
    /// Token limit applied by truncation
    pub max_tokens: usize,
    /// Number of threads for ONNX inference
    pub n_threads: usize,
}

impl ClassifierConfig {
    pub fn new(name: impl Into<String>, n_threads: usize) -> Self {
        Self {
            name: name.into(),
            max_tokens: MAX_TOKENS,
            n_threads,
        }
    }
}

/// Load the default classifier implementation for a set of model files.
#[cfg(feature = "onnx")]
pub fn load_classifier(
    files: &ModelFiles,
    config: ClassifierConfig,
) -> Result<Box<dyn TextClassifier>, ClassifierError> {
    Ok(Box::new(OnnxClassifier::load(files, config)?))
}

// Stub implementation when feature is not enabled
#[cfg(not(feature = "onnx"))]
pub fn load_classifier(
    _files: &ModelFiles,
    _config: ClassifierConfig,
) -> Result<Box<dyn TextClassifier>, ClassifierError> {
    Err(ClassifierError::FeatureNotEnabled)
}

/// Numerically stable softmax.
///
/// Computed in `f32` like the model logits, then widened to `f64`.
pub fn softmax(logits: &[f32]) -> Vec<f64> {
    if logits.is_empty() {
        return Vec::new();
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();

    exps.into_iter().map(|e| (e / sum) as f64).collect()
}

/// Read `id2label` from a HuggingFace `config.json` document.
///
/// Labels are returned in index order. Missing indices, or a missing
/// `id2label` table, fall back to the stringified index.
pub fn labels_from_config(config: &serde_json::Value, num_labels: usize) -> Vec<String> {
    let id2label = config.get("id2label").and_then(|v| v.as_object());

    (0..num_labels)
        .map(|i| {
            id2label
                .and_then(|map| map.get(&i.to_string()))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| i.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let total: f64 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_large_logits() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!(probs.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_softmax_empty() {
        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn test_labels_from_config() {
        let config = json!({
            "id2label": { "0": "admiration", "1": "amusement", "2": "anger" }
        });
        assert_eq!(
            labels_from_config(&config, 3),
            vec!["admiration", "amusement", "anger"]
        );
    }

    #[test]
    fn test_labels_fall_back_to_indices() {
        assert_eq!(labels_from_config(&json!({}), 3), vec!["0", "1", "2"]);

        let partial = json!({ "id2label": { "1": "neutral" } });
        assert_eq!(labels_from_config(&partial, 3), vec!["0", "neutral", "2"]);
    }

    #[test]
    fn test_label_distribution() {
        let labels = vec!["joy".to_string(), "sadness".to_string()];
        let dist = LabelDistribution::from_labels(&labels, &[0.25, 0.75]);

        assert_eq!(dist.len(), 2);
        assert_eq!(dist.probabilities(), vec![0.25, 0.75]);
        assert_eq!(dist.top(), Some(("sadness", 0.75)));
        assert_eq!(
            dist.iter().collect::<Vec<_>>(),
            vec![("joy", 0.25), ("sadness", 0.75)]
        );
        assert!(LabelDistribution::default().top().is_none());
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_stub_loader() {
        let files = ModelFiles::in_dir(std::path::Path::new("/nonexistent"));
        let result = load_classifier(&files, ClassifierConfig::new("stub", 1));
        assert!(matches!(result, Err(ClassifierError::FeatureNotEnabled)));
    }
}
