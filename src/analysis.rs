//! Request-level analysis: emotion category plus stress score.
//!
//! The [`Analyzer`] owns both classifiers, which are constructed once at
//! startup. A request trims its text, short-circuits when nothing is left,
//! and otherwise runs the emotion and sentiment models back to back.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, trace};

use crate::categories::{self, Category, CategoryScores};
use crate::classifier::{ClassifierError, TextClassifier};
use crate::stress::{self, SentimentDistribution};

/// Stress reported when there is no text to analyze
pub const FALLBACK_STRESS: u8 = 50;

/// Unicode whitespace plus the ASCII separators U+001C..=U+001F
fn is_blank(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Errors that can occur while analyzing a request
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Classifier '{model}' failed: {source}")]
    Classifier {
        model: String,
        #[source]
        source: ClassifierError,
    },

    #[error("Sentiment model '{model}' returned {count} labels, expected 3")]
    SentimentShape { model: String, count: usize },

    #[error("Analysis worker failed: {0}")]
    Worker(String),
}

/// Outcome of analyzing one piece of text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub emotion: Category,
    pub stress: u8,
    /// `None` on the empty-input path, serialized as `{}`
    #[serde(serialize_with = "serialize_scores")]
    pub scores: Option<CategoryScores>,
}

impl AnalysisResult {
    /// Result for empty or whitespace-only input
    pub fn fallback() -> Self {
        Self {
            emotion: Category::Neutral,
            stress: FALLBACK_STRESS,
            scores: None,
        }
    }
}

fn serialize_scores<S: Serializer>(
    scores: &Option<CategoryScores>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match scores {
        Some(scores) => scores.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

/// Runs both classifiers and post-processes their output
pub struct Analyzer {
    emotion: Box<dyn TextClassifier>,
    sentiment: Box<dyn TextClassifier>,
}

impl Analyzer {
    pub fn new(emotion: Box<dyn TextClassifier>, sentiment: Box<dyn TextClassifier>) -> Self {
        Self { emotion, sentiment }
    }

    pub fn emotion_model(&self) -> &str {
        self.emotion.name()
    }

    pub fn sentiment_model(&self) -> &str {
        self.sentiment.name()
    }

    /// Analyze raw request text; `None` is treated as empty.
    pub fn analyze(&self, raw_text: Option<&str>) -> Result<AnalysisResult, AnalysisError> {
        let text = raw_text.unwrap_or("").trim_matches(is_blank);
        if text.is_empty() {
            debug!("Empty input, returning fallback result");
            return Ok(AnalysisResult::fallback());
        }

        let emotions = self
            .emotion
            .classify(text)
            .map_err(|source| AnalysisError::Classifier {
                model: self.emotion.name().to_string(),
                source,
            })?;
        if let Some((label, p)) = emotions.top() {
            trace!("Top emotion label: {} ({:.3})", label, p);
        }
        let (emotion, scores) = categories::aggregate(emotions.iter());

        let sentiment = self
            .sentiment
            .classify(text)
            .map_err(|source| AnalysisError::Classifier {
                model: self.sentiment.name().to_string(),
                source,
            })?;
        let distribution = SentimentDistribution::from_indexed(&sentiment.probabilities())
            .ok_or_else(|| AnalysisError::SentimentShape {
                model: self.sentiment.name().to_string(),
                count: sentiment.len(),
            })?;
        let stress = stress::estimate(&distribution);

        debug!(
            "Analyzed {} chars: emotion={}, stress={}",
            text.chars().count(),
            emotion,
            stress
        );

        Ok(AnalysisResult {
            emotion,
            stress,
            scores: Some(scores),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::LabelDistribution;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Classifier returning a fixed distribution and counting calls
    struct FixedClassifier {
        entries: Vec<(String, f64)>,
        calls: Arc<AtomicUsize>,
    }

    impl FixedClassifier {
        fn boxed(entries: &[(&str, f64)], calls: Arc<AtomicUsize>) -> Box<dyn TextClassifier> {
            Box::new(Self {
                entries: entries.iter().map(|(l, p)| (l.to_string(), *p)).collect(),
                calls,
            })
        }
    }

    impl TextClassifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        fn classify(&self, _text: &str) -> Result<LabelDistribution, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LabelDistribution::new(self.entries.clone()))
        }
    }

    struct FailingClassifier;

    impl TextClassifier for FailingClassifier {
        fn name(&self) -> &str {
            "failing"
        }

        fn classify(&self, _text: &str) -> Result<LabelDistribution, ClassifierError> {
            Err(ClassifierError::InferenceError("provider unavailable".to_string()))
        }
    }

    fn analyzer(
        emotions: &[(&str, f64)],
        sentiment: &[(&str, f64)],
    ) -> (Analyzer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let analyzer = Analyzer::new(
            FixedClassifier::boxed(emotions, calls.clone()),
            FixedClassifier::boxed(sentiment, calls.clone()),
        );
        (analyzer, calls)
    }

    #[test]
    fn test_empty_input_skips_models() {
        let (analyzer, calls) = analyzer(&[("joy", 1.0)], &[("0", 1.0), ("1", 0.0), ("2", 0.0)]);

        for text in [
            None,
            Some(""),
            Some("   "),
            Some("\n\t "),
            Some("\u{1c}\u{1d}\u{1e}\u{1f}"),
            Some(" \u{1f}\u{a0}\u{3000}\n"),
        ] {
            let result = analyzer.analyze(text).unwrap();
            assert_eq!(result, AnalysisResult::fallback());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_separator_chars_trimmed_from_edges() {
        assert_eq!("\u{1c} hi \u{1f}".trim_matches(is_blank), "hi");
        assert_eq!("a\u{1e}b".trim_matches(is_blank), "a\u{1e}b");
        assert!(!is_blank('\u{1b}'));
        assert!(!is_blank('\u{200b}'));
    }

    #[test]
    fn test_fallback_serialization() {
        let json = serde_json::to_string(&AnalysisResult::fallback()).unwrap();
        assert_eq!(json, r#"{"emotion":"Neutral","stress":50,"scores":{}}"#);
    }

    #[test]
    fn test_normal_path() {
        let (analyzer, calls) = analyzer(
            &[("joy", 0.6), ("sadness", 0.4)],
            &[("LABEL_0", 1.0), ("LABEL_1", 0.0), ("LABEL_2", 0.0)],
        );

        let result = analyzer.analyze(Some("  what a day  ")).unwrap();
        assert_eq!(result.emotion, Category::Happy);
        assert_eq!(result.stress, 80);

        let scores = result.scores.unwrap();
        assert_eq!(scores.get(Category::Happy), 0.6);
        assert_eq!(scores.get(Category::Sad), 0.4);
        assert_eq!(scores.get(Category::Neutral), 0.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_normal_path_serialization() {
        let (analyzer, _) = analyzer(
            &[("neutral", 1.0)],
            &[("negative", 0.0), ("neutral", 1.0), ("positive", 0.0)],
        );

        let result = analyzer.analyze(Some("ok")).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "emotion": "Neutral",
                "stress": 50,
                "scores": {"Happy": 0.0, "Sad": 0.0, "Angry": 0.0, "Anxious": 0.0, "Neutral": 1.0}
            })
        );
    }

    #[test]
    fn test_classifier_failure_propagates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let analyzer = Analyzer::new(
            Box::new(FailingClassifier),
            FixedClassifier::boxed(&[("0", 1.0), ("1", 0.0), ("2", 0.0)], calls),
        );

        let err = analyzer.analyze(Some("hello")).unwrap_err();
        assert!(matches!(err, AnalysisError::Classifier { ref model, .. } if model == "failing"));
    }

    #[test]
    fn test_sentiment_must_have_three_labels() {
        let (analyzer, _) = analyzer(&[("joy", 1.0)], &[("negative", 0.5), ("positive", 0.5)]);

        let err = analyzer.analyze(Some("hello")).unwrap_err();
        assert!(matches!(err, AnalysisError::SentimentShape { count: 2, .. }));
    }
}
