//! Text emotion and stress analysis service.
//!
//! Two pretrained classifiers run on each request: a fine-grained emotion
//! model whose labels are folded onto five categories, and a three-class
//! sentiment model whose output drives a 0-100 stress score.

pub mod analysis;
pub mod categories;
pub mod classifier;
pub mod config;
pub mod models;
pub mod server;
pub mod stress;

pub use analysis::{AnalysisError, AnalysisResult, Analyzer};
pub use categories::{Category, CategoryScores};
pub use classifier::{ClassifierError, LabelDistribution, TextClassifier};
pub use config::Config;
pub use stress::SentimentDistribution;
