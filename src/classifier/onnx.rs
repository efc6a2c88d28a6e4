//! Sequence-classification provider backed by ONNX Runtime.
//!
//! Expects a HuggingFace-style model export: `tokenizer.json`, `config.json`
//! (for `id2label`) and an ONNX graph taking `input_ids` / `attention_mask`
//! (and optionally `token_type_ids`) and returning logits of shape
//! `[batch, num_labels]`.

use std::path::Path;
use std::sync::Mutex;

use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use tokenizers::{Tokenizer, TruncationParams};

use super::{
    labels_from_config, softmax, ClassifierConfig, ClassifierError, LabelDistribution,
    TextClassifier,
};
use crate::models::ModelFiles;

/// Text classifier running a tokenizer plus an ONNX session
pub struct OnnxClassifier {
    name: String,
    tokenizer: Tokenizer,
    session: Mutex<Session>,
    /// Parsed config.json, read for `id2label`
    config_json: serde_json::Value,
    uses_token_type_ids: bool,
}

impl OnnxClassifier {
    /// Load the tokenizer, label table and ONNX session
    pub fn load(files: &ModelFiles, config: ClassifierConfig) -> Result<Self, ClassifierError> {
        if let Some(path) = files.missing().first() {
            return Err(ClassifierError::ModelLoadError(format!(
                "Model file not found at {:?}",
                path
            )));
        }

        let tokenizer = load_tokenizer(&files.tokenizer, config.max_tokens)?;

        let config_text = std::fs::read_to_string(&files.config)
            .map_err(|e| ClassifierError::ModelLoadError(e.to_string()))?;
        let config_json: serde_json::Value = serde_json::from_str(&config_text)
            .map_err(|e| ClassifierError::ModelLoadError(format!("Invalid config.json: {}", e)))?;

        let session = Session::builder()
            .map_err(|e: ort::Error| ClassifierError::ModelLoadError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e: ort::Error| ClassifierError::ModelLoadError(e.to_string()))?
            .with_intra_threads(config.n_threads)
            .map_err(|e: ort::Error| ClassifierError::ModelLoadError(e.to_string()))?
            .commit_from_file(&files.onnx)
            .map_err(|e: ort::Error| ClassifierError::ModelLoadError(e.to_string()))?;

        let uses_token_type_ids = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        tracing::info!(
            "Classifier '{}' loaded from {:?} (token_type_ids: {})",
            config.name,
            files.dir,
            uses_token_type_ids
        );

        Ok(Self {
            name: config.name,
            tokenizer,
            session: Mutex::new(session),
            config_json,
            uses_token_type_ids,
        })
    }

    fn run_logits(&self, text: &str) -> Result<Vec<f32>, ClassifierError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))?;

        let n_tokens = encoding.len();
        let to_i64 = |values: &[u32]| values.iter().map(|&v| v as i64).collect::<Vec<i64>>();
        let shape = [1_usize, n_tokens];

        let input_ids = Tensor::from_array((shape, to_i64(encoding.get_ids())))
            .map_err(|e: ort::Error| ClassifierError::InferenceError(e.to_string()))?;
        let attention_mask = Tensor::from_array((shape, to_i64(encoding.get_attention_mask())))
            .map_err(|e: ort::Error| ClassifierError::InferenceError(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::InferenceError("Session lock poisoned".to_string()))?;

        let run_result = if self.uses_token_type_ids {
            let token_type_ids = Tensor::from_array((shape, to_i64(encoding.get_type_ids())))
                .map_err(|e: ort::Error| ClassifierError::InferenceError(e.to_string()))?;
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids,
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
            ])
        };
        let outputs =
            run_result.map_err(|e: ort::Error| ClassifierError::InferenceError(e.to_string()))?;

        // Logits are the first output, shape [1, num_labels]
        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| ClassifierError::InvalidOutput("No output from model".to_string()))?;

        let logits = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e: ort::Error| ClassifierError::InferenceError(e.to_string()))?;

        tracing::trace!("Classifier '{}' ran on {} tokens", self.name, n_tokens);

        Ok(logits.1.to_vec())
    }
}

/// Load `tokenizer.json`, keeping at most `max_tokens` ids and never padding
fn load_tokenizer(path: &Path, max_tokens: usize) -> Result<Tokenizer, ClassifierError> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| ClassifierError::TokenizerError(e.to_string()))?;
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_tokens,
            ..Default::default()
        }))
        .map_err(|e| ClassifierError::TokenizerError(e.to_string()))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

impl TextClassifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, text: &str) -> Result<LabelDistribution, ClassifierError> {
        let logits = self.run_logits(text)?;
        if logits.is_empty() {
            return Err(ClassifierError::InvalidOutput(format!(
                "Model '{}' returned no logits",
                self.name
            )));
        }

        let probs = softmax(&logits);
        let labels = labels_from_config(&self.config_json, probs.len());

        Ok(LabelDistribution::from_labels(&labels, &probs))
    }
}
