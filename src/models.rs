//! Model file resolution and downloading.
//!
//! A model id is either a local directory holding an exported model, or a
//! HuggingFace hub repo id (`owner/name`). Hub models are cached under the
//! models directory, one subdirectory per repo, and missing files are fetched
//! from `https://huggingface.co/<id>/resolve/main/<file>`.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Base URL for HuggingFace hub downloads
const HF_BASE_URL: &str = "https://huggingface.co";

/// Tokenizer definition
pub const TOKENIZER_FILE: &str = "tokenizer.json";
/// Model config (holds `id2label`)
pub const CONFIG_FILE: &str = "config.json";
/// ONNX export of the model, relative to the model directory
pub const ONNX_FILE: &str = "onnx/model.onnx";

/// Errors that can occur during model operations
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to download model: {0}")]
    DownloadError(String),

    #[error("Failed to create directory: {0}")]
    DirectoryError(String),

    #[error("Failed to write model file: {0}")]
    WriteError(String),

    #[error("Model file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid model id: {0}")]
    InvalidModel(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Remote file not found: {0}")]
    RemoteMissing(String),

    #[error(
        "Model '{model}' does not publish {file}. Export it with \
         `optimum-cli export onnx --model {model} <dir>` (and move model.onnx \
         into <dir>/onnx/), then set MODEL_EMOTION or MODEL_SENTIMENT to <dir>"
    )]
    NotExported { model: String, file: String },
}

/// Paths of the files making up one exported classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub dir: PathBuf,
    pub onnx: PathBuf,
    pub tokenizer: PathBuf,
    pub config: PathBuf,
}

impl ModelFiles {
    /// Expected file layout inside a model directory
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            onnx: dir.join(ONNX_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
            config: dir.join(CONFIG_FILE),
        }
    }

    /// `(relative name, absolute path)` for every required file
    fn entries(&self) -> [(&'static str, &Path); 3] {
        [
            (TOKENIZER_FILE, self.tokenizer.as_path()),
            (CONFIG_FILE, self.config.as_path()),
            (ONNX_FILE, self.onnx.as_path()),
        ]
    }

    /// Files that are not present on disk
    pub fn missing(&self) -> Vec<PathBuf> {
        self.entries()
            .iter()
            .filter(|(_, path)| !path.exists())
            .map(|(_, path)| path.to_path_buf())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// Cache directory name for a hub repo id (`owner/name` -> `owner--name`)
pub fn cache_dir_name(model_id: &str) -> Result<String, ModelError> {
    let trimmed = model_id.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
        && trimmed.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.')
        });

    if !valid {
        return Err(ModelError::InvalidModel(model_id.to_string()));
    }

    Ok(trimmed.replace('/', "--"))
}

/// Download URL for a file of a hub model
pub fn hub_url(model_id: &str, file: &str) -> String {
    file_url(HF_BASE_URL, model_id, file)
}

fn file_url(base_url: &str, model_id: &str, file: &str) -> String {
    format!("{}/{}/resolve/main/{}", base_url, model_id.trim(), file)
}

/// Where the files for `model_id` live (or will live once downloaded)
pub fn resolve_model_dir(model_id: &str, models_dir: &Path) -> Result<PathBuf, ModelError> {
    let local = Path::new(model_id);
    if local.is_dir() {
        return Ok(local.to_path_buf());
    }

    Ok(models_dir.join(cache_dir_name(model_id)?))
}

/// Stream `url` into `dest_path`, going through a `.download` sibling
fn download_file(url: &str, dest_path: &Path) -> Result<(), ModelError> {
    info!("Downloading {} to {:?}", url, dest_path);

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).map_err(|e| ModelError::DirectoryError(e.to_string()))?;
    }

    let mut response = reqwest::blocking::Client::new()
        .get(url)
        .send()
        .map_err(|e| ModelError::NetworkError(e.to_string()))?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ModelError::RemoteMissing(url.to_string()));
    }
    if !status.is_success() {
        return Err(ModelError::DownloadError(format!("HTTP {} for {}", status, url)));
    }

    debug!(
        "Download size: {}",
        response
            .content_length()
            .map(|s| format!("{:.1} MB", s as f64 / 1_000_000.0))
            .unwrap_or_else(|| "unknown".to_string())
    );

    let temp_path = dest_path.with_extension("download");
    let written = write_body(&mut response, &temp_path).and_then(|bytes| {
        fs::rename(&temp_path, dest_path)
            .map(|_| bytes)
            .map_err(|e| ModelError::WriteError(e.to_string()))
    });

    match written {
        Ok(bytes) => {
            info!("Downloaded {} bytes to {:?}", bytes, dest_path);
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            Err(e)
        }
    }
}

fn write_body(body: &mut impl Read, path: &Path) -> Result<u64, ModelError> {
    let mut file = BufWriter::new(
        File::create(path).map_err(|e| ModelError::WriteError(e.to_string()))?,
    );
    // Covers both the socket read and the disk write
    let bytes = io::copy(body, &mut file).map_err(|e| ModelError::DownloadError(e.to_string()))?;
    file.flush()
        .map_err(|e| ModelError::WriteError(e.to_string()))?;
    Ok(bytes)
}

/// Make sure every file of `model_id` is available locally.
///
/// Local directories are used as-is and never downloaded into. For hub ids,
/// missing files are fetched unless `offline` is set.
pub fn ensure_model(
    model_id: &str,
    models_dir: &Path,
    offline: bool,
) -> Result<ModelFiles, ModelError> {
    ensure_model_from(HF_BASE_URL, model_id, models_dir, offline)
}

fn ensure_model_from(
    base_url: &str,
    model_id: &str,
    models_dir: &Path,
    offline: bool,
) -> Result<ModelFiles, ModelError> {
    let dir = resolve_model_dir(model_id, models_dir)?;
    let files = ModelFiles::in_dir(&dir);
    let is_local = Path::new(model_id).is_dir();

    for (name, path) in files.entries() {
        if path.exists() {
            debug!("Model file already exists: {:?}", path);
            continue;
        }

        if is_local || offline {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }

        download_file(&file_url(base_url, model_id, name), path).map_err(|e| match e {
            ModelError::RemoteMissing(_) => ModelError::NotExported {
                model: model_id.trim().to_string(),
                file: name.to_string(),
            },
            other => other,
        })?;
    }

    Ok(files)
}
