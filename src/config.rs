use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing::debug;

/// Environment variable naming the emotion classifier
pub const EMOTION_MODEL_ENV: &str = "MODEL_EMOTION";
/// Environment variable naming the sentiment classifier
pub const SENTIMENT_MODEL_ENV: &str = "MODEL_SENTIMENT";
/// Environment variable overriding the models directory
pub const MODELS_DIR_ENV: &str = "EMOTION_SERVICE_MODELS_DIR";

/// GoEmotions student model (28 fine-grained labels)
pub const DEFAULT_EMOTION_MODEL: &str = "joeddav/distilbert-base-uncased-go-emotions-student";
/// Twitter RoBERTa sentiment model (negative, neutral, positive)
pub const DEFAULT_SENTIMENT_MODEL: &str = "cardiffnlp/twitter-roberta-base-sentiment";

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub emotion_model: String,
    pub sentiment_model: String,
    /// Cache directory for downloaded models; `None` means the default location
    pub models_dir: Option<PathBuf>,
    pub host: IpAddr,
    pub port: u16,
    /// Threads per ONNX session
    pub n_threads: usize,
    /// Never download; fail if model files are missing
    pub offline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            emotion_model: DEFAULT_EMOTION_MODEL.to_string(),
            sentiment_model: DEFAULT_SENTIMENT_MODEL.to_string(),
            models_dir: None,
            host: IpAddr::from([0, 0, 0, 0]),
            port: 8000,
            n_threads: 1,
            offline: false,
        }
    }
}

impl Config {
    /// Defaults overlaid with the model environment variables.
    ///
    /// Unset or blank variables keep the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(model) = env_value(EMOTION_MODEL_ENV) {
            config.emotion_model = model;
        }
        if let Some(model) = env_value(SENTIMENT_MODEL_ENV) {
            config.sentiment_model = model;
        }
        if let Some(dir) = env_value(MODELS_DIR_ENV) {
            config.models_dir = Some(PathBuf::from(dir));
        }

        debug!(
            "Config from environment: emotion={}, sentiment={}",
            config.emotion_model, config.sentiment_model
        );
        config
    }

    /// Get the default config directory
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".emotion-service"))
    }

    /// Models directory in effect
    pub fn models_dir(&self) -> Result<PathBuf> {
        match &self.models_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::config_dir()?.join("models")),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
