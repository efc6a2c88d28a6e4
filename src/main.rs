use anyhow::{Context, Result};
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;

use emotion_service::classifier::{self, ClassifierConfig};
use emotion_service::models;
use emotion_service::server::{self, AppState};
use emotion_service::{Analyzer, Config, TextClassifier};

/// HTTP service classifying text into an emotion and a stress score
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Number of threads per ONNX session
    #[arg(long, default_value = "1")]
    threads: usize,

    /// Directory for downloaded models (overrides EMOTION_SERVICE_MODELS_DIR)
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Do not download models; fail if files are missing
    #[arg(long)]
    offline: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let mut config = Config::from_env();
    config.host = args.host;
    config.port = args.port;
    config.n_threads = args.threads.max(1);
    config.offline = args.offline;
    if let Some(dir) = args.models_dir {
        config.models_dir = Some(dir);
    }

    info!("Emotion service starting...");
    info!("Emotion model: {}", config.emotion_model);
    info!("Sentiment model: {}", config.sentiment_model);

    // Both models are ready before the listener accepts traffic
    let load_config = config.clone();
    let analyzer = tokio::task::spawn_blocking(move || load_analyzer(&load_config))
        .await
        .context("Model loading task panicked")??;
    info!(
        "Models loaded successfully (emotion: {}, sentiment: {})",
        analyzer.emotion_model(),
        analyzer.sentiment_model()
    );

    server::serve(AppState::new(analyzer), config.bind_addr()).await
}

fn load_analyzer(config: &Config) -> Result<Analyzer> {
    let models_dir = config.models_dir()?;
    info!("Models directory: {:?}", models_dir);

    let emotion = load_model(&config.emotion_model, &models_dir, config)?;
    let sentiment = load_model(&config.sentiment_model, &models_dir, config)?;

    Ok(Analyzer::new(emotion, sentiment))
}

fn load_model(
    model_id: &str,
    models_dir: &std::path::Path,
    config: &Config,
) -> Result<Box<dyn TextClassifier>> {
    let files = models::ensure_model(model_id, models_dir, config.offline)
        .with_context(|| format!("Failed to prepare model files for {}", model_id))?;

    classifier::load_classifier(&files, ClassifierConfig::new(model_id, config.n_threads))
        .with_context(|| format!("Failed to load classifier {}", model_id))
}
