mod config;
mod errors;
mod gap_analysis;
mod keywords;
mod language;
mod llm_client;
mod models;
mod routes;
mod standardization;
mod state;
mod telemetry;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::gap_analysis::orchestrator::{prompt_version, GapAnalysisService};
use crate::keywords::extraction::{KeywordExtractionService, KeywordExtractionSettings};
use crate::language::{Language, LanguageDetector};
use crate::llm_client::prompts::{PromptProvider, PromptTask, YamlPromptProvider};
use crate::llm_client::{AzureOpenAiClient, ChatCompletion};
use crate::routes::{build_router, with_request_timeout};
use crate::standardization::KeywordStandardizer;
use crate::state::AppState;
use crate::telemetry::{EventSink, TracingEventSink};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},telemetry={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Advisor API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm: Arc<dyn ChatCompletion> = Arc::new(
        AzureOpenAiClient::new(config.llm_settings()).context("Failed to build the LLM HTTP client")?,
    );
    info!(
        "LLM client initialized (deployment: {})",
        config.azure_openai_deployment
    );

    // Prompts: a missing gap analysis prompt is a deployment error, so check now
    let prompts = Arc::new(YamlPromptProvider::new(&config.prompts_dir));
    for language in Language::SUPPORTED {
        let version = prompt_version(language);
        prompts
            .prompt_config(PromptTask::GapAnalysis, language, Some(version))
            .with_context(|| format!("Gap analysis prompt v{version} for {language} is not available"))?;
    }
    info!("Prompts loaded from {}", config.prompts_dir);

    // Standardization dictionaries
    let standardizer = Arc::new(
        KeywordStandardizer::load(&config.standardization_dir)
            .context("Failed to load standardization data")?,
    );
    let report = standardizer.validate();
    if !report.is_clean() {
        warn!("Standardization data has issues: {report:?}");
    }

    let detector = Arc::new(LanguageDetector::default());
    let events: Arc<dyn EventSink> = Arc::new(TracingEventSink);

    // Build app state
    let state = AppState {
        gap_analysis: Arc::new(GapAnalysisService::new(
            llm.clone(),
            prompts.clone(),
            events.clone(),
            detector.clone(),
            config.gap_analysis_settings(),
        )),
        keyword_extraction: Arc::new(KeywordExtractionService::new(
            llm,
            prompts,
            events,
            detector.clone(),
            standardizer.clone(),
            KeywordExtractionSettings::default(),
        )),
        detector,
        standardizer,
        coverage: config.coverage_settings(),
    };

    // Build router
    let app = with_request_timeout(build_router(state), config.request_timeout())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS origins once the frontend domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
