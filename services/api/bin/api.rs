//! Main Entrypoint for the Yuban API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Loading the vocabulary catalog and constructing the oracle clients.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use yuban_api::{
    config::{Config, Provider},
    db::PgStore,
    providers::{AzureRecognizer, ElevenLabsSynthesizer, SimliAnimator},
    router::create_router,
    state::{AppState, evict_stale},
};
use yuban_core::{
    media::{AvatarAnimator, SpeechSynthesizer},
    oracle::{ChatOracle, OpenAICompatibleOracle},
    prompts::PromptSet,
    speech::SpeechRecognizer,
    vocabulary::VocabularyCatalog,
};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let store = Arc::new(
        PgStore::connect(&config)
            .await
            .context("Failed to connect to database")?,
    );
    store.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");

    // --- 4. Initialize Shared Services ---
    let catalog = Arc::new(
        VocabularyCatalog::load_dir(&config.vocab_path)
            .context("Failed to load vocabulary catalog")?,
    );
    let prompts = Arc::new(PromptSet::default());

    let oracle: Arc<dyn ChatOracle> = match &config.provider {
        Provider::OpenAI => {
            info!("Using OpenAI provider.");
            let api_key = config
                .openai_api_key
                .as_ref()
                .context("OPENAI_API_KEY is required for the openai provider")?;
            let openai_config = OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base("https://api.openai.com/v1/");
            Arc::new(OpenAICompatibleOracle::new(
                openai_config,
                config.chat_model.clone(),
                Some(config.oracle_timeout),
            ))
        }
        Provider::Gemini => {
            info!("Using Gemini provider.");
            let api_key = config
                .gemini_api_key
                .as_ref()
                .context("GEMINI_API_KEY is required for the gemini provider")?;
            let openai_config = OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base("https://generativelanguage.googleapis.com/v1beta/openai");
            Arc::new(OpenAICompatibleOracle::new(
                openai_config,
                config.chat_model.clone(),
                Some(config.oracle_timeout),
            ))
        }
    };

    let synthesizer: Option<Arc<dyn SpeechSynthesizer>> = config
        .eleven_api_key
        .clone()
        .map(|key| Arc::new(ElevenLabsSynthesizer::new(key)) as Arc<dyn SpeechSynthesizer>);
    let animator: Option<Arc<dyn AvatarAnimator>> = config
        .simli_api_key
        .clone()
        .map(|key| Arc::new(SimliAnimator::new(key)) as Arc<dyn AvatarAnimator>);
    let recognizer: Option<Arc<dyn SpeechRecognizer>> = match (
        config.azure_speech_key.clone(),
        config.azure_speech_region.clone(),
    ) {
        (Some(key), Some(region)) => Some(Arc::new(AzureRecognizer::new(
            key,
            region,
            config.speech_language.clone(),
        )) as Arc<dyn SpeechRecognizer>),
        _ => None,
    };
    info!(
        synthesis = synthesizer.is_some(),
        avatar = animator.is_some(),
        recognition = recognizer.is_some(),
        "Optional speech providers configured."
    );

    let app_state = AppState {
        store,
        catalog,
        oracle,
        prompts,
        synthesizer,
        animator,
        recognizer,
        config: Arc::new(config.clone()),
        sessions: Arc::new(Mutex::new(HashMap::new())),
    };

    // Reclaim session contexts the learner walked away from: open sessions
    // gone idle and closed sessions never summarized.
    {
        let sessions = app_state.sessions.clone();
        let ttl = config.session_ttl;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                tick.tick().await;
                let evicted = evict_stale(&sessions, ttl).await;
                if evicted > 0 {
                    info!(evicted, "evicted idle session contexts");
                }
            }
        });
    }

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
