//! taskchat application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Open storage (SQLite, or memory with `--ephemeral`)
//! 3. Build the completion client and action extractor
//! 4. Start the per-user engine registry
//! 5. Serve the axum REST API until Ctrl-C

mod cli;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use taskchat_api::routes;
use taskchat_api::state::AppState;
use taskchat_chat::{
    ActionExtractor, ChatError, CompletionClient, ConversationalTaskEngine, EngineLimits,
    EngineRegistry, HttpCompletionClient,
};
use taskchat_core::config::TaskChatConfig;
use taskchat_storage::{Database, KeyValueStore, MemoryStore, ScopedStore, StateRepository};

use crate::cli::CliArgs;

/// Where per-user state is kept.
enum Backend {
    Sqlite(Arc<Database>),
    /// Each actor gets its own store, so a user's state lasts until their
    /// engine goes idle.
    Memory,
}

impl Backend {
    fn store_for(&self, user_key: &str) -> Arc<dyn KeyValueStore> {
        match self {
            Backend::Sqlite(db) => Arc::new(ScopedStore::new(Arc::clone(db), user_key)),
            Backend::Memory => Arc::new(MemoryStore::new()),
        }
    }
}

fn build_completion_client(config: &TaskChatConfig) -> Option<Arc<dyn CompletionClient>> {
    if !config.completion.enabled {
        tracing::info!("Completion model disabled, chat uses keyword rules only");
        return None;
    }
    match HttpCompletionClient::new(&config.completion) {
        Ok(client) => {
            tracing::info!(
                endpoint = %config.completion.endpoint,
                model = %config.completion.model,
                "Completion client ready"
            );
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Completion client unavailable, using keyword rules only");
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts so its log level can apply.
    let config_file = args.resolve_config_path();
    let loaded = TaskChatConfig::load(&config_file);

    let log_level = args
        .resolve_log_level()
        .or_else(|| loaded.as_ref().ok().map(|c| c.general.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting taskchat v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(config) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Err(e) => {
            tracing::warn!(path = %config_file.display(), error = %e, "Using default configuration");
            TaskChatConfig::default()
        }
    };

    // CLI and environment overrides.
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    config.general.log_level = log_level;
    config.general.port = args.resolve_port(config.general.port);
    config.completion.api_key = args.resolve_api_key(config.completion.api_key.take());
    if args.no_llm {
        config.completion.enabled = false;
    }

    // Storage.
    let backend = if args.ephemeral {
        tracing::info!("Ephemeral mode: state is kept in memory only");
        Backend::Memory
    } else {
        let data_dir = cli::expand_home(&config.general.data_dir);
        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
            return Err(e.into());
        }
        let db_path = data_dir.join("taskchat.db");
        let db = Database::new(&db_path)?;
        tracing::info!(path = %db_path.display(), "SQLite database opened");
        Backend::Sqlite(Arc::new(db))
    };

    // Chat engine.
    let client = build_completion_client(&config);
    let extractor = ActionExtractor::from_config(client, &config.completion, &config.chat);
    let model_enabled = extractor.uses_model();
    let limits = EngineLimits::from(&config.chat);
    let idle_ttl = (config.chat.idle_ttl_secs > 0)
        .then(|| Duration::from_secs(config.chat.idle_ttl_secs));

    let registry = EngineRegistry::new(
        move |user_key: &str| -> Result<ConversationalTaskEngine, ChatError> {
            Ok(ConversationalTaskEngine::new(
                StateRepository::new(backend.store_for(user_key)),
                extractor.clone(),
                limits,
            ))
        },
    )
    .with_queue_depth(config.chat.queue_depth)
    .with_idle_ttl(idle_ttl);

    // API server.
    let addr = format!("{}:{}", config.general.bind_address, config.general.port);
    let state = AppState::new(config.clone(), registry).with_model_enabled(model_enabled);
    let registry = Arc::clone(&state.registry);
    let router = routes::create_router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind - is another instance running?");
            tracing::error!("Try: taskchat --port {}", config.general.port.saturating_add(1));
            return Err(e.into());
        }
    };

    tracing::info!(
        addr = %addr,
        model_enabled,
        max_history = limits.max_history,
        idle_ttl_secs = config.chat.idle_ttl_secs,
        "API server listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown().await;
    tracing::info!("taskchat stopped");
    Ok(())
}
