//! Wallet Sentinel - multi-chain wallet activity monitor
//!
//! Entry point: loads configuration, opens the wallet store, starts the
//! poll engine and the inbound listener, and serves /health and /metrics.

use chrono::Utc;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_sentinel::config::AppConfig;
use wallet_sentinel::error::AppResult;
use wallet_sentinel::engine::{Engine, EngineConfig};
use wallet_sentinel::fetcher::ExplorerFetcher;
use wallet_sentinel::handlers::{router, AppState};
use wallet_sentinel::listener::{
    run_listener, BackoffPolicy, ConnectionState, RegistrationHandler, TelegramPoller,
};
use wallet_sentinel::metrics::SentinelMetrics;
use wallet_sentinel::models::ChainRegistry;
use wallet_sentinel::notifications::{
    LogNotifier, NotificationService, TelegramConfig, TelegramNotifier,
};
use wallet_sentinel::store::WalletStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting Wallet Sentinel v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let started_at = Utc::now();
    let cancel = CancellationToken::new();

    let registry = Arc::new(ChainRegistry::load(&config.chains.path)?);
    if registry.is_empty() {
        tracing::warn!(path = %config.chains.path.display(), "No chains configured, cycles will be empty");
    }
    tracing::info!(chains = ?registry.names().collect::<Vec<_>>(), "Chains loaded");

    let store = Arc::new(WalletStore::from_config(&config.storage).await?);
    let metrics = Arc::new(SentinelMetrics::new()?);
    metrics.tracked_wallets.set(store.len().await as i64);

    let fetcher = Arc::new(ExplorerFetcher::new(
        config.polling.fetch_timeout(),
        &config.polling.user_agent,
    )?);

    let notifier = build_notifier(&config)?;

    let engine = Arc::new(Engine::new(
        store.clone(),
        registry,
        fetcher,
        notifier,
        metrics.clone(),
        EngineConfig::from(&config.polling),
    ));
    let engine_handle = engine.clone().start(cancel.clone());

    // Listener and registration tasks
    let mut listener_state = None;
    let mut background = Vec::new();
    if let (true, Some(source_chat_id)) = (config.listener.enabled, config.telegram.source_chat_id) {
        let state = Arc::new(RwLock::new(ConnectionState::Connected));
        let (tx, rx) = mpsc::channel(config.listener.queue_capacity);

        let handler = RegistrationHandler::new(store.clone(), source_chat_id, metrics.clone());
        background.push(tokio::spawn(handler.run(rx, cancel.clone())));

        let poller = TelegramPoller::new(
            &config.telegram.api_base_url,
            &config.telegram.bot_token,
            config.listener.long_poll_timeout_secs,
        )?;
        let policy = BackoffPolicy::from(&config.listener);
        let listener_cancel = cancel.clone();
        let listener_shared = state.clone();
        background.push(tokio::spawn(async move {
            if let Err(e) = run_listener(poller, tx, policy, listener_shared, listener_cancel).await {
                tracing::error!(error = %e, "Listener stopped; no new wallets will be registered");
            }
        }));

        tracing::info!(source_chat_id, "Listener enabled");
        listener_state = Some(state);
    } else {
        tracing::info!("Listener disabled");
    }

    // Ctrl-C / SIGTERM cancel everything
    tokio::spawn(shutdown_signal(cancel.clone()));

    if config.server.enabled {
        let app_state = Arc::new(AppState {
            engine,
            metrics,
            listener_state,
            started_at,
        });

        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        tracing::info!(%addr, "Server listening");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let server_cancel = cancel.clone();
        axum::serve(listener, router(app_state))
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await?;
    } else {
        cancel.cancelled().await;
    }

    engine_handle.join().await;
    for task in background {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task failed");
        }
    }

    tracing::info!("Wallet Sentinel stopped");
    Ok(())
}

/// Telegram notifier when an alert chat is set, log-only otherwise
fn build_notifier(config: &AppConfig) -> AppResult<Arc<dyn NotificationService>> {
    let Some(chat_id) = config.telegram.alert_chat_id else {
        tracing::warn!("No alert chat configured, alerts go to the log only");
        return Ok(Arc::new(LogNotifier));
    };

    let notifier = TelegramNotifier::new(TelegramConfig {
        bot_token: config.telegram.bot_token.clone(),
        chat_id,
        api_base_url: config.telegram.api_base_url.clone(),
        timeout: Duration::from_secs(config.telegram.send_timeout_secs),
    })?;
    Ok(Arc::new(notifier))
}

/// Wait for Ctrl-C or SIGTERM, then cancel
async fn shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    cancel.cancel();
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wallet_sentinel=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Load and validate configuration
fn load_config() -> anyhow::Result<AppConfig> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

    tracing::info!(
        interval_secs = config.polling.interval_secs,
        storage = ?config.storage.backend,
        listener = config.listener.enabled,
        "Configuration loaded"
    );

    Ok(config)
}
