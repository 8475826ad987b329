use std::sync::Arc;

use mentorship_onboarding::config::AppConfig;
use mentorship_onboarding::onboarding::{
    OnboardingRouteState, SessionRegistry, cors_layer, onboarding_routes,
};
use mentorship_onboarding::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("🎓 Mentorship onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding/status", config.http_port);
    eprintln!("   Store timeout: {:?}", config.store_timeout);
    if config.allows_any_origin() {
        eprintln!("   CORS: any origin");
    } else {
        eprintln!("   CORS: {}", config.cors_origins.join(", "));
    }

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "failed to open database at {}: {e}",
                    config.db_path.display()
                )
            })?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Sessions + HTTP ─────────────────────────────────────────────────
    let registry = Arc::new(SessionRegistry::new(Arc::clone(&db), config.store_timeout));
    let app = onboarding_routes(OnboardingRouteState {
        registry: Arc::clone(&registry),
    })
    .layer(cors_layer(&config.cors_origins));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port)).await?;
    tracing::info!(port = config.http_port, "Onboarding API started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown requested");
        })
        .await?;

    registry.shutdown().await;
    Ok(())
}
