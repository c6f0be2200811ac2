use std::sync::Arc;

use hr_onboarding::config::ServerConfig;
use hr_onboarding::error::Result;
use hr_onboarding::onboarding::{
    OnboardingEngine, OnboardingRouteState, StepCatalog, onboarding_routes,
};
use hr_onboarding::store::{LibSqlBackend, OnboardingStore};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    eprintln!("🗂  HR Onboarding v{}", env!("CARGO_PKG_VERSION"));

    // ── Step catalog ────────────────────────────────────────────────────
    let catalog = match &config.catalog_path {
        Some(path) => {
            let catalog = StepCatalog::from_json_file(path).unwrap_or_else(|e| {
                eprintln!("Error: Failed to load catalog at {}: {}", path.display(), e);
                std::process::exit(1);
            });
            eprintln!("   Catalog: {} ({} steps)", path.display(), catalog.total_steps());
            catalog
        }
        None => {
            let catalog = StepCatalog::default_catalog();
            eprintln!("   Catalog: built-in ({} steps)", catalog.total_steps());
            catalog
        }
    };

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn OnboardingStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Engine ──────────────────────────────────────────────────────────
    let engine = Arc::new(
        OnboardingEngine::new(store, Arc::new(catalog)).with_init_mode(config.init_mode),
    );
    eprintln!("   Init mode: {:?}", config.init_mode);

    // Startup recovery: bring stored status rows in line with the current
    // catalog and required field set.
    let report = engine.reconcile_all().await?;
    if report.repaired > 0 {
        eprintln!(
            "   Reconciled {} of {} employees",
            report.repaired, report.checked
        );
    }

    // ── HTTP ────────────────────────────────────────────────────────────
    let app = onboarding_routes(OnboardingRouteState::new(engine)).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    eprintln!("   API: http://0.0.0.0:{}/api\n", config.port);
    tracing::info!(port = config.port, "Onboarding server started");
    axum::serve(listener, app).await?;

    Ok(())
}
