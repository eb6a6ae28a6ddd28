use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, patch, post, put},
    Router,
};
use dotenv::dotenv;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stayledger_core::auth;
use stayledger_core::close::handlers as close_handlers;
use stayledger_core::config::AppConfig;
use stayledger_core::db;
use stayledger_core::feed::client::PlatformFeedClient;
use stayledger_core::feed::handlers as feed_handlers;
use stayledger_core::ledger::client::SheetsLedgerClient;
use stayledger_core::ledger::handlers as ledger_handlers;
use stayledger_core::store::handlers as booking_handlers;
use stayledger_core::AppState;

/// Health check endpoint.
///
/// Returns a simple JSON response indicating the server is running.
/// Useful for monitoring and load balancer health checks.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "stayledger-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Database health check endpoint.
///
/// Verifies that the database connection is working by executing
/// a simple query.
async fn db_health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "database": "connected"
    })))
}

/// Creates the main application router.
///
/// All /api routes sit behind the bearer-JWT middleware; the health
/// endpoints stay public.
fn create_router(state: AppState) -> Router {
    Router::new()
        // Booking surface
        .route("/api/bookings", post(booking_handlers::create_booking_handler))
        .route(
            "/api/bookings/:booking_code",
            get(booking_handlers::get_booking_handler)
                .put(booking_handlers::update_booking_handler)
                .delete(booking_handlers::delete_booking_handler),
        )
        .route(
            "/api/properties/:property_id/bookings",
            get(booking_handlers::list_bookings_handler),
        )
        .route(
            "/api/properties/:property_id/ingest",
            post(feed_handlers::ingest_handler),
        )
        .route(
            "/api/properties/:property_id/reconcile",
            get(feed_handlers::reconcile_handler),
        )
        // Month-end close surface
        .route(
            "/api/properties/:property_id/close/:year/:month",
            get(close_handlers::get_status_handler).put(close_handlers::put_status_handler),
        )
        .route(
            "/api/properties/:property_id/close/:year/:month/steps",
            put(close_handlers::put_steps_handler),
        )
        .route(
            "/api/properties/:property_id/close/:year/:month/audit",
            get(close_handlers::audit_trail_handler),
        )
        .route(
            "/api/properties/:property_id/close/:year/:month/summary",
            get(booking_handlers::month_summary_handler),
        )
        .route(
            "/api/properties/:property_id/close/:year/:month/sync",
            post(ledger_handlers::sync_handler),
        )
        .route("/api/close/:year/:month", patch(close_handlers::batch_status_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::jwt_middleware,
        ))
        // Public routes
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting StayLedger Core Server...");

    let config = Arc::new(AppConfig::from_env()?);

    // Initialize database connection pool
    let db_pool = db::create_pool(&config.database_url).await?;

    // External clients are built once and injected everywhere they are used.
    let feed = PlatformFeedClient::new(&config);
    let ledger = SheetsLedgerClient::new(&config);

    let app_state = AppState {
        db: db_pool,
        feed,
        ledger,
        config: config.clone(),
    };

    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        config.server_host, config.server_port
    ))
    .await
    .map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {}:{}: {}",
            config.server_host,
            config.server_port,
            e
        )
    })?;

    info!(
        "Server listening on {}:{}",
        config.server_host, config.server_port
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
