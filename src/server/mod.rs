use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    routing::get,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use crate::collection::Collection;
use crate::config::AppConfig;
use crate::health::{self, HealthMonitor};
use crate::router::StorageRouter;
use crate::storage::FileStore;

pub mod routes;

/// Largest accepted request body
pub const BODY_LIMIT: usize = 5 * 1024 * 1024;

/// Server state
pub struct AppState {
    pub router: Arc<StorageRouter>,
    pub health: HealthMonitor,
}

/// The same route set for one collection
fn collection_routes(collection: Collection) -> Router<Arc<AppState>> {
    let base = format!("/{}", collection.as_str());
    Router::new()
        .route(&base, get(routes::list_documents).post(routes::create_document))
        .route(
            &format!("{}/{{id}}", base),
            get(routes::get_document)
                .put(routes::update_document)
                .delete(routes::delete_document),
        )
        .layer(Extension(collection))
}

/// Build the application with every collection registered
pub fn build_app(state: Arc<AppState>) -> Router {
    let mut app = Router::new();
    for collection in Collection::all() {
        app = app.merge(collection_routes(*collection));
    }

    app.fallback(routes::endpoint_not_found)
        .method_not_allowed_fallback(routes::endpoint_not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: AppConfig) -> anyhow::Result<()> {
    let router = Arc::new(StorageRouter::new(FileStore::new(config.data_file.clone())));
    let monitor = HealthMonitor::new();

    let target = config.database_target();
    if let crate::config::DatabaseTarget::File(path) = &target {
        crate::config::ensure_db_dir(path)?;
    }
    // First attempt inline so the initial requests already see the database
    health::connect_once(&target, &router, &monitor);
    tokio::spawn(health::run_connector(
        target,
        router.clone(),
        monitor.clone(),
        config.reconnect_interval(),
    ));

    let state = Arc::new(AppState {
        router,
        health: monitor,
    });
    let app = build_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Fallback data file: {}", config.data_file.display());
    println!("🌍 Server running at http://localhost:{}", config.port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutting down");
    }
}
