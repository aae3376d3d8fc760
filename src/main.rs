use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use dotenvy::dotenv;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod config;
mod db;
mod middleware;
mod utils;
mod workflow;

use crate::config::Config;
use crate::db::queries::borrow::BorrowDoc;
use crate::db::queries::job::JobDoc;
use crate::db::queries::notification::NotificationDoc;
use crate::db::queries::request::{create_request_view_cache, RequestDoc};
use crate::db::queries::supply::SupplyDoc;
use crate::db::queries::transport::TransportDoc;
use crate::db::queries::venue::VenueDoc;
use crate::middleware::auth::{create_permission_cache, jwt_middleware, rbac_middleware};
use crate::utils::events::create_event_channel;

#[tokio::main]
async fn main() {
    dotenv().ok();
    Config::init();

    std::fs::create_dir_all("logs").expect("Failed to create logs directory");

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true) // Include target (module path) in logs
        .with_writer(non_blocking)
        .init();

    let permission_cache = create_permission_cache();
    let view_cache = create_request_view_cache();
    let events = create_event_channel();

    let database_url = Config::get().database_url.clone();
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .idle_timeout(Duration::from_secs(30))
        .connect(&database_url)
        .await
        .expect("Failed to connect to the database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let merged_doc = RequestDoc::openapi()
        .merge_from(JobDoc::openapi())
        .merge_from(VenueDoc::openapi())
        .merge_from(TransportDoc::openapi())
        .merge_from(BorrowDoc::openapi())
        .merge_from(SupplyDoc::openapi())
        .merge_from(NotificationDoc::openapi());

    // Private routes
    let private_routes = Router::new()
        .merge(api::request::request_routes())
        .merge(api::job::job_routes())
        .merge(api::venue::venue_routes())
        .merge(api::transport::transport_routes())
        .merge(api::borrow::borrow_routes())
        .merge(api::supply::supply_routes())
        .merge(api::notification::notification_routes())
        .route_layer(from_fn_with_state(pool.clone(), rbac_middleware))
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(api::health::health_routes())
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(permission_cache.clone()))
        .layer(Extension(view_cache.clone()))
        .layer(Extension(events.clone()))
        .with_state(pool.clone());

    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let is_running = Arc::new(AtomicBool::new(true));

    let server_task = tokio::spawn(run_server(
        app,
        shutdown_tx.clone(),
        pool.clone(),
        is_running.clone(),
    ));

    tokio::select! {
        _ = server_task => println!("Server task finished."),
        _ = shutdown_signal(shutdown_tx.subscribe(), pool.clone(), is_running.clone()) => (),
    }
    println!("Shutdown complete.");
}

async fn shutdown_signal(
    mut shutdown_rx: broadcast::Receiver<()>,
    pool: PgPool,
    is_running: Arc<AtomicBool>,
) {
    tokio::select! {
        _ = signal::ctrl_c() => println!("Received Ctrl+C, shutting down..."),
        _ = shutdown_rx.recv() => println!("Received shutdown signal."),
    }
    println!("🛠️ Closing database pool...");
    pool.close().await;
    println!("✅ Database pool closed. Server shutting down.");
    is_running.store(false, Ordering::Relaxed);
}

async fn run_server(
    app: Router,
    shutdown_tx: broadcast::Sender<()>,
    pool: PgPool,
    is_running: Arc<AtomicBool>,
) {
    let addr = SocketAddr::from(([127, 0, 0, 1], Config::get().bind_port));
    println!("Server running at http://{}", addr);

    let listener = TcpListener::bind(&addr).await.expect("Failed to bind listener");

    let shutdown_signal = shutdown_signal(shutdown_tx.subscribe(), pool.clone(), is_running.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .expect("Server encountered an error");
}
