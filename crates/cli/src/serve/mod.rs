//! `shelter serve`: HTTP JSON API over the adoption workflow.
//!
//! Security features:
//! - CORS headers on all responses (permissive for local dev)
//! - Optional API key authentication (`api_key` / `SHELTER_API_KEY`)
//!
//! Endpoints:
//! - GET    /health                              - Server status (exempt from auth)
//! - POST   /applications                        - Submit an application
//! - GET    /applications                        - Filtered, paginated listing
//! - GET    /applications/pending                - Applications awaiting review
//! - GET    /applications/{id}                   - One application
//! - PATCH  /applications/{id}                   - Review update / status transition
//! - DELETE /applications/{id}                   - Remove an application
//! - GET    /applications/{id}/adoption          - Adoption created from an application
//! - GET    /animals/{id}/applications           - Applications for an animal
//! - GET    /animals/{id}/adoption               - Adoption of an animal
//! - POST   /adoptions                           - Finalize an approved application
//! - GET    /adoptions                           - Filtered, paginated listing
//! - GET    /adoptions/follow-ups?days=N         - Active adoptions with a follow-up due
//! - GET    /adoptions/statistics                - Aggregate figures
//! - GET    /adoptions/{id}                      - One adoption record
//! - PATCH  /adoptions/{id}                      - Payment, notes, return
//! - DELETE /adoptions/{id}                      - Remove an adoption record
//! - POST   /adoptions/{id}/follow-ups/complete  - Mark a follow-up as done
//!
//! Mutating routes require an `X-Actor-Id` header. All responses use
//! Content-Type: application/json.

mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use shelter_adoption::{AdoptionWorkflow, AuditOutbox, LogAuditSink};
use shelter_storage::MemoryStorage;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use self::handlers::*;
use self::middleware::auth_middleware;
use self::state::AppState;
use crate::config::ServiceConfig;

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/applications",
            post(handle_create_application).get(handle_list_applications),
        )
        .route("/applications/pending", get(handle_pending_applications))
        .route(
            "/applications/{id}",
            get(handle_get_application)
                .patch(handle_update_application)
                .delete(handle_delete_application),
        )
        .route(
            "/applications/{id}/adoption",
            get(handle_adoption_by_application),
        )
        .route(
            "/animals/{id}/applications",
            get(handle_applications_by_animal),
        )
        .route("/animals/{id}/adoption", get(handle_adoption_by_animal))
        .route(
            "/adoptions",
            post(handle_create_adoption).get(handle_list_adoptions),
        )
        .route("/adoptions/follow-ups", get(handle_pending_follow_ups))
        .route("/adoptions/statistics", get(handle_adoption_statistics))
        .route(
            "/adoptions/{id}",
            get(handle_get_adoption)
                .patch(handle_update_adoption)
                .delete(handle_delete_adoption),
        )
        .route(
            "/adoptions/{id}/follow-ups/complete",
            post(handle_complete_follow_up),
        )
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl+C, then drain the audit outbox.
pub async fn start_server(config: ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let animals = config.load_seed_animals()?;
    if !animals.is_empty() {
        tracing::info!(count = animals.len(), "seeded animals");
    }
    let storage = Arc::new(MemoryStorage::with_animals(animals));
    let (outbox, _drain) = AuditOutbox::spawn(LogAuditSink, config.workflow.audit.clone());
    let workflow = AdoptionWorkflow::new(storage, outbox, config.workflow.clone());

    if config.api_key.is_some() {
        tracing::info!("API key authentication enabled");
    }
    let state = Arc::new(AppState {
        workflow: workflow.clone(),
        api_key: config.api_key.clone(),
    });
    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "shelter service listening");
    eprintln!("Shelter service listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    workflow.flush_audit().await;
    eprintln!("\nServer shut down.");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    eprintln!("\nReceived shutdown signal...");
}
