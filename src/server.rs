//! REST API over a shared counter store, so many devices vote into one tally.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::api::{ApiResponse, IncrementRequest, SessionResponse};
use crate::competitor::Competitor;
use crate::session::{LocalSessionService, SessionService};
use crate::store::{CounterStore, StoreError};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CounterStore>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Competitor {0} not found")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(StoreError),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => AppError::NotFound(id),
            other => AppError::Internal(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        (status, Json(ApiResponse::<()>::err(self.to_string()))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/competitors", get(list_competitors))
        .route("/competitors/:id", patch(increment_counter))
        .route("/session", post(open_session))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/competitors - Full snapshot of every competitor
async fn list_competitors(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Competitor>>>, AppError> {
    let competitors = state.store.list_all().await?;
    Ok(Json(ApiResponse::ok(competitors)))
}

/// PATCH /api/competitors/:id - Set one counter to the value computed by the client
async fn increment_counter(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<IncrementRequest>,
) -> Result<Json<ApiResponse<IncrementRequest>>, AppError> {
    state
        .store
        .increment(&id, request.counter, request.value)
        .await?;

    info!(competitor_id = %id, counter = %request.counter, value = request.value, "Vote recorded");
    Ok(Json(ApiResponse::ok(request)))
}

/// POST /api/session - Anonymous session for a new client
async fn open_session() -> impl IntoResponse {
    match LocalSessionService.establish_anonymous().await {
        Ok(session) => (
            StatusCode::OK,
            Json(ApiResponse::ok(SessionResponse {
                session_id: session.id,
                established_at: session.established_at,
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::err(e.to_string())),
        ),
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteCounterStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    fn create_test_app() -> (Router, SqliteCounterStore) {
        let store = SqliteCounterStore::open_in_memory().unwrap();
        store
            .seed(&[
                Competitor::new("a", "Chocolate Chip", "https://img/a.png").with_votes(3, 1),
                Competitor::new("b", "Oatmeal Raisin", "https://img/b.png"),
            ])
            .unwrap();

        let app = router(AppState {
            store: Arc::new(store.clone()),
        });
        (app, store)
    }

    async fn read_body<T: DeserializeOwned>(response: Response) -> ApiResponse<T> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn patch_request(id: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("PATCH")
            .uri(format!("/api/competitors/{}", id))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_competitors() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/api/competitors").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: ApiResponse<Vec<Competitor>> = read_body(response).await;
        assert!(body.success);
        assert_eq!(body.data.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_patch_sets_counter() {
        let (app, store) = create_test_app();

        let response = app
            .oneshot(patch_request("a", r#"{"counter":"flavorVotes","value":4}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let competitors = store.list_all().await.unwrap();
        assert_eq!(competitors[0].flavor_votes, 4);
        assert_eq!(competitors[0].looks_votes, 1);
    }

    #[tokio::test]
    async fn test_patch_unknown_competitor_is_404() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(patch_request("zzz", r#"{"counter":"looksVotes","value":1}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ApiResponse<()> = read_body(response).await;
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("Competitor zzz not found"));
    }

    #[tokio::test]
    async fn test_patch_rejects_unknown_counter() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(patch_request("a", r#"{"counter":"tasteVotes","value":1}"#))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_session_endpoint_mints_ids() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: ApiResponse<SessionResponse> = read_body(response).await;
        assert_eq!(body.data.unwrap().session_id.len(), 36);
    }
}
