//! Local web UI.
//!
//! A single embedded page plus a small JSON API over [`Workspace`].
//! Errors are rendered with [`Error::to_json`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::cron::{parse_cron, CRON_PRESETS};
use crate::error::{Error, Result};
use crate::slug::is_valid_slug;
use crate::templates::list_templates;
use crate::workspace::{check_workflow_id, CreateRequest, EditRequest, Workspace};

const INDEX_HTML: &str = include_str!("static/index.html");

/// Upper bound on previewed runs per request.
const MAX_PREVIEW_RUNS: usize = 50;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub workspace: Arc<Workspace>,
}

impl AppState {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace: Arc::new(workspace),
        }
    }
}

/// Error wrapper mapping categories to HTTP statuses.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::Auth { .. } => StatusCode::UNAUTHORIZED,
            Error::File { .. } => StatusCode::NOT_FOUND,
            Error::Api { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(self.0.to_json())).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build the router with state applied.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route("/api/templates", get(templates))
        .route("/api/presets", get(presets))
        .route("/api/cron/validate", post(validate_cron))
        .route("/api/workflows", get(list_workflows).post(create_workflow))
        .route("/api/workflows/{slug}", get(inspect_workflow).put(edit_workflow))
        .route("/api/workflows/{slug}/deploy", post(deploy_workflow))
        .route("/api/workflows/{slug}/activate", post(activate_workflow))
        .route("/api/workflows/{slug}/deactivate", post(deactivate_workflow))
        .route("/api/workflows/{slug}/archive", post(archive_workflow))
        .route("/api/remote", get(list_remote))
        .route("/api/remote/{id}/import", post(import_workflow))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the UI until Ctrl+C.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Web UI listening on http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down web UI");
}

fn checked_slug(slug: &str) -> ApiResult<()> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(Error::validation(format!("Invalid slug '{}'", slug)).into())
    }
}

async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusQuery {
    /// Also probe the server
    check: bool,
}

async fn status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workspace.status(query.check).await?))
}

async fn templates() -> impl IntoResponse {
    Json(list_templates())
}

async fn presets() -> impl IntoResponse {
    Json(CRON_PRESETS)
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    expression: String,
    timezone: Option<String>,
    count: Option<usize>,
}

async fn validate_cron(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> impl IntoResponse {
    let timezone = req
        .timezone
        .unwrap_or_else(|| state.workspace.default_timezone().to_string());
    let count = req.count.map(|c| c.clamp(1, MAX_PREVIEW_RUNS));
    Json(parse_cron(&req.expression, Some(&timezone), count))
}

async fn list_workflows(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workspace.list_local().await?))
}

async fn create_workflow(
    State(state): State<AppState>,
    Json(req): Json<CreateRequest>,
) -> ApiResult<impl IntoResponse> {
    let manifest = state.workspace.create(&req).await?;
    Ok((StatusCode::CREATED, Json(manifest)))
}

async fn inspect_workflow(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    checked_slug(&slug)?;
    Ok(Json(state.workspace.inspect(&slug).await?))
}

async fn edit_workflow(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<EditRequest>,
) -> ApiResult<impl IntoResponse> {
    checked_slug(&slug)?;
    Ok(Json(state.workspace.edit(&slug, &req).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeployQuery {
    activate: bool,
}

async fn deploy_workflow(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<DeployQuery>,
) -> ApiResult<impl IntoResponse> {
    checked_slug(&slug)?;
    Ok(Json(state.workspace.deploy(&slug, query.activate).await?))
}

async fn activate_workflow(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    checked_slug(&slug)?;
    Ok(Json(state.workspace.set_active(&slug, true).await?))
}

async fn deactivate_workflow(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    checked_slug(&slug)?;
    Ok(Json(state.workspace.set_active(&slug, false).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArchiveQuery {
    deactivate: bool,
}

async fn archive_workflow(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ArchiveQuery>,
) -> ApiResult<impl IntoResponse> {
    checked_slug(&slug)?;
    Ok(Json(state.workspace.archive(&slug, query.deactivate).await?))
}

async fn list_remote(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.workspace.list_remote().await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImportQuery {
    slug: Option<String>,
}

async fn import_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ImportQuery>,
) -> ApiResult<impl IntoResponse> {
    check_workflow_id(&id)?;
    let manifest = state
        .workspace
        .import(&id, query.slug.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(manifest)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthStore;
    use crate::registry::RegistryStore;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(
            dir.path().join("project"),
            RegistryStore::new(dir.path().join("registry.json")),
            AuthStore::new(dir.path().join("config.json")),
            "UTC",
        );
        (dir, create_router(AppState::new(workspace)))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_index_served() {
        let (_dir, app) = app();
        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("cron8n"));
    }

    #[tokio::test]
    async fn test_catalog_endpoints() {
        let (_dir, app) = app();
        let (status, body) = send(&app, get("/api/presets")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 5);

        let (_, body) = send(&app, get("/api/templates")).await;
        assert_eq!(body[1]["name"], "http-request");
        assert_eq!(body[1]["requiresUrl"], true);

        let (_, body) = send(&app, get("/api/status")).await;
        assert_eq!(body["authenticated"], false);
        assert_eq!(body["defaultTimezone"], "UTC");
    }

    #[tokio::test]
    async fn test_validate_cron() {
        let (_dir, app) = app();
        let (status, body) = send(
            &app,
            json_request("POST", "/api/cron/validate", json!({ "expression": "*/15 * * * *", "count": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isValid"], true);
        assert_eq!(body["nextRuns"].as_array().unwrap().len(), 3);

        let (_, body) = send(
            &app,
            json_request("POST", "/api/cron/validate", json!({ "expression": "60 * * * *" })),
        )
        .await;
        assert_eq!(body["isValid"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_workflow_lifecycle() {
        let (_dir, app) = app();
        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/workflows",
                json!({ "name": "Daily Backup", "cronExpression": "0 0 * * *", "template": "code" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["slug"], "daily-backup");
        assert_eq!(body["template"], "code");

        let (_, body) = send(&app, get("/api/workflows")).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = send(
            &app,
            json_request("PUT", "/api/workflows/daily-backup", json!({ "cronExpression": "0 6 * * *" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cronExpression"], "0 6 * * *");

        let (status, body) = send(&app, get("/api/workflows/daily-backup")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["schedule"]["nextRuns"].as_array().unwrap().len(), 5);

        let (status, _) = send(
            &app,
            json_request("POST", "/api/workflows/daily-backup/archive", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get("/api/workflows/daily-backup")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "FILE_ERROR");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (_dir, app) = app();

        let (status, body) = send(
            &app,
            json_request("POST", "/api/workflows", json!({ "name": "x", "cronExpression": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"]["hint"].is_string());

        let (status, _) = send(&app, get("/api/remote")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, get("/api/workflows/Not_A_Slug")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_import_rejects_encoded_path_id() {
        let (_dir, app) = app();
        for uri in ["/api/remote/a%2Fb/import", "/api/remote/..%2F..%2Ftags/import"] {
            let (status, body) = send(&app, json_request("POST", uri, json!({}))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        }

        // a plain id gets past the guard and fails on auth instead
        let (status, _) = send(&app, json_request("POST", "/api/remote/wf-1/import", json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
