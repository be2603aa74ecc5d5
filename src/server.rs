//! HTTP surface of the portal.
//!
//! Hosts the local MyJKKN proxy path that proxy mode points at, plus a small JSON API
//! over the directory, the approval workflow, notifications and the payment audit
//! trail. Every failure body has the `{success: false, error}` shape of [`ApiResponse`].

use crate::{
    config::api::validate_api_key,
    core::{audit, notifications::NotificationCache, users, workflow},
    errors::{Error, Result},
    myjkkn::{
        ApiError, ApiResponse, ApiResult, Departments, HttpMethod, HttpRequest, Institutions,
        MyJkknClient, Page, Programs, Resource, Staff, Students,
    },
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, error, info, warn};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Portal database
    pub db: DatabaseConnection,
    /// MyJKKN client (also owns the live API configuration)
    pub client: Arc<MyJkknClient>,
    /// Per-user notification summaries
    pub notifications: Arc<NotificationCache>,
    /// Browser origins allowed cross-origin access
    pub cors_origins: Vec<String>,
}

impl Error {
    /// HTTP status this error is reported with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } | Self::Api(ApiError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::ActionNotAllowed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Api(_) => StatusCode::BAD_GATEWAY,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) | Self::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ApiResponse::<()>::failure(message))).into_response()
    }
}

/// CORS limited to `origins`. Unparseable entries are skipped with a warning.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| warn!("Ignoring invalid CORS origin '{origin}'"))
                .ok()
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Builds the router, allowing cross-origin calls only from the configured origins.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origins);
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/myjkkn/*path", get(proxy_myjkkn))
        .route("/api/directory/:resource", get(directory_page))
        .route(
            "/api/service-requests/:id/actions",
            get(request_actions).post(apply_request_action),
        )
        .route(
            "/api/notifications/:user_id/unread-count",
            get(notification_unread_count),
        )
        .route("/api/payments/:order_id/trail", get(payment_trail))
        .layer(cors)
        .with_state(state)
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

fn unauthorized(error: &ApiError) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::failure(error.to_string())),
    )
        .into_response()
}

/// Bearer key from the caller's `Authorization` header, checked for the MyJKKN key shape.
fn caller_api_key(headers: &HeaderMap) -> std::result::Result<String, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::MissingApiKey)?;
    let key = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(ApiError::InvalidApiKey)?;
    if !validate_api_key(key) {
        return Err(ApiError::InvalidApiKey);
    }
    Ok(key.to_string())
}

/// Forwards a GET to the upstream host and relays status and body unchanged.
///
/// Always targets `base_url`, even in proxy mode, so the proxy never calls itself.
/// The caller must present its own well-formed bearer key; the server's key is never
/// attached on its behalf.
async fn proxy_myjkkn(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    debug!("Proxying MyJKKN GET /{}", path);
    let key = match caller_api_key(&headers) {
        Ok(key) => key,
        Err(e) => {
            debug!("Rejecting proxy call: {e}");
            return unauthorized(&e);
        }
    };
    let config = state.client.config().current();

    let request = HttpRequest {
        method: HttpMethod::Get,
        url: format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        ),
        query,
        headers: vec![
            ("Authorization".to_string(), format!("Bearer {key}")),
            ("Content-Type".to_string(), "application/json".to_string()),
        ],
        body: None,
    };

    match state.client.transport().send(request).await {
        Ok(upstream) => {
            let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
            (
                status,
                [(header::CONTENT_TYPE, "application/json")],
                upstream.body,
            )
                .into_response()
        }
        Err(e) => {
            warn!("MyJKKN proxy request failed: {e}");
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::<()>::failure(ApiError::Network(e).to_string())),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryParams {
    page: Option<u32>,
    limit: Option<u32>,
    search: Option<String>,
}

async fn fetch_directory<R: Resource>(
    client: &MyJkknClient,
    params: &DirectoryParams,
) -> ApiResult<Page<Value>> {
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(crate::directory::DEFAULT_PAGE_SIZE);
    let fetched = match params.search.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => client.search::<R>(text, page, limit).await?,
        _ => client.list::<R>(page, limit).await?,
    };
    let data = fetched
        .data
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ApiError::Decode(e.to_string()))?;
    Ok(Page {
        data,
        metadata: fetched.metadata,
    })
}

async fn directory_page(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(params): Query<DirectoryParams>,
) -> Result<Json<ApiResponse<Page<Value>>>> {
    let client = state.client.as_ref();
    let page = match resource.as_str() {
        "students" => fetch_directory::<Students>(client, &params).await?,
        "staff" => fetch_directory::<Staff>(client, &params).await?,
        "institutions" => fetch_directory::<Institutions>(client, &params).await?,
        "departments" => fetch_directory::<Departments>(client, &params).await?,
        "programs" => fetch_directory::<Programs>(client, &params).await?,
        other => return Err(Error::not_found("directory resource", other)),
    };
    Ok(Json(ApiResponse::ok(page)))
}

#[derive(Debug, Deserialize)]
struct ActorParams {
    actor_id: String,
}

async fn request_actions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<ActorParams>,
) -> Result<Json<workflow::AvailableActions>> {
    let actor = users::load_actor(&state.db, &params.actor_id).await?;
    Ok(Json(workflow::available_actions(&state.db, id, &actor).await?))
}

#[derive(Debug, Deserialize)]
struct ActionBody {
    actor_id: String,
    action: workflow::RequestAction,
    expected_version: i32,
    #[serde(default)]
    comment: Option<String>,
}

async fn apply_request_action(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ActionBody>,
) -> Result<Json<crate::entities::ServiceRequestModel>> {
    debug!("{} requests {} on service request {}", body.actor_id, body.action, id);
    let actor = users::load_actor(&state.db, &body.actor_id).await?;
    let updated = workflow::apply_action(
        &state.db,
        id,
        body.expected_version,
        body.action,
        &actor,
        body.comment,
    )
    .await?;
    state.notifications.invalidate(&updated.requester_id).await;
    Ok(Json(updated))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UnreadCount {
    user_id: String,
    unread_count: u64,
}

async fn notification_unread_count(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UnreadCount>> {
    let summary = state.notifications.summary(&state.db, &user_id).await?;
    Ok(Json(UnreadCount {
        user_id,
        unread_count: summary.unread_count,
    }))
}

async fn payment_trail(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<audit::TransactionTrail>> {
    Ok(Json(audit::get_transaction_trail(&state.db, &order_id).await?))
}
