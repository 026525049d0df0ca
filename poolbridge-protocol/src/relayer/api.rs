// REST surface for the relayer. Reads go through the sliding-window
// limiter; mutating routes additionally require the configured bearer
// token. Errors map onto status codes by their taxonomy class.

use crate::data_structures::{AccountId, AssetId, SwapId};
use crate::error::{ErrorKind, RelayerError};
use crate::relayer::coordinator::{RelayerCoordinator, RelayerStatus};
use crate::relayer::ratelimit::RateLimiter;
use crate::relayer::store::MappingEntry;
use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub struct ApiState {
    pub coordinator: Arc<RelayerCoordinator>,
    pub limiter: Arc<RateLimiter>,
    pub api_token: Option<String>,
}

type SharedState = Arc<ApiState>;

pub struct AppError(RelayerError);

impl From<RelayerError> for AppError {
    fn from(err: RelayerError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RelayerError::NotFound(_) => StatusCode::NOT_FOUND,
            RelayerError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            RelayerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            other => match other.kind() {
                ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::State => StatusCode::CONFLICT,
                ErrorKind::Security => StatusCode::FORBIDDEN,
                ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Resource => StatusCode::INTERNAL_SERVER_ERROR,
            },
        };
        let body = Json(serde_json::json!({
            "error": self.0.to_string(),
            "kind": format!("{:?}", self.0.kind()),
        }));
        (status, body).into_response()
    }
}

fn bearer<'a>(headers: &'a HeaderMap) -> Option<&'a str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

// The limiter key is only the credential when it matches the configured
// token; everything else shares one "anonymous" budget. Keying on
// unvalidated headers would let a caller reset the window by rotating
// them, and grow the limiter map without bound.
fn rate_limit(state: &ApiState, headers: &HeaderMap) -> Result<(), AppError> {
    let caller = match (&state.api_token, bearer(headers)) {
        (Some(expected), Some(token)) if token == expected => expected.as_str(),
        _ => "anonymous",
    };
    if !state.limiter.allow(caller) {
        return Err(AppError(RelayerError::RateLimited));
    }
    Ok(())
}

// Mutating routes only: bearer check first, then the limiter.
fn authorize(state: &ApiState, headers: &HeaderMap) -> Result<(), AppError> {
    if let Some(expected) = &state.api_token {
        match bearer(headers) {
            Some(token) if token == expected => {}
            _ => {
                return Err(AppError(RelayerError::Unauthorized(
                    "missing or invalid bearer token".to_string(),
                )))
            }
        }
    }
    rate_limit(state, headers)
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/start-watch", post(post_start_watch))
        .route("/submit-secret", post(post_submit_secret))
        .route("/initiate-counterpart", post(post_initiate_counterpart))
        .route("/complete-counterpart", post(post_complete_counterpart))
        .route("/mappings", get(get_mappings))
        .route("/mappings/{id}", delete(delete_mapping))
        .with_state(state)
}

/// Binds and serves the API until the process exits.
pub async fn serve(state: SharedState, bind_addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    log::info!("relayer api listening on {bind_addr}");
    axum::serve(listener, router(state)).await
}

async fn get_status(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<RelayerStatus>, AppError> {
    rate_limit(&state, &headers)?;
    Ok(Json(state.coordinator.status()))
}

#[derive(Deserialize)]
struct StartWatchRequest {
    origin_chain_id: u64,
    origin_swap_id: SwapId,
    counterpart_chain_id: u64,
    counterpart_swap_id: SwapId,
}

async fn post_start_watch(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<StartWatchRequest>,
) -> Result<StatusCode, AppError> {
    authorize(&state, &headers)?;
    state
        .coordinator
        .start_watch(
            req.origin_chain_id,
            req.origin_swap_id,
            req.counterpart_chain_id,
            req.counterpart_swap_id,
        )
        .await?;
    Ok(StatusCode::CREATED)
}

#[derive(Deserialize)]
struct SubmitSecretRequest {
    swap_id: SwapId,
    secret_hex: String,
}

#[derive(Serialize)]
struct SubmitSecretResponse {
    completed_on_chain: u64,
}

async fn post_submit_secret(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<SubmitSecretRequest>,
) -> Result<Json<SubmitSecretResponse>, AppError> {
    authorize(&state, &headers)?;
    let secret = hex::decode(&req.secret_hex)
        .map_err(|e| RelayerError::Validation(format!("bad secret hex: {e}")))?;
    let chain = state.coordinator.submit_secret(req.swap_id, &secret).await?;
    Ok(Json(SubmitSecretResponse { completed_on_chain: chain }))
}

#[derive(Deserialize)]
struct InitiateCounterpartRequest {
    origin_chain_id: u64,
    origin_swap_id: SwapId,
    counterpart_chain_id: u64,
    participant: AccountId,
    asset: AssetId,
    amount: u64,
    timelock: i64,
}

#[derive(Serialize)]
struct InitiateCounterpartResponse {
    counterpart_swap_id: SwapId,
}

async fn post_initiate_counterpart(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<InitiateCounterpartRequest>,
) -> Result<(StatusCode, Json<InitiateCounterpartResponse>), AppError> {
    authorize(&state, &headers)?;
    let counterpart_swap_id = state
        .coordinator
        .initiate_counterpart(
            req.origin_chain_id,
            req.origin_swap_id,
            req.counterpart_chain_id,
            req.participant,
            req.asset,
            req.amount,
            req.timelock,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(InitiateCounterpartResponse { counterpart_swap_id })))
}

#[derive(Deserialize)]
struct CompleteCounterpartRequest {
    origin_swap_id: SwapId,
    // When absent, the secret is taken from the counterpart swap's reveal.
    secret_hex: Option<String>,
}

async fn post_complete_counterpart(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(req): Json<CompleteCounterpartRequest>,
) -> Result<StatusCode, AppError> {
    authorize(&state, &headers)?;
    let secret = req
        .secret_hex
        .map(|s| hex::decode(&s))
        .transpose()
        .map_err(|e| RelayerError::Validation(format!("bad secret hex: {e}")))?;
    state
        .coordinator
        .complete_from_counterpart(req.origin_swap_id, secret.as_deref())
        .await?;
    Ok(StatusCode::OK)
}

#[derive(Serialize)]
struct MappingView {
    origin_swap_id: SwapId,
    #[serde(flatten)]
    entry: MappingEntry,
}

async fn get_mappings(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MappingView>>, AppError> {
    rate_limit(&state, &headers)?;
    let mappings = state
        .coordinator
        .mappings()
        .into_iter()
        .map(|(origin_swap_id, entry)| MappingView { origin_swap_id, entry })
        .collect();
    Ok(Json(mappings))
}

async fn delete_mapping(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    authorize(&state, &headers)?;
    let id = SwapId::from_hex(&id)
        .ok_or_else(|| RelayerError::Validation("expected a 32-byte hex swap id".to_string()))?;
    if state.coordinator.remove_mapping(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError(RelayerError::NotFound(format!("mapping {id}"))))
    }
}
