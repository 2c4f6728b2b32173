use std::collections::BTreeMap;

use aggregator::{ApiError, LocalLog, LogApi};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use decider::{Correlation, DeciderInput};
use serde::{Deserialize, Serialize};
use tlog::{FileStorage, TlogError};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::auth::{verify_request, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::state::SharedState;
use crate::wire::{decode_bytes, decode_hash, EntriesDto, ErrorBody, MapValueDto, ProofDto, SthDto, SubmitRequest};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/sth", get(get_sth))
        .route("/log/consistency", get(get_consistency))
        .route("/log/audit", get(get_audit))
        .route("/log/entries", get(get_entries))
        .route("/map/value", get(get_map_value))
        .route("/submit", post(submit))
        .route("/decide/:input_hash", get(decide))
        .route("/hashmap/:input_hash", get(hash_map))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug)]
pub struct RouteError {
    status: StatusCode,
    message: String,
}

impl RouteError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    fn bad_request(message: impl ToString) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.to_string())
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

fn tlog_status(e: &TlogError) -> StatusCode {
    match e {
        TlogError::OutOfRange(_)
        | TlogError::MalformedRecord(_)
        | TlogError::RecordTooLarge(_)
        | TlogError::InvalidProof => StatusCode::BAD_REQUEST,
        TlogError::DuplicateKey(_) => StatusCode::CONFLICT,
        TlogError::CannotSign => StatusCode::FORBIDDEN,
        TlogError::NotFound { .. } => StatusCode::NOT_FOUND,
        TlogError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        TlogError::BadSignature | TlogError::Key(_) | TlogError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<ApiError> for RouteError {
    fn from(e: ApiError) -> Self {
        let status = match &e {
            ApiError::Log(inner) => tlog_status(inner),
            ApiError::Remote { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Transport(_) | ApiError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %e, "tlogd: request failed");
        }
        Self::new(status, e.to_string())
    }
}

type RouteResult<T> = Result<Json<T>, RouteError>;

fn local(state: &SharedState) -> Result<&LocalLog<FileStorage>, RouteError> {
    state
        .local
        .as_ref()
        .ok_or_else(|| RouteError::new(StatusCode::NOT_FOUND, "no local log is served here"))
}

async fn get_sth(State(state): State<SharedState>) -> RouteResult<SthDto> {
    let sth = local(&state)?.get_sth().await?;
    Ok(Json(SthDto::from(&sth)))
}

#[derive(Deserialize)]
pub struct ConsistencyQuery {
    pub first: u64,
    pub second: u64,
}

async fn get_consistency(
    State(state): State<SharedState>,
    Query(q): Query<ConsistencyQuery>,
) -> RouteResult<ProofDto> {
    let proof = local(&state)?.get_log_consistency_proof(q.first, q.second).await?;
    Ok(Json(ProofDto::new(&proof)))
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub index: u64,
    pub tree_size: u64,
}

async fn get_audit(State(state): State<SharedState>, Query(q): Query<AuditQuery>) -> RouteResult<ProofDto> {
    let proof = local(&state)?.get_log_audit_proof(q.index, q.tree_size).await?;
    Ok(Json(ProofDto::new(&proof)))
}

#[derive(Deserialize)]
pub struct EntriesQuery {
    pub start: u64,
    pub finish: u64,
}

async fn get_entries(
    State(state): State<SharedState>,
    Query(q): Query<EntriesQuery>,
) -> RouteResult<EntriesDto> {
    let entries = local(&state)?.get_log_entries(q.start, q.finish).await?;
    Ok(Json(EntriesDto { entries: entries.iter().map(hex::encode).collect() }))
}

#[derive(Deserialize)]
pub struct MapValueQuery {
    /// Hex-encoded key.
    pub key: String,
    pub map_root: String,
}

async fn get_map_value(
    State(state): State<SharedState>,
    Query(q): Query<MapValueQuery>,
) -> RouteResult<MapValueDto> {
    let key = decode_bytes("key", &q.key).map_err(RouteError::bad_request)?;
    let root = decode_hash("map_root", &q.map_root).map_err(RouteError::bad_request)?;
    let found = local(&state)?.get_map_value(&key, &root).await?;
    Ok(Json(MapValueDto::from(&found)))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn submit(State(state): State<SharedState>, headers: HeaderMap, body: Bytes) -> RouteResult<SthDto> {
    let Some(secret) = state.submit_secret.as_deref() else {
        return Err(RouteError::new(StatusCode::FORBIDDEN, "submit is disabled"));
    };
    verify_request(
        secret,
        header(&headers, TIMESTAMP_HEADER),
        header(&headers, SIGNATURE_HEADER),
        &body,
    )
    .map_err(|e| {
        warn!(error = %e, "tlogd: rejected submit");
        RouteError::new(StatusCode::FORBIDDEN, e.to_string())
    })?;

    let req: SubmitRequest = serde_json::from_slice(&body).map_err(RouteError::bad_request)?;
    let items = req.into_pairs().map_err(RouteError::bad_request)?;
    let count = items.len();

    let log = local(&state)?;
    let sth = log.submit(items).await?;
    info!(items = count, tree_size = sth.tree_size, "tlogd: submit committed");
    // Our own cache should see the new head before the next tick.
    state.sths().trigger(log.core().name());
    Ok(Json(SthDto::from(&sth)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DecideFailure {
    pub error: String,
    pub responses: Vec<DeciderInput>,
    pub misses: Vec<String>,
}

async fn decide(State(state): State<SharedState>, Path(input_hash): Path<String>) -> Response {
    match state.aggregator.decide(input_hash.as_bytes()).await {
        Ok(correlation) => Json::<Correlation>(correlation).into_response(),
        Err(failure) => {
            warn!(input_hash = %input_hash, error = %failure, "tlogd: no decision");
            let body = DecideFailure {
                error: failure.to_string(),
                responses: failure.responses,
                misses: failure.misses,
            };
            (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
        }
    }
}

async fn hash_map(
    State(state): State<SharedState>,
    Path(input_hash): Path<String>,
) -> Json<BTreeMap<String, String>> {
    Json(state.aggregator.hash_map(input_hash.as_bytes()).await)
}
