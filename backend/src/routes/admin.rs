use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use lottery_shared::rate_limit::day_string;
use lottery_shared::shared_lottery::*;
use rand::rngs::OsRng;
use validator::Validate;

use crate::error::ApiError;
use crate::state::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/codes", get(list_codes).post(issue_code))
        .route("/codes/bulk", post(bulk_issue_codes))
        .route("/codes/:code", delete(delete_code))
        .route("/records", get(today_records))
        .route("/records/prune", post(prune_records))
}

async fn list_codes(State(state): State<AppState>) -> Json<CodeListResponse> {
    Json(CodeListResponse {
        codes: state.lottery.lock().list(),
    })
}

/// Issues the custom code when one is given, otherwise a random one.
async fn issue_code(
    State(state): State<AppState>,
    Json(request): Json<IssueCodeRequest>,
) -> Result<Json<IssuedCodesResponse>, ApiError> {
    request.validate()?;

    let mut lottery = state.lottery.lock();
    let code = match request.code.as_deref().map(str::trim) {
        Some(custom) if !custom.is_empty() => lottery.issue(custom)?,
        _ => lottery.issue_random(&mut OsRng)?,
    };

    Ok(Json(IssuedCodesResponse { codes: vec![code] }))
}

async fn bulk_issue_codes(
    State(state): State<AppState>,
    Json(request): Json<BulkIssueRequest>,
) -> Result<Json<IssuedCodesResponse>, ApiError> {
    request.validate()?;

    let codes = state
        .lottery
        .lock()
        .bulk_issue_random(request.count, &mut OsRng)?;

    Ok(Json(IssuedCodesResponse { codes }))
}

async fn delete_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.lottery.lock().delete(&code)?;
    Ok(Json(serde_json::json!({ "deleted": code.trim().to_uppercase() })))
}

async fn today_records(State(state): State<AppState>) -> Json<IdentityRecordsResponse> {
    let lottery = state.lottery.lock();
    Json(IdentityRecordsResponse {
        day: day_string(lottery.today()),
        records: lottery.today_records(),
    })
}

async fn prune_records(State(state): State<AppState>) -> Result<Json<PruneResponse>, ApiError> {
    let purged = state.lottery.lock().prune_rate_records()?;
    Ok(Json(PruneResponse { purged }))
}
