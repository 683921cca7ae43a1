use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use lottery_shared::selector::uniform_source;
use lottery_shared::shared_lottery::*;
use lottery_shared::RedemptionSession;
use rand::rngs::OsRng;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::state::{AppState, SpinGuard};

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/prizes", get(get_prizes))
        .route("/verify", post(verify_code))
        .route("/spin", post(spin_wheel))
        .route("/abandon", post(abandon_session))
        .route("/stats", get(get_stats))
}

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::UnknownSession)
}

async fn get_prizes(State(state): State<AppState>) -> Json<PrizeTableResponse> {
    Json(PrizeTableResponse::from(&state.config.prizes))
}

async fn verify_code(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    request.validate()?;

    let identity = state
        .identity
        .resolve(&headers, peer.map(|ConnectInfo(addr)| addr))
        .await;

    let mut session = RedemptionSession::new();
    let verified = {
        let lottery = state.lottery.lock();
        lottery
            .verify(&mut session, &request.code, &identity)
            .map(|_| lottery.rate_status(&identity).remaining_attempts)
    };

    match verified {
        Ok(remaining) => {
            state.sessions.purge_expired();
            let id = state.sessions.insert(session);
            tracing::info!("🎟️ Code verified for {} (session {})", identity, id);
            Ok(Json(VerifyResponse::verified(id.to_string(), remaining)))
        }
        Err(e) => {
            tracing::debug!("Verification failed for {}: {}", identity, e);
            Ok(Json(VerifyResponse::rejected(&e)))
        }
    }
}

/// Starts the spin, waits out the suspense delay without holding any lock,
/// then settles. Dropping the request mid-spin abandons the session.
async fn spin_wheel(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SpinResponse>, ApiError> {
    let id = parse_session_id(&request.session_id)?;

    let started = state
        .sessions
        .with_session(&id, |session| {
            session.spin(&state.config.prizes, uniform_source(&mut OsRng))
        })
        .ok_or(ApiError::UnknownSession)?;

    if let Err(e) = started {
        return Ok(Json(SpinResponse::failed(&e)));
    }

    let guard = SpinGuard::new(state.sessions.clone(), id);
    tokio::time::sleep(state.config.spin_delay).await;
    let mut session = guard.take().ok_or(ApiError::UnknownSession)?;

    let settled = state.lottery.lock().settle(&mut session);
    match settled {
        Ok(outcome) => {
            tracing::info!(
                "🎡 WHEEL SPIN: {} redeemed {} and won {}",
                outcome.identity,
                outcome.code,
                outcome.prize.name
            );
            Ok(Json(SpinResponse::settled(&outcome, state.config.prizes.len())))
        }
        Err(e) => Ok(Json(SpinResponse::failed(&e))),
    }
}

async fn abandon_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_session_id(&request.session_id)?;
    let mut session = state.sessions.remove(&id).ok_or(ApiError::UnknownSession)?;
    session.abandon();
    Ok(Json(serde_json::json!({ "abandoned": true })))
}

async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.lottery.lock().stats())
}
