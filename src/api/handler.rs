use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use tracing::instrument;

use crate::api::middleware::identity::AuthUser;
use crate::api::payload::*;
use crate::api::server::{AppState, JsonResult, RouteError};
use crate::db::prelude::*;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[instrument(skip(state))]
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    AuthUser(id): AuthUser,
) -> JsonResult<BalanceResponse> {
    let balance = state.ledger.balance(id).await?;
    Ok(Json(BalanceResponse { balance }))
}

#[instrument(skip(state, payload))]
pub async fn award(
    State(state): State<Arc<AppState>>,
    AuthUser(id): AuthUser,
    payload: Result<Json<EntryInput>, JsonRejection>,
) -> JsonResult<AwardResponse> {
    let Json(input) = payload?;
    if !input.tx_type.is_self_earn() {
        return Err(RouteError::BadRequest(format!(
            "'{}' cannot be awarded through this procedure",
            input.tx_type
        )));
    }

    let balance = state.ledger.award(id, input.into_entry()).await?;
    Ok(Json(AwardResponse::new(balance)))
}

#[instrument(skip(state, payload))]
pub async fn spend(
    State(state): State<Arc<AppState>>,
    AuthUser(id): AuthUser,
    payload: Result<Json<EntryInput>, JsonRejection>,
) -> JsonResult<SpendResponse> {
    let Json(input) = payload?;
    if input.tx_type != TransactionType::SkipQueue {
        return Err(RouteError::BadRequest(format!(
            "'{}' cannot be spent through this procedure",
            input.tx_type
        )));
    }

    let outcome = state.ledger.spend(id, input.into_entry()).await?;
    Ok(Json(outcome.into()))
}

#[instrument(skip(state, query))]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    AuthUser(id): AuthUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> JsonResult<Vec<TokenTransaction>> {
    let Query(query) = query?;
    let history = state.ledger.history(id, query.limit).await?;

    Ok(Json(history))
}

#[instrument(skip(state))]
pub async fn claim_daily_bonus(
    State(state): State<Arc<AppState>>,
    AuthUser(id): AuthUser,
) -> JsonResult<ClaimResponse> {
    let today = Utc::now().date_naive();
    let outcome = state.ledger.claim_daily_bonus(id, today).await?;

    Ok(Json(outcome.into()))
}

#[instrument(skip(state))]
pub async fn get_streak(
    State(state): State<Arc<AppState>>,
    AuthUser(id): AuthUser,
) -> JsonResult<StreakResponse> {
    Ok(Json(state.ledger.streak(id).await?.into()))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> JsonResult<User> {
    let Json(input) = payload?;
    let user = state.ledger.register(&input.username).await?;

    Ok(Json(user))
}

#[instrument(skip(state, query))]
pub async fn leaderboard_top(
    State(state): State<Arc<AppState>>,
    query: Result<Query<Pagination>, QueryRejection>,
) -> JsonResult<PaginatedResponse<LeaderboardEntry>> {
    let Query(pagination) = query?;
    let page = state.ledger.leaderboard(&pagination).await?;

    Ok(Json(page))
}

#[instrument(skip(state, payload))]
pub async fn admin_grant(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AdminAdjustInput>, JsonRejection>,
) -> JsonResult<AwardResponse> {
    let Json(input) = payload?;
    let entry = admin_entry(input.amount, TransactionType::AdminGrant, input.description);

    let balance = state.ledger.award(input.user_id, entry).await?;
    tracing::info!(user_id = %input.user_id, balance, "admin grant applied");

    Ok(Json(AwardResponse::new(balance)))
}

#[instrument(skip(state, payload))]
pub async fn admin_deduct(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AdminAdjustInput>, JsonRejection>,
) -> JsonResult<SpendResponse> {
    let Json(input) = payload?;
    let entry = admin_entry(input.amount, TransactionType::AdminDeduct, input.description);

    let outcome = state.ledger.spend(input.user_id, entry).await?;
    tracing::info!(user_id = %input.user_id, ?outcome, "admin deduct evaluated");

    Ok(Json(outcome.into()))
}

fn admin_entry(amount: i64, tx_type: TransactionType, description: Option<String>) -> LedgerEntry {
    let entry = LedgerEntry::new(amount, tx_type);
    match description {
        Some(description) => entry.with_description(description),
        None => entry,
    }
}
