//! Dashboard API route handlers.
//!
//! All endpoints return JSON. This is the engine's read surface: every
//! handler is a pure read, GET only — intake and resolution happen through
//! the engine's owning process, not over HTTP.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use crate::engine::reputation::tier_for;
use crate::engine::{Engine, PoolView};
use crate::types::{NewsItem, Pool, ReputationRecord};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub engine: Arc<Engine>,
    pub service_name: String,
    pub currency: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl DashboardState {
    pub fn new(engine: Arc<Engine>, service_name: &str, currency: &str) -> Self {
        Self {
            engine,
            service_name: service_name.to_string(),
            currency: currency.to_string(),
            started_at: chrono::Utc::now(),
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub currency: String,
    pub news_items: usize,
    pub total_pools: u64,
    pub total_staked: Decimal,
    pub users_tracked: usize,
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReputationResponse {
    pub user: String,
    pub tier: String,
    pub accuracy: u8,
    pub total_pools: u32,
    pub correct_pools: u32,
    pub wrong_pools: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub specialties: Vec<String>,
    pub member_since: String,
    pub last_active: String,
}

impl ReputationResponse {
    fn from_record(record: &ReputationRecord) -> Self {
        Self {
            user: record.user.clone(),
            tier: tier_for(record.accuracy()).to_string(),
            accuracy: record.accuracy(),
            total_pools: record.total_pools,
            correct_pools: record.correct_pools,
            wrong_pools: record.wrong_pools,
            current_streak: record.current_streak,
            best_streak: record.best_streak,
            specialties: record.specialties.iter().map(|c| c.to_string()).collect(),
            member_since: record.member_since.to_rfc3339(),
            last_active: record.last_active.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user: String,
    pub tier: String,
    pub accuracy: u8,
    pub total_pools: u32,
    pub current_streak: u32,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub async fn health() -> &'static str {
    "OK"
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let news = state.engine.list_news();
    let total_pools = news.iter().map(|n| n.total_pools).sum();
    let total_staked = news.iter().map(|n| n.total_staked).sum();

    Json(StatusResponse {
        service: state.service_name.clone(),
        currency: state.currency.clone(),
        news_items: news.len(),
        total_pools,
        total_staked,
        users_tracked: state.engine.leaderboard().len(),
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}

pub async fn list_news(State(state): State<AppState>) -> Json<Vec<NewsItem>> {
    Json(state.engine.list_news())
}

pub async fn get_news(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NewsItem>, StatusCode> {
    state
        .engine
        .news_item(&id)
        .map(Json)
        .map_err(|_| StatusCode::NOT_FOUND)
}

pub async fn get_news_pools(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Pool>>, StatusCode> {
    // 404 on an unknown item rather than an empty list.
    state.engine.news_item(&id).map_err(|_| StatusCode::NOT_FOUND)?;
    Ok(Json(state.engine.pools_for_news(&id)))
}

pub async fn get_pool(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PoolView>, StatusCode> {
    state
        .engine
        .pool_view(&id)
        .map(Json)
        .map_err(|_| StatusCode::NOT_FOUND)
}

pub async fn get_reputation(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<ReputationResponse>, StatusCode> {
    state
        .engine
        .reputation(&user)
        .map(|r| Json(ReputationResponse::from_record(&r)))
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn get_leaderboard(State(state): State<AppState>) -> Json<Vec<LeaderboardEntry>> {
    let entries = state
        .engine
        .leaderboard()
        .iter()
        .enumerate()
        .map(|(i, r)| LeaderboardEntry {
            rank: i + 1,
            user: r.user.clone(),
            tier: tier_for(r.accuracy()).to_string(),
            accuracy: r.accuracy(),
            total_pools: r.total_pools,
            current_streak: r.current_streak,
        })
        .collect();
    Json(entries)
}
