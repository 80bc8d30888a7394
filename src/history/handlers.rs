use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use crate::ledger::model::DailySummary;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/history", get(get_history))
}

/// Archived days, newest first. Read-only by design: closed days are never
/// edited or deleted.
#[instrument(skip(state))]
pub async fn get_history(State(state): State<AppState>) -> Json<Vec<DailySummary>> {
    Json(state.history.load().await)
}
