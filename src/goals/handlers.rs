use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{info, instrument, warn};

use crate::ledger::model::MacroGoals;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/goals", get(get_goals).put(put_goals))
}

#[instrument(skip(state))]
pub async fn get_goals(State(state): State<AppState>) -> Json<MacroGoals> {
    Json(state.goals.get().await)
}

#[instrument(skip(state, body))]
pub async fn put_goals(
    State(state): State<AppState>,
    Json(body): Json<MacroGoals>,
) -> Result<Json<MacroGoals>, (StatusCode, String)> {
    if body.calories < 0 || body.protein < 0 || body.carbs < 0 || body.fats < 0 {
        warn!(?body, "rejected negative goals");
        return Err((
            StatusCode::BAD_REQUEST,
            "Goals must be non-negative".into(),
        ));
    }

    let saved = state
        .goals
        .save(body)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    info!(calories = saved.calories, "goals updated");
    Ok(Json(saved))
}
