use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::state::AppState;

use super::dto::{CreatedMealResponse, ManualMealRequest, TodayResponse};
use super::model::MealRecord;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/today", get(get_today))
        .route("/meals", post(create_manual_meal))
        .route("/meals/:id/image", get(get_meal_image))
}

#[instrument(skip(state))]
pub async fn get_today(
    State(state): State<AppState>,
) -> Result<Json<TodayResponse>, (StatusCode, String)> {
    let now = OffsetDateTime::now_utc();
    let snapshot = state.ledger.snapshot(now).await.map_err(internal)?;
    Ok(Json(TodayResponse::new(
        snapshot,
        state.config.daily_ai_limit,
    )))
}

/// POST /meals — manual entry. Bypasses capture and analysis entirely and
/// is never counted against the AI quota.
#[instrument(skip(state, body))]
pub async fn create_manual_meal(
    State(state): State<AppState>,
    Json(body): Json<ManualMealRequest>,
) -> Result<(StatusCode, HeaderMap, Json<CreatedMealResponse>), (StatusCode, String)> {
    let now = OffsetDateTime::now_utc();
    let record = MealRecord::manual(
        body.title,
        body.calories,
        body.protein,
        body.carbs,
        body.fats,
        now,
    );
    let id = record.id;
    let timestamp = record.timestamp;

    let totals = state.ledger.add(record, now).await.map_err(internal)?;
    info!(meal_id = %id, calories = totals.calories, "manual meal added");

    let mut headers = HeaderMap::new();
    headers.insert(
        header::LOCATION,
        format!("/api/v1/meals/{}", id)
            .parse()
            .map_err(internal)?,
    );

    Ok((
        StatusCode::CREATED,
        headers,
        Json(CreatedMealResponse {
            id,
            timestamp,
            totals,
        }),
    ))
}

/// Raw image bytes for one of today's meals. Archived days have no images.
#[instrument(skip(state))]
pub async fn get_meal_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let now = OffsetDateTime::now_utc();
    match state.ledger.meal_image(id, now).await {
        Ok(Some(bytes)) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "No image for this meal").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
