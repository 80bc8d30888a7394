use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::instrument;

use crate::state::AppState;

use super::dto::{AnalysisStateResponse, ConfirmRequest, ConfirmResponse, PhotoBase64Request};
use super::pipeline::{PipelineError, TotalsEdit};

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/analysis", get(get_analysis))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/analysis", post(begin_capture))
        .route("/analysis/photo", post(analyze_multipart))
        .route("/analysis/photo/base64", post(analyze_base64))
        .route("/analysis/retry", post(retry_analysis))
        .route("/analysis/confirm", post(confirm_analysis))
        .route("/analysis/cancel", post(cancel_analysis))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

#[instrument(skip(state))]
pub async fn get_analysis(
    State(state): State<AppState>,
) -> Result<Json<AnalysisStateResponse>, (StatusCode, String)> {
    let now = OffsetDateTime::now_utc();
    let pipeline_state = state.pipeline.snapshot().await;
    state_response(&state, pipeline_state, now).await
}

#[instrument(skip(state))]
pub async fn begin_capture(
    State(state): State<AppState>,
) -> Result<Json<AnalysisStateResponse>, (StatusCode, String)> {
    let now = OffsetDateTime::now_utc();
    let pipeline_state = state.pipeline.begin_capture(now).await.map_err(pipeline_error)?;
    state_response(&state, pipeline_state, now).await
}

/// POST /analysis/photo (multipart, field `file`)
#[instrument(skip(state, mp))]
pub async fn analyze_multipart(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> Result<Json<AnalysisStateResponse>, (StatusCode, String)> {
    let mut image: Option<Bytes> = None;
    while let Ok(Some(field)) = mp.next_field().await {
        let name = field.name().map(|s| s.to_string());
        if name.as_deref() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            image = Some(data);
            break;
        }
    }
    let Some(image) = image else {
        return Err((StatusCode::BAD_REQUEST, "file field is required".into()));
    };

    let now = OffsetDateTime::now_utc();
    let pipeline_state = state
        .pipeline
        .submit_photo(image, now)
        .await
        .map_err(pipeline_error)?;
    state_response(&state, pipeline_state, now).await
}

/// POST /analysis/photo/base64 { image_b64: "..." }
#[instrument(skip(state, body))]
pub async fn analyze_base64(
    State(state): State<AppState>,
    Json(body): Json<PhotoBase64Request>,
) -> Result<Json<AnalysisStateResponse>, (StatusCode, String)> {
    let bytes = BASE64
        .decode(body.image_b64.as_bytes())
        .map_err(|_| (StatusCode::BAD_REQUEST, "invalid base64".to_string()))?;

    let now = OffsetDateTime::now_utc();
    let pipeline_state = state
        .pipeline
        .submit_photo(Bytes::from(bytes), now)
        .await
        .map_err(pipeline_error)?;
    state_response(&state, pipeline_state, now).await
}

#[instrument(skip(state))]
pub async fn retry_analysis(
    State(state): State<AppState>,
) -> Result<Json<AnalysisStateResponse>, (StatusCode, String)> {
    let now = OffsetDateTime::now_utc();
    let pipeline_state = state.pipeline.retry(now).await.map_err(pipeline_error)?;
    state_response(&state, pipeline_state, now).await
}

#[instrument(skip(state, body))]
pub async fn confirm_analysis(
    State(state): State<AppState>,
    Json(body): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, (StatusCode, String)> {
    let now = OffsetDateTime::now_utc();
    let edit = TotalsEdit {
        calories: body.calories,
        protein: body.protein,
        carbs: body.carbs,
        fats: body.fats,
    };
    let (record, totals) = state.pipeline.confirm(edit, now).await.map_err(pipeline_error)?;
    Ok(Json(ConfirmResponse {
        meal: (&record).into(),
        totals,
    }))
}

#[instrument(skip(state))]
pub async fn cancel_analysis(
    State(state): State<AppState>,
) -> Result<Json<AnalysisStateResponse>, (StatusCode, String)> {
    let now = OffsetDateTime::now_utc();
    let pipeline_state = state.pipeline.cancel().await;
    state_response(&state, pipeline_state, now).await
}

async fn state_response(
    state: &AppState,
    pipeline_state: super::pipeline::PipelineState,
    now: OffsetDateTime,
) -> Result<Json<AnalysisStateResponse>, (StatusCode, String)> {
    let used = state.ledger.usage_count(now).await.map_err(internal)?;
    Ok(Json(AnalysisStateResponse::new(
        &pipeline_state,
        used,
        state.pipeline.quota().limit(),
    )))
}

fn pipeline_error(e: PipelineError) -> (StatusCode, String) {
    match e {
        PipelineError::QuotaExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, e.to_string()),
        PipelineError::InvalidState { .. } => (StatusCode::CONFLICT, e.to_string()),
        PipelineError::Internal(err) => internal(err),
    }
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
