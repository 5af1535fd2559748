use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::submission_dto::{HistoryQuery, SubmitAnswersRequest},
    error::Result,
    AppState,
};

#[axum::debug_handler]
pub async fn submit_answers(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    Json(payload): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let result = state.attempt_service.submit(test_id, payload).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let result = state.attempt_service.get_result(id).await?;
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn user_history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse> {
    query.validate()?;
    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let history = state
        .attempt_service
        .history(user_id, page, per_page)
        .await?;
    Ok(Json(history))
}
