use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use inkwell_common::ContentId;
use inkwell_common::transition::TransitionAction;

use crate::domain::AppState;
use crate::infrastructure::http::api::{ApiError, ApiSuccess};
use crate::infrastructure::http::handlers::content::dto::{
    ContentResponse, CreateContentRequest, TransitionRequest, UpdateContentRequest,
};

mod dto;

pub async fn create_content<S: AppState>(
    State(state): State<S>,
    Json(request): Json<CreateContentRequest>,
) -> Result<ApiSuccess<ContentResponse>, ApiError> {
    let new = request.try_into()?;
    let record = state.publication().create(new).await?;
    Ok(ApiSuccess::new(StatusCode::CREATED, record.into()))
}

pub async fn get_content<S: AppState>(
    Path(id): Path<String>,
    State(state): State<S>,
) -> Result<ApiSuccess<ContentResponse>, ApiError> {
    let record = state.publication().get(parse_id(&id)?).await?;
    Ok(ApiSuccess::new(StatusCode::OK, record.into()))
}

pub async fn update_content<S: AppState>(
    Path(id): Path<String>,
    State(state): State<S>,
    Json(request): Json<UpdateContentRequest>,
) -> Result<ApiSuccess<ContentResponse>, ApiError> {
    let id = parse_id(&id)?;
    let action = TransitionAction::Edit(request.try_into()?);
    let record = state.publication().request_transition(id, action).await?;
    Ok(ApiSuccess::new(StatusCode::OK, record.into()))
}

pub async fn delete_content<S: AppState>(
    Path(id): Path<String>,
    State(state): State<S>,
) -> Result<StatusCode, ApiError> {
    state.publication().delete(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn request_transition<S: AppState>(
    Path(id): Path<String>,
    State(state): State<S>,
    Json(request): Json<TransitionRequest>,
) -> Result<ApiSuccess<ContentResponse>, ApiError> {
    let id = parse_id(&id)?;
    let action = request.try_into()?;
    let record = state.publication().request_transition(id, action).await?;
    Ok(ApiSuccess::new(StatusCode::OK, record.into()))
}

fn parse_id(id: &str) -> Result<ContentId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::UnprocessableEntity(format!("invalid content id '{id}': {e}")))
}
