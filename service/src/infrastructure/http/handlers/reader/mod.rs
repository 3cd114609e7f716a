use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use inkwell_common::ContentId;
use inkwell_common::visibility::MembershipTier;

use crate::domain::AppState;
use crate::infrastructure::http::api::{ApiError, ApiSuccess};
use crate::infrastructure::http::handlers::reader::dto::ReaderContentResponse;

mod dto;

/// Set by the upstream member session layer
pub const MEMBERSHIP_TIER_HEADER: &str = "x-membership-tier";

pub async fn read_content<S: AppState>(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<S>,
) -> Result<ApiSuccess<ReaderContentResponse>, ApiError> {
    // malformed ids look like any other missing record to readers
    let id: ContentId = id.parse().map_err(|_| ApiError::NotFound)?;
    let reading = state
        .publication()
        .read_for_viewer(id, membership_tier(&headers))
        .await?;

    reading
        .record
        .and_then(|record| ReaderContentResponse::render(reading.access, record))
        .map(|response| ApiSuccess::new(StatusCode::OK, response))
        .ok_or(ApiError::NotFound)
}

pub async fn list_content<S: AppState>(
    headers: HeaderMap,
    State(state): State<S>,
) -> Result<ApiSuccess<Vec<ReaderContentResponse>>, ApiError> {
    let feed = state
        .publication()
        .list_published(membership_tier(&headers))
        .await?
        .into_iter()
        .filter_map(|reading| {
            let record = reading.record?;
            ReaderContentResponse::render(reading.access, record)
        })
        .collect();

    Ok(ApiSuccess::new(StatusCode::OK, feed))
}

fn membership_tier(headers: &HeaderMap) -> MembershipTier {
    MembershipTier::from_header(
        headers
            .get(MEMBERSHIP_TIER_HEADER)
            .and_then(|value| value.to_str().ok()),
    )
}
