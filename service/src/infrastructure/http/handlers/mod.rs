use axum::http::StatusCode;

pub mod content;
pub mod reader;

// health check handler
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
