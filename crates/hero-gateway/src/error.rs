use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hero_core::HeroError;

/// A [`HeroError`] rendered as a JSON error response.
#[derive(Debug)]
pub struct ApiError(pub HeroError);

impl ApiError {
    /// 404 for a missing agent or task.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self(HeroError::NotFound(what.into()))
    }

    /// HTTP status for the wrapped error.
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            HeroError::NotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            HeroError::Bridge(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<HeroError> for ApiError {
    fn from(e: HeroError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (self.status_code(), body).into_response()
    }
}
