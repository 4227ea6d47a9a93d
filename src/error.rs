use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Every failure a handler can surface. The message is what the client sees.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upload(String),
    #[error("{0}")]
    Storage(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Upload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Authentication(_) | AppError::Authorization(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn invalid_inputs() -> Self {
        AppError::Validation("Invalid inputs passed, please check your data.".into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        debug!(%status, message = %self, "request failed");
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

pub async fn route_not_found() -> AppError {
    AppError::NotFound("Could not find this route.".into())
}

/// A known path hit with the wrong method answers like an unknown route.
pub async fn method_not_allowed_as_not_found(res: Response) -> Response {
    if res.status() == StatusCode::METHOD_NOT_ALLOWED {
        return route_not_found().await.into_response();
    }
    res
}
