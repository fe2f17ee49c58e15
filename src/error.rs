use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::auth::repo_types::StoreError;

const SERVER_ERROR_PAGE: &str = "<!doctype html><html><head><title>Server error</title></head>\
<body><h1>Something went wrong</h1><p>Please try again later.</p><p><a href=\"/\">Home</a></p></body></html>";

/// Failures that end the current request with a 500.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("storage: {0}")]
    Store(#[from] StoreError),
    #[error("template: {0}")]
    Template(#[from] tera::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Html(SERVER_ERROR_PAGE)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failure_is_generic_500() {
        let err = AppError::from(StoreError::Database(sqlx::Error::PoolTimedOut));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
