use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use log_api::{ErrorKind, LogError};

/// Ошибка HTTP слоя: `LogError` → статус + текст ошибки в теле.
///
/// Ошибки клиента (нет topic'а/записи, кривое смещение, имя, payload)
/// отдаются как 4xx, всё остальное — 500.
#[derive(Debug)]
pub struct ApiError(pub LogError);

impl From<LogError> for ApiError {
    fn from(e: LogError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidOffset | ErrorKind::InvalidTopic | ErrorKind::InvalidRecord => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::Storage | ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "request failed");
        } else {
            tracing::debug!(error = ?self.0, "request rejected");
        }
        (status, format!("{}\n", self.0)).into_response()
    }
}

/// Ошибка запуска API сервера.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("bind api {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },

    #[error("axum serve: {0}")]
    Serve(std::io::Error),
}
