use axum::http::StatusCode;
use thiserror::Error;
use tracing::error;

/// Rejected before anything leaves the process.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("image is empty")]
    EmptyImage,
    #[error("image is {size} bytes, the limit is {max} bytes")]
    ImageTooLarge { size: usize, max: usize },
    #[error("unsupported image type: {0}")]
    UnsupportedMediaType(String),
    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

impl ValidationError {
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("analysis endpoint returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("empty response from analysis endpoint")]
    EmptyResponse,
    #[error("parse failure: {0}")]
    Parse(String),
    #[error("another analysis is already in progress")]
    Busy,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("no active session")]
    NoSession,
    #[error("record {0} not found")]
    NotFound(String),
    #[error("remote data service: {0}")]
    Remote(String),
    #[error("local cache: {0}")]
    Cache(String),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound("row".into()),
            other => Self::Remote(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Analysis(AnalysisError::Busy) => StatusCode::TOO_MANY_REQUESTS,
            Self::Analysis(_) => StatusCode::BAD_GATEWAY,
            Self::Persistence(PersistenceError::NoSession) => StatusCode::UNAUTHORIZED,
            Self::Persistence(PersistenceError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Handlers reject with `(StatusCode, String)`; this lets them use `?` on
/// anything that converts into `AppError`.
impl From<AppError> for (StatusCode, String) {
    fn from(e: AppError) -> Self {
        let status = e.status();
        if status.is_server_error() {
            error!(error = %e, %status, "request failed");
        }
        (status, e.to_string())
    }
}

pub type AppResult<T> = Result<T, (StatusCode, String)>;

pub fn reject(e: impl Into<AppError>) -> (StatusCode, String) {
    e.into().into()
}

#[cfg(test)]
mod errors_tests {
    use super::*;

    #[test]
    fn status_mapping_follows_taxonomy() {
        let too_big = AppError::from(ValidationError::ImageTooLarge { size: 11, max: 10 });
        assert_eq!(too_big.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::from(AnalysisError::EmptyResponse).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(PersistenceError::NoSession).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(PersistenceError::Remote("down".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn size_error_names_both_sizes() {
        let msg = ValidationError::ImageTooLarge { size: 2048, max: 1024 }.to_string();
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));
    }

    #[test]
    fn reject_carries_message() {
        let (status, body) = reject(AnalysisError::Parse("no JSON object".into()));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.starts_with("parse failure"));
    }
}
