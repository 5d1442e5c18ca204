use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::DataError;
use crate::domain::appointments::{BookingError, TransitionError};
use crate::domain::directory::ApplicationError;
use crate::domain::journal::JournalError;
use crate::domain::moderation::ModerationError;
use crate::domain::mood::MoodError;
use crate::domain::profile::ProfileError;

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Authorization required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    /// An extractor refused the request before the handler ran.
    #[error("{1}")]
    Rejected(StatusCode, String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Rejected(status, _) => *status,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(detail) => ErrorResponse {
                error: "Validation failed".to_string(),
                message: Some(detail.clone()),
            },
            AppError::Conflict(detail) => ErrorResponse {
                error: "Conflict".to_string(),
                message: Some(detail.clone()),
            },
            AppError::Rejected(_, detail) => ErrorResponse {
                error: "Invalid request".to_string(),
                message: Some(detail.clone()),
            },
            other => ErrorResponse {
                error: other.to_string(),
                message: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(what) => AppError::NotFound(what),
            DataError::Conflict(what) => AppError::Conflict(format!("{} already exists", what)),
            other => {
                tracing::error!(error = %other, "data source failure");
                AppError::Internal
            }
        }
    }
}

macro_rules! validation_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AppError {
                fn from(err: $ty) -> Self {
                    AppError::Validation(err.to_string())
                }
            }
        )*
    };
}

validation_error!(BookingError, ProfileError, MoodError, JournalError, ApplicationError);

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotPermitted(_) => AppError::Forbidden("Only the therapist can do that"),
            other => AppError::Conflict(other.to_string()),
        }
    }
}

macro_rules! rejection_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AppError {
                fn from(rejection: $ty) -> Self {
                    AppError::Rejected(rejection.status(), rejection.body_text())
                }
            }
        )*
    };
}

rejection_error!(JsonRejection, QueryRejection, PathRejection);

impl From<ModerationError> for AppError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::AlreadyClosed(_) => AppError::Conflict(err.to_string()),
            other => AppError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::appointments::{AppointmentStatus, Transition};
    use crate::domain::moderation::FlagStatus;

    async fn body_of(err: AppError) -> (StatusCode, ErrorResponse) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_errors_carry_detail() {
        let (status, body) = body_of(MoodError::OutOfRange(11).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Validation failed");
        assert!(body.message.unwrap().contains("between 1 and 10"));
    }

    #[tokio::test]
    async fn test_state_conflicts_map_to_409() {
        let err: AppError = TransitionError::InvalidEdge {
            from: AppointmentStatus::Completed,
            action: Transition::Cancel,
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: AppError = ModerationError::AlreadyClosed(FlagStatus::Reviewed).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let err: AppError = ModerationError::MissingRule.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_backend_failures_are_generic() {
        let (status, body) = body_of(DataError::Corrupt("appointments: bad".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
        assert!(body.message.is_none());
    }

    #[tokio::test]
    async fn test_rejections_keep_status_and_body_shape() {
        let (status, body) =
            body_of(AppError::Rejected(StatusCode::UNPROCESSABLE_ENTITY, "missing field `positive`".into()))
                .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error, "Invalid request");
        assert_eq!(body.message.as_deref(), Some("missing field `positive`"));
    }

    #[test]
    fn test_permission_errors_are_forbidden() {
        let err: AppError = TransitionError::NotPermitted(Transition::Confirm).into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
