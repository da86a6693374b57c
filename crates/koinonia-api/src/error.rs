//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure leaves the server as `{"error": "<mensaje>"}` with the
//! matching status code. Domain errors carry their own Spanish display
//! strings; backend failures are logged and collapsed into a generic
//! message.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use koinonia_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  Unauthorized(String),

  #[error("{0}")]
  Forbidden(String),

  #[error("{0}")]
  NotFound(String),

  #[error("error interno del servidor")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Lift a store-layer failure into the HTTP vocabulary.
  pub fn store<E: Into<CoreError>>(e: E) -> Self {
    Self::from(e.into())
  }

  /// Wrap a non-domain failure (token signing, password hashing) as a
  /// logged 500.
  pub fn internal(e: impl std::fmt::Display) -> Self {
    Self::from(CoreError::Storage(e.to_string()))
  }
}

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self {
    use CoreError::*;
    match e {
      PersonNotFound(_) | UserNotFound(_) | MinistryNotFound(_)
      | CourseNotFound(_) | CriterionNotFound(_) | TaskNotFound(_)
      | EventNotFound(_) | NotificationNotFound(_) => {
        ApiError::NotFound(e.to_string())
      }

      PercentageRange(_) | PercentageSum { .. }
      | CriterionCourseMismatch { .. } | InvalidTransition { .. }
      | NotCancellationRequest(_) | AlreadyProcessed(_)
      | DuplicateMinistry(_) | DuplicateLeaders | IncompletePerson(_) => {
        ApiError::BadRequest(e.to_string())
      }

      Forbidden(_) => ApiError::Forbidden(e.to_string()),

      UnknownStatus(_) | UnknownRole(_) | UnknownNotificationKind(_)
      | Storage(_) => ApiError::Internal(Box::new(e)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "internal error");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
