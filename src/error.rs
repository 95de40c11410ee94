use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{
        collector::SubmitError,
        question::QuestionSetError,
        roster::RosterError,
        state_machine::{ApplyError, DiscardError, PlanError},
    },
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No live session matches the identifier or PIN.
    #[error("session not found: {0}")]
    SessionNotFound(String),
    /// The session is finished and accepts no more participants or answers.
    #[error("session {0} is closed")]
    SessionClosed(Uuid),
    /// The question set is missing or cannot be played.
    #[error("question set invalid: {0}")]
    QuestionSetInvalid(String),
    /// Fewer players than required joined the lobby.
    #[error("not enough players: {joined} joined, {required} required")]
    NotEnoughPlayers { joined: usize, required: usize },
    /// Operation cannot be performed in the current phase.
    #[error("wrong state: {0}")]
    WrongState(String),
    /// The player already answered this question.
    #[error("duplicate submission for question `{0}`")]
    DuplicateSubmission(String),
    /// The question is not accepting answers.
    #[error("question closed: {0}")]
    QuestionClosed(String),
    /// The option is not one of the question's options.
    #[error("option `{option_id}` does not belong to question `{question_id}`")]
    InvalidOption {
        question_id: String,
        option_id: String,
    },
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The nickname is already used in the session.
    #[error("nickname `{0}` is already taken")]
    NicknameTaken(String),
    /// No free PIN could be drawn.
    #[error("no free PIN available after {0} attempts")]
    PinSpaceExhausted(usize),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::SessionNotFound(_) => AppError::NotFound(message),
            ServiceError::SessionClosed(_)
            | ServiceError::NotEnoughPlayers { .. }
            | ServiceError::WrongState(_)
            | ServiceError::DuplicateSubmission(_)
            | ServiceError::QuestionClosed(_)
            | ServiceError::NicknameTaken(_) => AppError::Conflict(message),
            ServiceError::QuestionSetInvalid(_)
            | ServiceError::InvalidOption { .. }
            | ServiceError::InvalidInput(_) => AppError::BadRequest(message),
            ServiceError::Unauthorized(_) => AppError::Unauthorized(message),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Timeout | ServiceError::PinSpaceExhausted(_) => {
                AppError::ServiceUnavailable(message)
            }
        }
    }
}

/// JSON body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::WrongState("state transition already pending".into())
            }
            PlanError::InvalidTransition(invalid) => ServiceError::WrongState(invalid.to_string()),
        }
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::NoPending => ServiceError::WrongState("no transition is pending".into()),
            ApplyError::IdMismatch { .. } => {
                ServiceError::WrongState("pending transition does not match".into())
            }
            ApplyError::PhaseMismatch { expected, actual } => ServiceError::WrongState(format!(
                "state changed during transition (expected {expected:?}, got {actual:?})"
            )),
            ApplyError::VersionMismatch { expected, actual } => ServiceError::WrongState(format!(
                "state version mismatch during transition (expected {expected}, got {actual})"
            )),
        }
    }
}

impl From<DiscardError> for ServiceError {
    fn from(err: DiscardError) -> Self {
        match err {
            DiscardError::NoPending => ServiceError::WrongState("no pending transition".into()),
            DiscardError::IdMismatch { .. } => {
                ServiceError::WrongState("transition plan does not match".into())
            }
        }
    }
}

impl From<SubmitError> for ServiceError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::DuplicateSubmission(question_id) => {
                ServiceError::DuplicateSubmission(question_id)
            }
            SubmitError::QuestionClosed(reason) => ServiceError::QuestionClosed(reason.into()),
            SubmitError::InvalidOption {
                question_id,
                option_id,
            } => ServiceError::InvalidOption {
                question_id,
                option_id,
            },
            SubmitError::UnknownPlayer(player_id) => {
                ServiceError::Unauthorized(format!("player {player_id} is not part of this session"))
            }
        }
    }
}

impl From<RosterError> for ServiceError {
    fn from(err: RosterError) -> Self {
        match err {
            RosterError::NicknameTaken(nickname) => ServiceError::NicknameTaken(nickname),
            RosterError::UnknownPlayer(player_id) => {
                ServiceError::Unauthorized(format!("player {player_id} is not part of this session"))
            }
            RosterError::AlreadyAnswered { question_id, .. } => {
                ServiceError::DuplicateSubmission(question_id)
            }
        }
    }
}

impl From<QuestionSetError> for ServiceError {
    fn from(err: QuestionSetError) -> Self {
        ServiceError::QuestionSetInvalid(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;

    fn status_of(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn domain_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(ServiceError::SessionNotFound("123456".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ServiceError::DuplicateSubmission("q0".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ServiceError::InvalidOption {
                question_id: "q0".into(),
                option_id: "z".into(),
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ServiceError::Unauthorized("host".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(ServiceError::Timeout), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn unknown_players_are_unauthorized() {
        let err = ServiceError::from(SubmitError::UnknownPlayer(Uuid::nil()));
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }
}
