use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::SessionPhase;

/// Session status exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleSessionStatus {
    /// Waiting for players.
    Lobby,
    /// A question accepts answers.
    QuestionActive,
    /// Results of the last question are shown.
    ShowingResults,
    /// The game is over.
    Finished,
}

impl From<&SessionPhase> for VisibleSessionStatus {
    fn from(value: &SessionPhase) -> Self {
        match value {
            SessionPhase::Lobby => VisibleSessionStatus::Lobby,
            SessionPhase::QuestionActive(_) => VisibleSessionStatus::QuestionActive,
            SessionPhase::ShowingResults(_) => VisibleSessionStatus::ShowingResults,
            SessionPhase::Finished(_) => VisibleSessionStatus::Finished,
        }
    }
}

/// Status plus the question it refers to, returned by host commands.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct PhaseResponse {
    pub status: VisibleSessionStatus,
    /// Index of the current (or last shown) question.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_index: Option<usize>,
    /// `completed`, `aborted` or `host_timeout` once finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl From<SessionPhase> for PhaseResponse {
    fn from(value: SessionPhase) -> Self {
        Self {
            status: (&value).into(),
            question_index: value.question_index(),
            finish_reason: match value {
                SessionPhase::Finished(reason) => Some(reason.as_str().to_owned()),
                _ => None,
            },
        }
    }
}
