//! DTO definitions used by the session REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        events::OptionSnapshot,
        format_system_time,
        phase::{PhaseResponse, VisibleSessionStatus},
        validation::{validate_nickname, validate_pin},
    },
    state::{
        leaderboard::LeaderboardEntry,
        session::{JoinOutcome, QuestionView, SessionView, SubmitOutcome},
    },
};

/// Payload used by a host to open a session from a question set.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    pub question_set_id: Uuid,
    /// Opaque host identity; host commands must present it in `X-Host-Id`.
    #[validate(length(min = 1, max = 128))]
    pub host_id: String,
}

/// Identifiers of a freshly created session.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub pin: String,
}

/// Payload used by a player to enter a session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinSessionRequest {
    #[validate(custom(function = "validate_pin"))]
    pub pin: String,
    #[validate(custom(function = "validate_nickname"))]
    pub nickname: String,
}

/// Identity handed to a player; answers must present `player_id` in `X-Player-Id`.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinSessionResponse {
    pub player_id: Uuid,
    pub session_id: Uuid,
    pub nickname: String,
    /// Joined mid-game; answers count from the next question.
    pub observer: bool,
}

impl JoinSessionResponse {
    pub fn new(session_id: Uuid, outcome: JoinOutcome) -> Self {
        Self {
            player_id: outcome.player.id,
            session_id,
            nickname: outcome.player.nickname,
            observer: outcome.observer,
        }
    }
}

/// Answer submitted by a player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1))]
    pub question_id: String,
    #[validate(length(min = 1))]
    pub option_id: String,
    /// Client-measured latency since the question was shown, in milliseconds.
    #[validate(range(max = 3_600_000))]
    pub response_time_ms: u64,
}

/// Verdict on an accepted answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitAnswerResponse {
    pub is_correct: bool,
    pub score_awarded: u32,
    pub total_score: u32,
}

impl From<SubmitOutcome> for SubmitAnswerResponse {
    fn from(value: SubmitOutcome) -> Self {
        Self {
            is_correct: value.is_correct,
            score_awarded: value.score_awarded,
            total_score: value.total_score,
        }
    }
}

/// The open question, without its correct option.
#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentQuestionResponse {
    pub question_index: usize,
    pub question_id: String,
    pub text: String,
    pub options: Vec<OptionSnapshot>,
    pub duration_seconds: u32,
    pub question_started_at: String,
    /// Milliseconds left before answers are refused.
    pub remaining_ms: u64,
}

impl From<QuestionView> for CurrentQuestionResponse {
    fn from(value: QuestionView) -> Self {
        Self {
            question_index: value.index,
            question_id: value.id,
            text: value.text,
            options: value.options.iter().map(OptionSnapshot::from).collect(),
            duration_seconds: value.duration_seconds,
            question_started_at: format_system_time(value.started_at),
            remaining_ms: u64::try_from(value.remaining.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Public snapshot of a session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub pin: String,
    pub title: String,
    pub question_set_id: Uuid,
    pub status: VisibleSessionStatus,
    pub phase: PhaseResponse,
    pub question_count: usize,
    pub player_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<CurrentQuestionResponse>,
    pub created_at: String,
}

impl From<SessionView> for SessionResponse {
    fn from(value: SessionView) -> Self {
        Self {
            session_id: value.id,
            pin: value.pin,
            title: value.title,
            question_set_id: value.question_set_id,
            status: (&value.phase).into(),
            phase: value.phase.into(),
            question_count: value.question_count,
            player_count: value.player_count,
            current_question: value.current_question.map(Into::into),
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Full ranking of a session.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub session_id: Uuid,
    pub entries: Vec<LeaderboardEntry>,
}

/// Question set available in the bank.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionSetListItem {
    pub id: Uuid,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_requests_are_validated() {
        let valid = JoinSessionRequest {
            pin: "123456".into(),
            nickname: "Ada".into(),
        };
        assert!(valid.validate().is_ok());

        let invalid = JoinSessionRequest {
            pin: "12ab".into(),
            nickname: " ".into(),
        };
        let errors = invalid.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("pin"));
        assert!(errors.field_errors().contains_key("nickname"));
    }

    #[test]
    fn blank_host_ids_are_rejected() {
        let request = CreateSessionRequest {
            question_set_id: Uuid::nil(),
            host_id: String::new(),
        };
        assert!(request.validate().is_err());
    }
}
