use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Read-only question set as served by the question bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionSetEntity {
    /// Stable identifier for the question set.
    pub id: Uuid,
    /// Human readable title of the quiz.
    pub title: String,
    /// Questions in authoring order (sorted by `order` when loaded).
    pub questions: Vec<QuestionEntity>,
}

/// Single question entry inside a question set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Identifier of the question, unique inside its set.
    pub id: String,
    /// Position of the question inside the set.
    pub order: u32,
    /// Prompt displayed to players.
    pub text: String,
    /// Candidate answers.
    pub options: Vec<OptionEntity>,
    /// Identifier of the option counted as correct.
    pub correct_option_id: String,
    /// Time allowed to answer, in seconds.
    pub duration_seconds: u32,
}

/// Candidate answer of a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionEntity {
    /// Identifier of the option, unique inside its question.
    pub id: String,
    /// Label displayed to players.
    pub text: String,
}

/// Persisted status of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatusEntity {
    Lobby,
    QuestionActive,
    ShowingResults,
    Finished,
}

/// Session record written by the session recorder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Primary key of the session.
    pub id: Uuid,
    /// Join PIN handed out to players.
    pub pin: String,
    /// Identifier of the host driving the session.
    pub host_id: String,
    /// Question set played in this session.
    pub question_set_id: Uuid,
    /// Status at the time of the write.
    pub status: SessionStatusEntity,
    /// Index of the current (or last played) question.
    pub current_question_index: Option<usize>,
    /// When the current question opened.
    pub question_started_at: Option<SystemTime>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// When the session reached its terminal state.
    pub finished_at: Option<SystemTime>,
    /// Why the session finished (`completed`, `aborted`, `host_timeout`).
    pub finish_reason: Option<String>,
}

/// Player record written by the session recorder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Session the player belongs to.
    pub session_id: Uuid,
    /// Identifier of the player inside the session.
    pub player_id: Uuid,
    /// Display name chosen by the player.
    pub nickname: String,
    /// Cumulative score.
    pub score: u32,
    /// When the player joined.
    pub joined_at: SystemTime,
    /// Whether the player currently holds an open event stream.
    pub connected: bool,
}

/// Append-only answer record written by the session recorder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    /// Session the answer belongs to.
    pub session_id: Uuid,
    /// Question the answer targets.
    pub question_id: String,
    /// Player who answered.
    pub player_id: Uuid,
    /// Option picked by the player.
    pub selected_option_id: String,
    /// Client-reported latency in milliseconds.
    pub response_time_ms: u64,
    /// Server-side reception timestamp.
    pub submitted_at: SystemTime,
    /// Points granted for this answer.
    pub score_awarded: u32,
    /// Whether the selected option was the correct one.
    pub is_correct: bool,
}
