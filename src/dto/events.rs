use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{leaderboard::LeaderboardEntry, question::QuestionOption};

const EVENT_PLAYER_JOINED: &str = "PLAYER_JOINED";
const EVENT_NEXT_QUESTION: &str = "NEXT_QUESTION";
const EVENT_SHOW_RESULTS: &str = "SHOW_RESULTS";
const EVENT_GAME_OVER: &str = "GAME_OVER";

/// Event published on a session stream, stamped with its per-session sequence number.
///
/// Consumers de-duplicate on `(session_id, seq)`: delivery is at-least-once.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct EventEnvelope {
    pub session_id: Uuid,
    /// Strictly increasing inside one session, starting at 1.
    pub seq: u64,
    #[serde(flatten)]
    pub event: QuizEvent,
}

/// Catalogue of events produced by a live session.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuizEvent {
    PlayerJoined(PlayerJoinedEvent),
    NextQuestion(NextQuestionEvent),
    ShowResults(ShowResultsEvent),
    GameOver(GameOverEvent),
}

impl QuizEvent {
    /// Name used for the SSE `event:` field.
    pub fn name(&self) -> &'static str {
        match self {
            QuizEvent::PlayerJoined(_) => EVENT_PLAYER_JOINED,
            QuizEvent::NextQuestion(_) => EVENT_NEXT_QUESTION,
            QuizEvent::ShowResults(_) => EVENT_SHOW_RESULTS,
            QuizEvent::GameOver(_) => EVENT_GAME_OVER,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
/// A player entered the session.
pub struct PlayerJoinedEvent {
    pub player_id: Uuid,
    pub nickname: String,
    /// Joined while a question was running; scores from the next question on.
    pub observer: bool,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
/// A question opened. The correct option is deliberately absent.
pub struct NextQuestionEvent {
    pub question_index: usize,
    pub question_id: String,
    pub question_count: usize,
    pub text: String,
    pub options: Vec<OptionSnapshot>,
    /// RFC 3339 timestamp of the opening.
    pub question_started_at: String,
    pub duration_seconds: u32,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
/// Option as shown to players.
pub struct OptionSnapshot {
    pub id: String,
    pub text: String,
}

impl From<&QuestionOption> for OptionSnapshot {
    fn from(option: &QuestionOption) -> Self {
        Self {
            id: option.id.clone(),
            text: option.text.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
/// The open question closed; standings after it.
pub struct ShowResultsEvent {
    pub question_index: usize,
    pub question_id: String,
    pub correct_option_id: String,
    pub leaderboard_top: Vec<LeaderboardEntry>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
/// The session finished.
pub struct GameOverEvent {
    /// `completed`, `aborted` or `host_timeout`.
    pub reason: String,
    pub final_leaderboard: Vec<LeaderboardEntry>,
}
