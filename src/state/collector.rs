use std::time::SystemTime;

use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use crate::state::{
    question::Question,
    roster::{AnswerSubmission, PlayerRoster, RosterError},
    scoring::{ScoringPolicy, score_answer},
};

/// The question currently accepting answers, with its server-side deadline.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionWindow<'a> {
    /// Index of the open question.
    pub question_index: usize,
    /// The open question itself.
    pub question: &'a Question,
    /// Instant after which answers are refused.
    pub deadline: Instant,
}

/// A player's answer as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRequest {
    pub player_id: Uuid,
    pub question_id: String,
    pub option_id: String,
    pub response_time_ms: u64,
}

/// Outcome of an accepted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredResult {
    pub is_correct: bool,
    pub score_awarded: u32,
    /// The stored record, handed to persistence.
    pub submission: AnswerSubmission,
    /// Player score after the answer was applied.
    pub player_score: u32,
}

/// Why the collector rejected an answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("player already answered question `{0}`")]
    DuplicateSubmission(String),
    #[error("question closed: {0}")]
    QuestionClosed(&'static str),
    #[error("option `{option_id}` does not belong to question `{question_id}`")]
    InvalidOption {
        question_id: String,
        option_id: String,
    },
    #[error("unknown player `{0}`")]
    UnknownPlayer(Uuid),
}

/// Validates answers and applies their score to the roster.
#[derive(Debug, Clone, Default)]
pub struct AnswerCollector {
    policy: ScoringPolicy,
}

impl AnswerCollector {
    /// Build a collector scoring with `policy`.
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    /// Validate `request` against the open `window` and record it on the roster.
    ///
    /// `now` is compared with the window deadline; the client-reported latency
    /// only feeds the scoring.
    pub fn submit(
        &self,
        roster: &mut PlayerRoster,
        window: Option<SubmissionWindow<'_>>,
        request: &AnswerRequest,
        now: Instant,
        received_at: SystemTime,
    ) -> Result<ScoredResult, SubmitError> {
        let player = roster
            .get(&request.player_id)
            .ok_or(SubmitError::UnknownPlayer(request.player_id))?;
        let eligible_from = player.eligible_from;

        if roster
            .answer(&request.player_id, &request.question_id)
            .is_some()
        {
            return Err(SubmitError::DuplicateSubmission(request.question_id.clone()));
        }

        let window = window.ok_or(SubmitError::QuestionClosed("no question is open"))?;
        if window.question.id != request.question_id {
            return Err(SubmitError::QuestionClosed("not the current question"));
        }
        if now > window.deadline {
            return Err(SubmitError::QuestionClosed("deadline passed"));
        }
        if eligible_from > window.question_index {
            return Err(SubmitError::QuestionClosed(
                "joined during this question; answers count from the next one",
            ));
        }

        if !window.question.has_option(&request.option_id) {
            return Err(SubmitError::InvalidOption {
                question_id: request.question_id.clone(),
                option_id: request.option_id.clone(),
            });
        }

        let is_correct = request.option_id == window.question.correct_option_id;
        let score_awarded = score_answer(
            is_correct,
            request.response_time_ms,
            window.question.duration_seconds,
            &self.policy,
        );

        let submission = AnswerSubmission {
            question_id: request.question_id.clone(),
            player_id: request.player_id,
            selected_option_id: request.option_id.clone(),
            response_time_ms: request.response_time_ms,
            submitted_at: received_at,
            score_awarded,
            is_correct,
        };

        let player_score = roster
            .record_answer(submission.clone())
            .map_err(|err| match err {
                RosterError::AlreadyAnswered { question_id, .. } => {
                    SubmitError::DuplicateSubmission(question_id)
                }
                RosterError::UnknownPlayer(id) => SubmitError::UnknownPlayer(id),
                RosterError::NicknameTaken(_) => SubmitError::UnknownPlayer(request.player_id),
            })?
            .score;

        Ok(ScoredResult {
            is_correct,
            score_awarded,
            submission,
            player_score,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::question::fixtures::question_set;

    struct Fixture {
        roster: PlayerRoster,
        player: Uuid,
        collector: AnswerCollector,
        question: Question,
        now: Instant,
    }

    impl Fixture {
        fn new() -> Self {
            let mut roster = PlayerRoster::new();
            let player = roster.add("ada", SystemTime::now(), 0).unwrap().id;
            let question = question_set(1, 20).questions.remove(0);
            Self {
                roster,
                player,
                collector: AnswerCollector::default(),
                question,
                now: Instant::now(),
            }
        }

        fn request(&self, option_id: &str, response_time_ms: u64) -> AnswerRequest {
            AnswerRequest {
                player_id: self.player,
                question_id: self.question.id.clone(),
                option_id: option_id.into(),
                response_time_ms,
            }
        }

        fn submit(&mut self, request: AnswerRequest) -> Result<ScoredResult, SubmitError> {
            let question = self.question.clone();
            let window = SubmissionWindow {
                question_index: 0,
                question: &question,
                deadline: self.now + Duration::from_secs(20),
            };
            self.collector.submit(
                &mut self.roster,
                Some(window),
                &request,
                self.now,
                SystemTime::now(),
            )
        }
    }

    #[test]
    fn correct_answer_is_scored_and_applied() {
        let mut fixture = Fixture::new();
        let result = fixture.submit(fixture.request("a", 4_000)).unwrap();

        assert!(result.is_correct);
        assert_eq!(result.score_awarded, 900);
        assert_eq!(result.player_score, 900);
        assert_eq!(fixture.roster.get(&fixture.player).unwrap().score, 900);
    }

    #[test]
    fn wrong_answer_is_recorded_with_zero_points() {
        let mut fixture = Fixture::new();
        let result = fixture.submit(fixture.request("b", 1_000)).unwrap();
        assert!(!result.is_correct);
        assert_eq!(result.score_awarded, 0);
        assert!(fixture.roster.answer(&fixture.player, "q0").is_some());
    }

    #[test]
    fn duplicate_submission_keeps_the_first_answer() {
        let mut fixture = Fixture::new();
        fixture.submit(fixture.request("b", 1_000)).unwrap();

        let err = fixture.submit(fixture.request("a", 0)).unwrap_err();
        assert_eq!(err, SubmitError::DuplicateSubmission("q0".into()));
        assert_eq!(fixture.roster.get(&fixture.player).unwrap().score, 0);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let mut fixture = Fixture::new();
        let err = fixture.submit(fixture.request("z", 1_000)).unwrap_err();
        assert!(matches!(err, SubmitError::InvalidOption { .. }));
        assert!(fixture.roster.answer(&fixture.player, "q0").is_none());
    }

    #[test]
    fn answers_past_the_server_deadline_are_refused() {
        let mut fixture = Fixture::new();
        let request = fixture.request("a", 100);
        let question = fixture.question.clone();
        let window = SubmissionWindow {
            question_index: 0,
            question: &question,
            deadline: fixture.now + Duration::from_secs(20),
        };
        let late = fixture.now + Duration::from_secs(21);

        let err = fixture
            .collector
            .submit(
                &mut fixture.roster,
                Some(window),
                &request,
                late,
                SystemTime::now(),
            )
            .unwrap_err();
        assert_eq!(err, SubmitError::QuestionClosed("deadline passed"));
    }

    #[test]
    fn answers_without_an_open_question_are_refused() {
        let mut fixture = Fixture::new();
        let request = fixture.request("a", 100);
        let err = fixture
            .collector
            .submit(
                &mut fixture.roster,
                None,
                &request,
                fixture.now,
                SystemTime::now(),
            )
            .unwrap_err();
        assert!(matches!(err, SubmitError::QuestionClosed(_)));
    }

    #[test]
    fn stale_question_id_is_refused() {
        let mut fixture = Fixture::new();
        let mut request = fixture.request("a", 100);
        request.question_id = "previous".into();
        assert!(matches!(
            fixture.submit(request),
            Err(SubmitError::QuestionClosed(_))
        ));
    }

    #[test]
    fn observers_cannot_score_on_the_question_they_joined_during() {
        let mut fixture = Fixture::new();
        let observer = fixture
            .roster
            .add("late", SystemTime::now(), 1)
            .unwrap()
            .id;
        let mut request = fixture.request("a", 100);
        request.player_id = observer;

        assert!(matches!(
            fixture.submit(request),
            Err(SubmitError::QuestionClosed(_))
        ));
        assert_eq!(fixture.roster.get(&observer).unwrap().score, 0);
    }

    #[test]
    fn unknown_player_is_refused() {
        let mut fixture = Fixture::new();
        let mut request = fixture.request("a", 100);
        request.player_id = Uuid::new_v4();
        assert!(matches!(
            fixture.submit(request),
            Err(SubmitError::UnknownPlayer(_))
        ));
    }
}
