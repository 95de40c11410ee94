use std::time::SystemTime;

use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

/// Participant of a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Identifier handed back to the player on join.
    pub id: Uuid,
    /// Display name, unique inside the session (case-insensitive).
    pub nickname: String,
    /// Cumulative score; only grows through [`PlayerRoster::record_answer`].
    pub score: u32,
    /// Wall-clock time of the join.
    pub joined_at: SystemTime,
    /// Join order inside the session, used as the last tie-breaker.
    pub join_seq: u64,
    /// Whether the player counts as present; false once their last event stream closed.
    pub connected: bool,
    /// First question index this player may score on.
    pub eligible_from: usize,
}

impl Player {
    /// Whether the player may answer the question at `question_index`.
    pub fn is_eligible_for(&self, question_index: usize) -> bool {
        self.eligible_from <= question_index
    }
}

/// Accepted answer, stored once per (question, player).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSubmission {
    /// Question the answer targets.
    pub question_id: String,
    /// Player who answered.
    pub player_id: Uuid,
    /// Option picked by the player.
    pub selected_option_id: String,
    /// Client-reported latency, used for scoring only.
    pub response_time_ms: u64,
    /// Server-side reception time.
    pub submitted_at: SystemTime,
    /// Points granted.
    pub score_awarded: u32,
    /// Whether the pick was correct.
    pub is_correct: bool,
}

/// Errors raised by roster bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("nickname `{0}` is already taken")]
    NicknameTaken(String),
    #[error("unknown player `{0}`")]
    UnknownPlayer(Uuid),
    #[error("player `{player_id}` already answered question `{question_id}`")]
    AlreadyAnswered { player_id: Uuid, question_id: String },
}

#[derive(Debug, Clone)]
struct PlayerRecord {
    player: Player,
    answers: IndexMap<String, AnswerSubmission>,
    /// Event streams currently open; a reconnect overlaps the stream it replaces.
    streams: usize,
}

/// Players of one session keyed by identifier, in join order.
#[derive(Debug, Clone, Default)]
pub struct PlayerRoster {
    records: IndexMap<Uuid, PlayerRecord>,
    next_seq: u64,
}

impl PlayerRoster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new player and return its record.
    pub fn add(
        &mut self,
        nickname: &str,
        joined_at: SystemTime,
        eligible_from: usize,
    ) -> Result<Player, RosterError> {
        let nickname = nickname.trim();
        let folded = nickname.to_lowercase();
        let taken = self
            .records
            .values()
            .any(|record| record.player.nickname.to_lowercase() == folded);
        if taken {
            return Err(RosterError::NicknameTaken(nickname.to_string()));
        }

        let player = Player {
            id: Uuid::new_v4(),
            nickname: nickname.to_string(),
            score: 0,
            joined_at,
            join_seq: self.next_seq,
            connected: true,
            eligible_from,
        };
        self.next_seq += 1;
        self.records.insert(
            player.id,
            PlayerRecord {
                player: player.clone(),
                answers: IndexMap::new(),
                streams: 0,
            },
        );
        Ok(player)
    }

    /// Look a player up by identifier.
    pub fn get(&self, player_id: &Uuid) -> Option<&Player> {
        self.records.get(player_id).map(|record| &record.player)
    }

    /// Number of players, observers included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nobody joined yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over players in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.records.values().map(|record| &record.player)
    }

    /// Count a newly opened event stream, returning the player when it came back online.
    pub fn attach_stream(&mut self, player_id: &Uuid) -> Option<Player> {
        let record = self.records.get_mut(player_id)?;
        record.streams += 1;
        if record.player.connected {
            return None;
        }
        record.player.connected = true;
        Some(record.player.clone())
    }

    /// Release one event stream, returning the player when it was their last one.
    pub fn detach_stream(&mut self, player_id: &Uuid) -> Option<Player> {
        let record = self.records.get_mut(player_id)?;
        record.streams = record.streams.saturating_sub(1);
        if record.streams > 0 || !record.player.connected {
            return None;
        }
        record.player.connected = false;
        Some(record.player.clone())
    }

    /// Answer recorded for (`player_id`, `question_id`), if any.
    pub fn answer(&self, player_id: &Uuid, question_id: &str) -> Option<&AnswerSubmission> {
        self.records.get(player_id)?.answers.get(question_id)
    }

    /// Every answer of a player, in submission order.
    pub fn answers_of(&self, player_id: &Uuid) -> impl Iterator<Item = &AnswerSubmission> {
        self.records
            .get(player_id)
            .into_iter()
            .flat_map(|record| record.answers.values())
    }

    /// Whether every connected player eligible for `question_index` answered `question_id`.
    ///
    /// Returns `false` when no such player exists so an empty room never closes early.
    pub fn all_answered(&self, question_index: usize, question_id: &str) -> bool {
        let mut expected = self
            .records
            .values()
            .filter(|record| {
                record.player.connected && record.player.is_eligible_for(question_index)
            })
            .peekable();

        expected.peek().is_some()
            && expected.all(|record| record.answers.contains_key(question_id))
    }

    /// Store an answer and add its points to the player's score in one step.
    ///
    /// This is the only place a score changes, which keeps it equal to the sum of
    /// the player's awarded points.
    pub(crate) fn record_answer(
        &mut self,
        submission: AnswerSubmission,
    ) -> Result<&Player, RosterError> {
        let record = self
            .records
            .get_mut(&submission.player_id)
            .ok_or(RosterError::UnknownPlayer(submission.player_id))?;

        if record.answers.contains_key(&submission.question_id) {
            return Err(RosterError::AlreadyAnswered {
                player_id: submission.player_id,
                question_id: submission.question_id,
            });
        }

        record.player.score = record.player.score.saturating_add(submission.score_awarded);
        record
            .answers
            .insert(submission.question_id.clone(), submission);
        Ok(&record.player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(player_id: Uuid, question_id: &str, score: u32) -> AnswerSubmission {
        AnswerSubmission {
            question_id: question_id.into(),
            player_id,
            selected_option_id: "a".into(),
            response_time_ms: 1_000,
            submitted_at: SystemTime::now(),
            score_awarded: score,
            is_correct: score > 0,
        }
    }

    #[test]
    fn nicknames_are_unique_case_insensitively() {
        let mut roster = PlayerRoster::new();
        roster.add("Ada", SystemTime::now(), 0).unwrap();
        assert_eq!(
            roster.add(" ada ", SystemTime::now(), 0).unwrap_err(),
            RosterError::NicknameTaken("ada".into())
        );
    }

    #[test]
    fn nickname_uniqueness_folds_non_ascii_case() {
        let mut roster = PlayerRoster::new();
        roster.add("Élodie", SystemTime::now(), 0).unwrap();
        assert_eq!(
            roster.add("élodie", SystemTime::now(), 0).unwrap_err(),
            RosterError::NicknameTaken("élodie".into())
        );
        assert!(roster.add("Elodie", SystemTime::now(), 0).is_ok());
    }

    #[test]
    fn join_sequence_follows_join_order() {
        let mut roster = PlayerRoster::new();
        let first = roster.add("first", SystemTime::now(), 0).unwrap();
        let second = roster.add("second", SystemTime::now(), 0).unwrap();
        assert!(first.join_seq < second.join_seq);
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn score_is_the_sum_of_awarded_points() {
        let mut roster = PlayerRoster::new();
        let player = roster.add("ada", SystemTime::now(), 0).unwrap();

        roster.record_answer(submission(player.id, "q0", 900)).unwrap();
        roster.record_answer(submission(player.id, "q1", 0)).unwrap();
        roster.record_answer(submission(player.id, "q2", 650)).unwrap();

        let total: u32 = roster
            .answers_of(&player.id)
            .map(|answer| answer.score_awarded)
            .sum();
        assert_eq!(roster.get(&player.id).unwrap().score, total);
        assert_eq!(total, 1_550);
    }

    #[test]
    fn second_answer_for_same_question_is_refused_without_touching_score() {
        let mut roster = PlayerRoster::new();
        let player = roster.add("ada", SystemTime::now(), 0).unwrap();

        roster.record_answer(submission(player.id, "q0", 800)).unwrap();
        let err = roster
            .record_answer(submission(player.id, "q0", 1_000))
            .unwrap_err();

        assert!(matches!(err, RosterError::AlreadyAnswered { .. }));
        assert_eq!(roster.get(&player.id).unwrap().score, 800);
    }

    #[test]
    fn all_answered_ignores_observers_and_disconnected_players() {
        let mut roster = PlayerRoster::new();
        let active = roster.add("active", SystemTime::now(), 0).unwrap();
        let gone = roster.add("gone", SystemTime::now(), 0).unwrap();
        roster.add("late", SystemTime::now(), 1).unwrap();

        assert!(!roster.all_answered(0, "q0"));
        roster.record_answer(submission(active.id, "q0", 500)).unwrap();
        assert!(!roster.all_answered(0, "q0"));

        roster.attach_stream(&gone.id);
        roster.detach_stream(&gone.id).unwrap();
        assert!(roster.all_answered(0, "q0"));
    }

    #[test]
    fn empty_roster_never_counts_as_all_answered() {
        let roster = PlayerRoster::new();
        assert!(!roster.all_answered(0, "q0"));
    }

    #[test]
    fn player_stays_connected_until_the_last_stream_closes() {
        let mut roster = PlayerRoster::new();
        let player = roster.add("ada", SystemTime::now(), 0).unwrap();

        assert!(roster.attach_stream(&player.id).is_none());
        assert!(roster.attach_stream(&player.id).is_none());
        assert!(roster.detach_stream(&player.id).is_none());
        assert!(roster.get(&player.id).unwrap().connected);

        let offline = roster.detach_stream(&player.id).unwrap();
        assert!(!offline.connected);
        assert!(roster.detach_stream(&player.id).is_none());

        let back = roster.attach_stream(&player.id).unwrap();
        assert!(back.connected);
        assert!(roster.attach_stream(&Uuid::new_v4()).is_none());
    }
}
