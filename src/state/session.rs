//! A live session: state machine, roster and collector behind one serializer.
//!
//! Every mutating operation takes the session mutex, so join, start, answer,
//! close, advance and abort of one session run one at a time. Each state
//! machine transition publishes exactly one event while the lock is held,
//! which keeps the event order identical to the transition order.

use std::{
    sync::{Arc, Weak},
    time::{Duration, SystemTime},
};

use tokio::{
    sync::{Mutex, MutexGuard},
    task::JoinHandle,
    time::{Instant, sleep_until, timeout},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{AnswerEntity, PlayerEntity, SessionEntity, SessionStatusEntity},
    dto::{
        events::{
            EventEnvelope, GameOverEvent, NextQuestionEvent, OptionSnapshot, PlayerJoinedEvent,
            QuizEvent, ShowResultsEvent,
        },
        format_system_time,
    },
    error::ServiceError,
    state::{
        broadcaster::Broadcaster,
        collector::{AnswerCollector, AnswerRequest, SubmissionWindow},
        leaderboard::{self, LeaderboardEntry},
        question::{QuestionOption, QuestionSet},
        recorder::{SessionRecorder, StorageWrite},
        roster::{AnswerSubmission, Player, PlayerRoster},
        scoring::ScoringPolicy,
        state_machine::{FinishReason, Plan, SessionEvent, SessionPhase, SessionStateMachine},
    },
};

/// Per-session tunables, derived from the application configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// Players required before the host may start.
    pub min_players: usize,
    /// Entries carried by `SHOW_RESULTS`.
    pub leaderboard_top: usize,
    /// Scoring parameters handed to the collector.
    pub scoring: ScoringPolicy,
    /// Upper bound on waiting for the session serializer.
    pub command_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            min_players: 1,
            leaderboard_top: 5,
            scoring: ScoringPolicy::default(),
            command_timeout: Duration::from_secs(2),
        }
    }
}

/// Immutable identity of a session.
#[derive(Debug, Clone)]
struct SessionMeta {
    id: Uuid,
    pin: String,
    host_id: String,
    question_set_id: Uuid,
    title: String,
    created_at: SystemTime,
}

/// Automatic close of one question.
struct QuestionTimer {
    question_index: usize,
    handle: JoinHandle<()>,
}

struct SessionCore {
    machine: SessionStateMachine,
    questions: QuestionSet,
    roster: PlayerRoster,
    collector: AnswerCollector,
    question_started_at: Option<SystemTime>,
    deadline: Option<Instant>,
    timer: Option<QuestionTimer>,
    event_seq: u64,
    finished_at: Option<(Instant, SystemTime)>,
    last_heartbeat: Instant,
}

impl SessionCore {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }
}

/// Who closed a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseCause {
    Host,
    Deadline,
    AllAnswered,
}

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub player: Player,
    /// The player joined mid-game and scores from the next question on.
    pub observer: bool,
}

/// Result of an accepted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub is_correct: bool,
    pub score_awarded: u32,
    /// Player score including this answer.
    pub total_score: u32,
}

/// The question currently open, as shown to participants.
#[derive(Debug, Clone)]
pub struct QuestionView {
    pub index: usize,
    pub id: String,
    pub text: String,
    pub options: Vec<QuestionOption>,
    pub duration_seconds: u32,
    pub started_at: SystemTime,
    /// Time left before the server stops accepting answers.
    pub remaining: Duration,
}

/// Read-only snapshot of a session.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub id: Uuid,
    pub pin: String,
    pub title: String,
    pub question_set_id: Uuid,
    pub phase: SessionPhase,
    pub question_count: usize,
    pub player_count: usize,
    pub current_question: Option<QuestionView>,
    pub created_at: SystemTime,
}

/// One live game, owned by the registry.
pub struct LiveSession {
    meta: SessionMeta,
    settings: SessionSettings,
    core: Mutex<SessionCore>,
    broadcaster: Arc<dyn Broadcaster>,
    recorder: SessionRecorder,
}

impl LiveSession {
    /// Create a session in the lobby and queue its first record.
    pub fn new(
        id: Uuid,
        pin: String,
        host_id: String,
        questions: QuestionSet,
        settings: SessionSettings,
        broadcaster: Arc<dyn Broadcaster>,
        recorder: SessionRecorder,
    ) -> Arc<Self> {
        let meta = SessionMeta {
            id,
            pin,
            host_id,
            question_set_id: questions.id,
            title: questions.title.clone(),
            created_at: SystemTime::now(),
        };
        let core = SessionCore {
            machine: SessionStateMachine::new(questions.len()),
            questions,
            roster: PlayerRoster::new(),
            collector: AnswerCollector::new(settings.scoring),
            question_started_at: None,
            deadline: None,
            timer: None,
            event_seq: 0,
            finished_at: None,
            last_heartbeat: Instant::now(),
        };
        recorder.record(StorageWrite::Session(session_entity(&meta, &core)));

        Arc::new(Self {
            meta,
            settings,
            core: Mutex::new(core),
            broadcaster,
            recorder,
        })
    }

    pub fn id(&self) -> Uuid {
        self.meta.id
    }

    pub fn pin(&self) -> &str {
        &self.meta.pin
    }

    /// Whether `host_id` identifies this session's host.
    pub fn is_host(&self, host_id: &str) -> bool {
        self.meta.host_id == host_id
    }

    /// Add a player. Mid-game joiners become observers until the next question.
    pub async fn join(&self, nickname: &str) -> Result<JoinOutcome, ServiceError> {
        let mut guard = self.lock().await?;
        let core = &mut *guard;

        let eligible_from = match core.machine.phase() {
            SessionPhase::Lobby => 0,
            SessionPhase::QuestionActive(index) | SessionPhase::ShowingResults(index) => index + 1,
            SessionPhase::Finished(_) => return Err(ServiceError::SessionClosed(self.meta.id)),
        };
        let player = core
            .roster
            .add(nickname, SystemTime::now(), eligible_from)?;
        let observer = eligible_from > 0;

        self.emit(
            core,
            QuizEvent::PlayerJoined(PlayerJoinedEvent {
                player_id: player.id,
                nickname: player.nickname.clone(),
                observer,
            }),
        );
        self.recorder
            .record(StorageWrite::Player(self.player_entity(&player)));
        info!(
            session_id = %self.meta.id,
            player_id = %player.id,
            nickname = %player.nickname,
            observer,
            "player joined"
        );

        Ok(JoinOutcome { player, observer })
    }

    /// Open the first question.
    pub async fn start(self: &Arc<Self>, host_id: &str) -> Result<SessionPhase, ServiceError> {
        self.authorize_host(host_id)?;
        let mut guard = self.lock().await?;
        let core = &mut *guard;
        core.last_heartbeat = Instant::now();

        if core.machine.phase() == SessionPhase::Lobby
            && core.roster.len() < self.settings.min_players
        {
            return Err(ServiceError::NotEnoughPlayers {
                joined: core.roster.len(),
                required: self.settings.min_players,
            });
        }

        let next = self.run_transition(core, SessionEvent::Start, |core, to| {
            let SessionPhase::QuestionActive(index) = to else {
                return Err(ServiceError::WrongState(format!("cannot start into {to:?}")));
            };
            open_question(core, index)
        })?;
        self.after_question_opened(core, next);
        Ok(next)
    }

    /// Validate, score and store an answer; closes the question once everyone answered.
    pub async fn submit_answer(
        &self,
        request: AnswerRequest,
    ) -> Result<SubmitOutcome, ServiceError> {
        let mut guard = self.lock().await?;
        let core = &mut *guard;
        let now = Instant::now();
        let received_at = SystemTime::now();

        let phase = core.machine.phase();
        let window = match (phase, core.deadline) {
            (SessionPhase::QuestionActive(index), Some(deadline)) => {
                core.questions
                    .get(index)
                    .map(|question| SubmissionWindow {
                        question_index: index,
                        question,
                        deadline,
                    })
            }
            _ => None,
        };
        let result = core
            .collector
            .submit(&mut core.roster, window, &request, now, received_at)?;

        debug!(
            session_id = %self.meta.id,
            player_id = %request.player_id,
            question_id = %request.question_id,
            is_correct = result.is_correct,
            score_awarded = result.score_awarded,
            "answer accepted"
        );
        self.recorder
            .record(StorageWrite::Answer(self.answer_entity(&result.submission)));
        if let Some(player) = core.roster.get(&request.player_id) {
            self.recorder
                .record(StorageWrite::Player(self.player_entity(player)));
        }

        if let SessionPhase::QuestionActive(index) = phase
            && core.roster.all_answered(index, &request.question_id)
            && let Err(err) = self.close_locked(core, CloseCause::AllAnswered)
        {
            warn!(session_id = %self.meta.id, error = %err, "failed to close fully answered question");
        }

        Ok(SubmitOutcome {
            is_correct: result.is_correct,
            score_awarded: result.score_awarded,
            total_score: result.player_score,
        })
    }

    /// Close the open question on behalf of the host. Closing twice is a no-op.
    pub async fn close_question(&self, host_id: &str) -> Result<SessionPhase, ServiceError> {
        self.authorize_host(host_id)?;
        let mut guard = self.lock().await?;
        let core = &mut *guard;
        core.last_heartbeat = Instant::now();

        match core.machine.phase() {
            phase @ SessionPhase::ShowingResults(_) => Ok(phase),
            _ => self.close_locked(core, CloseCause::Host),
        }
    }

    /// Move past the results: next question, or the end of the game.
    pub async fn advance(self: &Arc<Self>, host_id: &str) -> Result<SessionPhase, ServiceError> {
        self.authorize_host(host_id)?;
        let mut guard = self.lock().await?;
        let core = &mut *guard;
        core.last_heartbeat = Instant::now();

        let next = self.run_transition(core, SessionEvent::Advance, |core, to| match to {
            SessionPhase::QuestionActive(index) => open_question(core, index),
            SessionPhase::Finished(reason) => Ok(game_over(core, reason)),
            other => Err(ServiceError::WrongState(format!("cannot advance into {other:?}"))),
        })?;

        match next {
            SessionPhase::QuestionActive(_) => self.after_question_opened(core, next),
            SessionPhase::Finished(reason) => self.after_finished(core, reason),
            _ => {}
        }
        Ok(next)
    }

    /// End the session immediately.
    pub async fn abort(&self, host_id: &str) -> Result<SessionPhase, ServiceError> {
        self.authorize_host(host_id)?;
        let mut guard = self.lock().await?;
        self.finish_locked(&mut guard, FinishReason::Aborted)
    }

    /// Record that the host is still around.
    pub async fn heartbeat(&self, host_id: &str) -> Result<(), ServiceError> {
        self.authorize_host(host_id)?;
        let mut guard = self.lock().await?;
        guard.last_heartbeat = Instant::now();
        Ok(())
    }

    /// Count an event stream opened by a player.
    pub async fn attach_player_stream(&self, player_id: Uuid) -> Result<(), ServiceError> {
        self.update_player_streams(player_id, true).await
    }

    /// Release an event stream of a player.
    ///
    /// Closing their last stream may leave every remaining player answered, which
    /// closes the question.
    pub async fn detach_player_stream(&self, player_id: Uuid) -> Result<(), ServiceError> {
        self.update_player_streams(player_id, false).await
    }

    async fn update_player_streams(
        &self,
        player_id: Uuid,
        opened: bool,
    ) -> Result<(), ServiceError> {
        let mut guard = self.lock().await?;
        let core = &mut *guard;
        if core.roster.get(&player_id).is_none() {
            return Err(ServiceError::Unauthorized(format!(
                "player {player_id} is not part of this session"
            )));
        }

        let changed = if opened {
            core.roster.attach_stream(&player_id)
        } else {
            core.roster.detach_stream(&player_id)
        };
        let Some(player) = changed else {
            return Ok(());
        };
        debug!(session_id = %self.meta.id, player_id = %player_id, connected = player.connected, "player connection changed");
        self.recorder
            .record(StorageWrite::Player(self.player_entity(&player)));

        if !player.connected
            && let SessionPhase::QuestionActive(index) = core.machine.phase()
            && let Some(question_id) = core.questions.get(index).map(|q| q.id.clone())
            && core.roster.all_answered(index, &question_id)
            && let Err(err) = self.close_locked(core, CloseCause::AllAnswered)
        {
            warn!(session_id = %self.meta.id, error = %err, "failed to close question after disconnect");
        }
        Ok(())
    }

    /// Abort the session when the host has been silent for longer than `grace`.
    pub async fn expire_if_idle(&self, now: Instant, grace: Duration) -> bool {
        let Ok(mut guard) = self.lock().await else {
            return false;
        };
        if guard.machine.phase().is_finished()
            || now.saturating_duration_since(guard.last_heartbeat) <= grace
        {
            return false;
        }

        warn!(session_id = %self.meta.id, pin = %self.meta.pin, "host heartbeat lost; ending session");
        match self.finish_locked(&mut guard, FinishReason::HostTimeout) {
            Ok(_) => true,
            Err(err) => {
                warn!(session_id = %self.meta.id, error = %err, "failed to expire idle session");
                false
            }
        }
    }

    /// Whether the session finished more than `retention` ago.
    pub async fn is_evictable(&self, now: Instant, retention: Duration) -> bool {
        let Ok(guard) = self.lock().await else {
            return false;
        };
        guard
            .finished_at
            .is_some_and(|(finished_at, _)| now.saturating_duration_since(finished_at) >= retention)
    }

    /// Full ranking of the roster, recomputed on every call.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        let guard = self.lock().await?;
        Ok(leaderboard::rank(guard.roster.players()))
    }

    /// Snapshot of the session for lookups.
    pub async fn view(&self) -> Result<SessionView, ServiceError> {
        let guard = self.lock().await?;
        let phase = guard.machine.phase();
        let current_question = match (phase, guard.question_started_at, guard.deadline) {
            (SessionPhase::QuestionActive(index), Some(started_at), Some(deadline)) => {
                guard.questions.get(index).map(|question| QuestionView {
                    index,
                    id: question.id.clone(),
                    text: question.text.clone(),
                    options: question.options.clone(),
                    duration_seconds: question.duration_seconds,
                    started_at,
                    remaining: deadline.saturating_duration_since(Instant::now()),
                })
            }
            _ => None,
        };

        Ok(SessionView {
            id: self.meta.id,
            pin: self.meta.pin.clone(),
            title: self.meta.title.clone(),
            question_set_id: self.meta.question_set_id,
            phase,
            question_count: guard.questions.len(),
            player_count: guard.roster.len(),
            current_question,
            created_at: self.meta.created_at,
        })
    }

    async fn lock(&self) -> Result<MutexGuard<'_, SessionCore>, ServiceError> {
        timeout(self.settings.command_timeout, self.core.lock())
            .await
            .map_err(|_| {
                warn!(session_id = %self.meta.id, "timed out waiting for session lock");
                ServiceError::Timeout
            })
    }

    fn authorize_host(&self, host_id: &str) -> Result<(), ServiceError> {
        if self.is_host(host_id) {
            Ok(())
        } else {
            Err(ServiceError::Unauthorized(
                "only the session host may do this".into(),
            ))
        }
    }

    /// Plan `event`, run `work` to prepare its event, then apply (or discard) the plan.
    ///
    /// The prepared event is published once the plan is applied.
    fn run_transition<F>(
        &self,
        core: &mut SessionCore,
        event: SessionEvent,
        work: F,
    ) -> Result<SessionPhase, ServiceError>
    where
        F: FnOnce(&mut SessionCore, SessionPhase) -> Result<QuizEvent, ServiceError>,
    {
        let Plan {
            id: plan_id, to, ..
        } = core.machine.plan(event)?;

        match work(core, to) {
            Ok(quiz_event) => {
                let next = core.machine.apply(plan_id)?;
                self.emit(core, quiz_event);
                Ok(next)
            }
            Err(err) => {
                if let Err(discard_err) = core.machine.discard(plan_id) {
                    warn!(
                        session_id = %self.meta.id,
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?discard_err,
                        "failed to discard transition after work error"
                    );
                }
                Err(err)
            }
        }
    }

    fn close_locked(
        &self,
        core: &mut SessionCore,
        cause: CloseCause,
    ) -> Result<SessionPhase, ServiceError> {
        let top = self.settings.leaderboard_top;
        let next = self.run_transition(core, SessionEvent::CloseQuestion, |core, to| {
            let SessionPhase::ShowingResults(index) = to else {
                return Err(ServiceError::WrongState(format!("cannot close into {to:?}")));
            };
            let question = core.questions.get(index).ok_or_else(|| missing_question(index))?;
            Ok(QuizEvent::ShowResults(ShowResultsEvent {
                question_index: index,
                question_id: question.id.clone(),
                correct_option_id: question.correct_option_id.clone(),
                leaderboard_top: leaderboard::top(leaderboard::rank(core.roster.players()), top),
            }))
        })?;

        core.cancel_timer();
        core.deadline = None;
        info!(
            session_id = %self.meta.id,
            question_index = next.question_index(),
            cause = ?cause,
            "question closed"
        );
        self.record_session(core);
        Ok(next)
    }

    fn finish_locked(
        &self,
        core: &mut SessionCore,
        reason: FinishReason,
    ) -> Result<SessionPhase, ServiceError> {
        let next = self.run_transition(core, SessionEvent::Abort(reason), |core, _| {
            Ok(game_over(core, reason))
        })?;
        self.after_finished(core, reason);
        Ok(next)
    }

    /// Timer path: only closes the question the timer was armed for.
    async fn close_on_deadline(&self, question_index: usize) {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        let armed_for_this_question = core
            .timer
            .as_ref()
            .is_some_and(|timer| timer.question_index == question_index);
        if !armed_for_this_question
            || core.machine.phase() != SessionPhase::QuestionActive(question_index)
        {
            debug!(session_id = %self.meta.id, question_index, "stale question timer ignored");
            return;
        }

        // Disarm without aborting: this task is the timer.
        core.timer.take();
        if let Err(err) = self.close_locked(core, CloseCause::Deadline) {
            warn!(session_id = %self.meta.id, question_index, error = %err, "timed close failed");
        }
    }

    fn after_question_opened(self: &Arc<Self>, core: &mut SessionCore, next: SessionPhase) {
        let (SessionPhase::QuestionActive(index), Some(deadline)) = (next, core.deadline) else {
            return;
        };
        core.cancel_timer();
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            if let Some(session) = weak.upgrade() {
                session.close_on_deadline(index).await;
            }
        });
        core.timer = Some(QuestionTimer {
            question_index: index,
            handle,
        });
        info!(session_id = %self.meta.id, question_index = index, "question opened");
        self.record_session(core);
    }

    fn after_finished(&self, core: &mut SessionCore, reason: FinishReason) {
        core.cancel_timer();
        core.deadline = None;
        core.finished_at = Some((Instant::now(), SystemTime::now()));
        info!(
            session_id = %self.meta.id,
            pin = %self.meta.pin,
            reason = reason.as_str(),
            "session finished"
        );
        self.record_session(core);
    }

    fn emit(&self, core: &mut SessionCore, event: QuizEvent) {
        core.event_seq += 1;
        self.broadcaster.publish(EventEnvelope {
            session_id: self.meta.id,
            seq: core.event_seq,
            event,
        });
    }

    fn record_session(&self, core: &SessionCore) {
        self.recorder
            .record(StorageWrite::Session(session_entity(&self.meta, core)));
    }

    fn player_entity(&self, player: &Player) -> PlayerEntity {
        PlayerEntity {
            session_id: self.meta.id,
            player_id: player.id,
            nickname: player.nickname.clone(),
            score: player.score,
            joined_at: player.joined_at,
            connected: player.connected,
        }
    }

    fn answer_entity(&self, submission: &AnswerSubmission) -> AnswerEntity {
        AnswerEntity {
            session_id: self.meta.id,
            question_id: submission.question_id.clone(),
            player_id: submission.player_id,
            selected_option_id: submission.selected_option_id.clone(),
            response_time_ms: submission.response_time_ms,
            submitted_at: submission.submitted_at,
            score_awarded: submission.score_awarded,
            is_correct: submission.is_correct,
        }
    }
}

/// Stamp the question at `index` as open and build its announcement.
fn open_question(core: &mut SessionCore, index: usize) -> Result<QuizEvent, ServiceError> {
    let question = core.questions.get(index).ok_or_else(|| missing_question(index))?;
    let started_at = SystemTime::now();
    let deadline = Instant::now() + Duration::from_secs(u64::from(question.duration_seconds));

    let event = QuizEvent::NextQuestion(NextQuestionEvent {
        question_index: index,
        question_id: question.id.clone(),
        question_count: core.questions.len(),
        text: question.text.clone(),
        options: question.options.iter().map(OptionSnapshot::from).collect(),
        question_started_at: format_system_time(started_at),
        duration_seconds: question.duration_seconds,
    });

    core.question_started_at = Some(started_at);
    core.deadline = Some(deadline);
    Ok(event)
}

fn game_over(core: &SessionCore, reason: FinishReason) -> QuizEvent {
    QuizEvent::GameOver(GameOverEvent {
        reason: reason.as_str().to_owned(),
        final_leaderboard: leaderboard::rank(core.roster.players()),
    })
}

fn missing_question(index: usize) -> ServiceError {
    ServiceError::QuestionSetInvalid(format!("question {index} is missing"))
}

fn session_entity(meta: &SessionMeta, core: &SessionCore) -> SessionEntity {
    let phase = core.machine.phase();
    let (status, finish_reason) = match phase {
        SessionPhase::Lobby => (SessionStatusEntity::Lobby, None),
        SessionPhase::QuestionActive(_) => (SessionStatusEntity::QuestionActive, None),
        SessionPhase::ShowingResults(_) => (SessionStatusEntity::ShowingResults, None),
        SessionPhase::Finished(reason) => {
            (SessionStatusEntity::Finished, Some(reason.as_str().to_owned()))
        }
    };

    SessionEntity {
        id: meta.id,
        pin: meta.pin.clone(),
        host_id: meta.host_id.clone(),
        question_set_id: meta.question_set_id,
        status,
        current_question_index: phase.question_index(),
        question_started_at: core.question_started_at,
        created_at: meta.created_at,
        finished_at: core.finished_at.map(|(_, wall)| wall),
        finish_reason,
    }
}
