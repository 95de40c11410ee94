use thiserror::Error;
use uuid::Uuid;

/// Phases a quiz session goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Players are joining; no question has been shown yet.
    Lobby,
    /// The question at the given index accepts answers.
    QuestionActive(usize),
    /// Results of the question at the given index are displayed.
    ShowingResults(usize),
    /// Terminal phase.
    Finished(FinishReason),
}

impl SessionPhase {
    /// Index of the current (or last shown) question, if the game started.
    pub fn question_index(&self) -> Option<usize> {
        match self {
            SessionPhase::QuestionActive(index) | SessionPhase::ShowingResults(index) => {
                Some(*index)
            }
            SessionPhase::Lobby | SessionPhase::Finished(_) => None,
        }
    }

    /// Whether the session reached its terminal phase.
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionPhase::Finished(_))
    }
}

/// Why a session reached [`SessionPhase::Finished`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Every question was played.
    Completed,
    /// The host stopped the game.
    Aborted,
    /// The host stopped sending heartbeats.
    HostTimeout,
}

impl FinishReason {
    /// Stable lowercase label used on the wire and in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Completed => "completed",
            FinishReason::Aborted => "aborted",
            FinishReason::HostTimeout => "host_timeout",
        }
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Host starts the game from the lobby.
    Start,
    /// Stop accepting answers for the open question.
    CloseQuestion,
    /// Move past the results screen.
    Advance,
    /// Force the session into its terminal phase.
    Abort(FinishReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or discarded.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: SessionPhase,
        /// Current phase.
        actual: SessionPhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when discarding a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: SessionPhase,
    /// Phase the state machine will transition to.
    pub to: SessionPhase,
    /// Event that triggered this transition.
    pub event: SessionEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: SessionPhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<SessionPhase>,
}

/// State machine enforcing the session flow
/// `Lobby -> QuestionActive -> ShowingResults -> {QuestionActive | Finished}`.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    version: usize,
    question_count: usize,
    pending: Option<Plan>,
}

impl SessionStateMachine {
    /// Create a state machine in the lobby for a set of `question_count` questions.
    pub fn new(question_count: usize) -> Self {
        Self {
            phase: SessionPhase::Lobby,
            version: 0,
            question_count,
            pending: None,
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    /// Returns a Plan that can later be applied or discarded.
    pub fn plan(&mut self, event: SessionEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<SessionPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;

        Ok(self.phase)
    }

    /// Drop a planned transition without applying it.
    pub fn discard(&mut self, plan_id: PlanId) -> Result<(), DiscardError> {
        let plan = self.pending.as_ref().ok_or(DiscardError::NoPending)?;

        if plan.id != plan_id {
            return Err(DiscardError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (SessionPhase::Lobby, SessionEvent::Start) if self.question_count > 0 => {
                SessionPhase::QuestionActive(0)
            }
            (SessionPhase::QuestionActive(index), SessionEvent::CloseQuestion) => {
                SessionPhase::ShowingResults(index)
            }
            (SessionPhase::ShowingResults(index), SessionEvent::Advance) => {
                if index + 1 < self.question_count {
                    SessionPhase::QuestionActive(index + 1)
                } else {
                    SessionPhase::Finished(FinishReason::Completed)
                }
            }
            (from, SessionEvent::Abort(reason)) if !from.is_finished() => {
                SessionPhase::Finished(reason)
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
