//! Session operations exposed over HTTP: creation, lookup, joining, host commands and answers.

use tracing::info;
use uuid::Uuid;

use crate::{
    dto::{
        phase::PhaseResponse,
        session::{
            CreateSessionRequest, CreateSessionResponse, JoinSessionRequest, JoinSessionResponse,
            LeaderboardResponse, QuestionSetListItem, SessionResponse, SubmitAnswerRequest,
            SubmitAnswerResponse,
        },
    },
    error::ServiceError,
    state::{SharedState, collector::AnswerRequest},
};

/// Host commands routed through `POST /sessions/{id}/{command}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Start,
    Close,
    Advance,
    Abort,
}

/// Open a session in the lobby for the given question set.
pub async fn create_session(
    state: &SharedState,
    request: CreateSessionRequest,
) -> Result<CreateSessionResponse, ServiceError> {
    let session = state
        .registry()
        .create(request.question_set_id, request.host_id.trim())
        .await?;
    Ok(CreateSessionResponse {
        session_id: session.id(),
        pin: session.pin().to_owned(),
    })
}

pub async fn get_session(state: &SharedState, id: Uuid) -> Result<SessionResponse, ServiceError> {
    let session = state.registry().find_by_id(id)?;
    Ok(session.view().await?.into())
}

pub async fn get_session_by_pin(
    state: &SharedState,
    pin: &str,
) -> Result<SessionResponse, ServiceError> {
    let session = state.registry().find_by_pin(pin)?;
    Ok(session.view().await?.into())
}

/// Resolve the PIN and add the player to the roster.
pub async fn join_session(
    state: &SharedState,
    request: JoinSessionRequest,
) -> Result<JoinSessionResponse, ServiceError> {
    let session = state.registry().find_by_pin(&request.pin)?;
    let outcome = session.join(&request.nickname).await?;
    Ok(JoinSessionResponse::new(session.id(), outcome))
}

/// Apply a host command and report the phase the session ended up in.
pub async fn run_host_command(
    state: &SharedState,
    id: Uuid,
    host_id: &str,
    command: HostCommand,
) -> Result<PhaseResponse, ServiceError> {
    let session = state.registry().find_by_id(id)?;
    let phase = match command {
        HostCommand::Start => session.start(host_id).await?,
        HostCommand::Close => session.close_question(host_id).await?,
        HostCommand::Advance => session.advance(host_id).await?,
        HostCommand::Abort => session.abort(host_id).await?,
    };
    info!(session_id = %id, ?command, ?phase, "host command applied");
    Ok(phase.into())
}

pub async fn heartbeat(state: &SharedState, id: Uuid, host_id: &str) -> Result<(), ServiceError> {
    state.registry().find_by_id(id)?.heartbeat(host_id).await
}

pub async fn submit_answer(
    state: &SharedState,
    id: Uuid,
    player_id: Uuid,
    request: SubmitAnswerRequest,
) -> Result<SubmitAnswerResponse, ServiceError> {
    let session = state.registry().find_by_id(id)?;
    let outcome = session
        .submit_answer(AnswerRequest {
            player_id,
            question_id: request.question_id,
            option_id: request.option_id,
            response_time_ms: request.response_time_ms,
        })
        .await?;
    Ok(outcome.into())
}

pub async fn get_leaderboard(
    state: &SharedState,
    id: Uuid,
) -> Result<LeaderboardResponse, ServiceError> {
    let session = state.registry().find_by_id(id)?;
    Ok(LeaderboardResponse {
        session_id: id,
        entries: session.leaderboard().await?,
    })
}

/// Question sets a host can open a session from.
pub async fn list_question_sets(
    state: &SharedState,
) -> Result<Vec<QuestionSetListItem>, ServiceError> {
    let store = state
        .storage()
        .store()
        .await
        .ok_or(ServiceError::Degraded)?;
    let sets = store.list_question_sets().await?;
    Ok(sets
        .into_iter()
        .map(|(id, title)| QuestionSetListItem { id, title })
        .collect())
}
