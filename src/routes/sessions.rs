use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        phase::PhaseResponse,
        session::{
            CreateSessionRequest, CreateSessionResponse, JoinSessionRequest, JoinSessionResponse,
            LeaderboardResponse, QuestionSetListItem, SessionResponse, SubmitAnswerRequest,
            SubmitAnswerResponse,
        },
    },
    error::{AppError, ErrorBody},
    services::session_service::{self, HostCommand},
    state::SharedState,
};

/// Header carrying the host identity chosen at session creation.
pub const HOST_ID_HEADER: &str = "x-host-id";
/// Header carrying the player identity handed out on join.
pub const PLAYER_ID_HEADER: &str = "x-player-id";

/// Routes handling the session lifecycle, players and answers.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/question-sets", get(list_question_sets))
        .route("/sessions", post(create_session))
        .route("/sessions/join", post(join_session))
        .route("/sessions/pin/{pin}", get(get_session_by_pin))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/start", post(start_session))
        .route("/sessions/{id}/close", post(close_question))
        .route("/sessions/{id}/advance", post(advance_session))
        .route("/sessions/{id}/abort", post(abort_session))
        .route("/sessions/{id}/heartbeat", post(heartbeat))
        .route("/sessions/{id}/answers", post(submit_answer))
        .route("/sessions/{id}/leaderboard", get(get_leaderboard))
}

/// Host identity taken from the `X-Host-Id` header.
#[derive(Debug, Clone)]
pub struct HostIdentity(pub String);

impl<S: Send + Sync> FromRequestParts<S> for HostIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = header_value(parts, HOST_ID_HEADER)?;
        Ok(Self(value.to_owned()))
    }
}

/// Player identity taken from the `X-Player-Id` header.
#[derive(Debug, Clone, Copy)]
pub struct PlayerIdentity(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for PlayerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = header_value(parts, PLAYER_ID_HEADER)?;
        let id = Uuid::parse_str(value).map_err(|_| {
            AppError::Unauthorized(format!("{PLAYER_ID_HEADER} is not a valid player id"))
        })?;
        Ok(Self(id))
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("missing {name} header")))
}

/// List the question sets sessions can be created from.
#[utoipa::path(
    get,
    path = "/question-sets",
    tag = "sessions",
    responses(
        (status = 200, description = "Available question sets", body = [QuestionSetListItem]),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn list_question_sets(
    State(state): State<SharedState>,
) -> Result<Json<Vec<QuestionSetListItem>>, AppError> {
    let sets = session_service::list_question_sets(&state).await?;
    Ok(Json(sets))
}

/// Open a session in the lobby and hand out its join PIN.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = CreateSessionResponse),
        (status = 400, description = "Unknown or empty question set", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    payload.validate()?;
    let created = session_service::create_session(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Snapshot of a session by identifier.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionResponse),
        (status = 404, description = "Session not found", body = ErrorBody)
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(session_service::get_session(&state, id).await?))
}

/// Snapshot of a session by join PIN.
#[utoipa::path(
    get,
    path = "/sessions/pin/{pin}",
    tag = "sessions",
    params(("pin" = String, Path, description = "Join PIN")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionResponse),
        (status = 404, description = "Session not found", body = ErrorBody)
    )
)]
pub async fn get_session_by_pin(
    State(state): State<SharedState>,
    Path(pin): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(session_service::get_session_by_pin(&state, &pin).await?))
}

/// Join a session with its PIN and a nickname.
#[utoipa::path(
    post,
    path = "/sessions/join",
    tag = "sessions",
    request_body = JoinSessionRequest,
    responses(
        (status = 201, description = "Player joined", body = JoinSessionResponse),
        (status = 400, description = "Invalid PIN or nickname", body = ErrorBody),
        (status = 404, description = "Session not found", body = ErrorBody),
        (status = 409, description = "Session closed or nickname taken", body = ErrorBody)
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    Json(payload): Json<JoinSessionRequest>,
) -> Result<(StatusCode, Json<JoinSessionResponse>), AppError> {
    payload.validate()?;
    let joined = session_service::join_session(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(joined)))
}

/// Leave the lobby and open the first question.
#[utoipa::path(
    post,
    path = "/sessions/{id}/start",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("X-Host-Id" = String, Header, description = "Host identity")
    ),
    responses(
        (status = 200, description = "Session started", body = PhaseResponse),
        (status = 401, description = "Not the host", body = ErrorBody),
        (status = 409, description = "Wrong state or not enough players", body = ErrorBody)
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    HostIdentity(host_id): HostIdentity,
) -> Result<Json<PhaseResponse>, AppError> {
    host_command(&state, id, &host_id, HostCommand::Start).await
}

/// Close the open question and publish its results.
#[utoipa::path(
    post,
    path = "/sessions/{id}/close",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("X-Host-Id" = String, Header, description = "Host identity")
    ),
    responses(
        (status = 200, description = "Question closed", body = PhaseResponse),
        (status = 401, description = "Not the host", body = ErrorBody),
        (status = 409, description = "No open question", body = ErrorBody)
    )
)]
pub async fn close_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    HostIdentity(host_id): HostIdentity,
) -> Result<Json<PhaseResponse>, AppError> {
    host_command(&state, id, &host_id, HostCommand::Close).await
}

/// Move to the next question, or finish after the last one.
#[utoipa::path(
    post,
    path = "/sessions/{id}/advance",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("X-Host-Id" = String, Header, description = "Host identity")
    ),
    responses(
        (status = 200, description = "Session advanced", body = PhaseResponse),
        (status = 401, description = "Not the host", body = ErrorBody),
        (status = 409, description = "Results are not showing", body = ErrorBody)
    )
)]
pub async fn advance_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    HostIdentity(host_id): HostIdentity,
) -> Result<Json<PhaseResponse>, AppError> {
    host_command(&state, id, &host_id, HostCommand::Advance).await
}

/// End the session immediately.
#[utoipa::path(
    post,
    path = "/sessions/{id}/abort",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("X-Host-Id" = String, Header, description = "Host identity")
    ),
    responses(
        (status = 200, description = "Session finished", body = PhaseResponse),
        (status = 401, description = "Not the host", body = ErrorBody),
        (status = 409, description = "Session already finished", body = ErrorBody)
    )
)]
pub async fn abort_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    HostIdentity(host_id): HostIdentity,
) -> Result<Json<PhaseResponse>, AppError> {
    host_command(&state, id, &host_id, HostCommand::Abort).await
}

async fn host_command(
    state: &SharedState,
    id: Uuid,
    host_id: &str,
    command: HostCommand,
) -> Result<Json<PhaseResponse>, AppError> {
    let phase = session_service::run_host_command(state, id, host_id, command).await?;
    Ok(Json(phase))
}

/// Keep the session alive while the host has no event stream open.
#[utoipa::path(
    post,
    path = "/sessions/{id}/heartbeat",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("X-Host-Id" = String, Header, description = "Host identity")
    ),
    responses(
        (status = 204, description = "Heartbeat recorded"),
        (status = 401, description = "Not the host", body = ErrorBody)
    )
)]
pub async fn heartbeat(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    HostIdentity(host_id): HostIdentity,
) -> Result<StatusCode, AppError> {
    session_service::heartbeat(&state, id, &host_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Answer the open question.
#[utoipa::path(
    post,
    path = "/sessions/{id}/answers",
    tag = "sessions",
    request_body = SubmitAnswerRequest,
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("X-Player-Id" = Uuid, Header, description = "Player identity")
    ),
    responses(
        (status = 200, description = "Answer accepted", body = SubmitAnswerResponse),
        (status = 400, description = "Unknown option", body = ErrorBody),
        (status = 401, description = "Unknown player", body = ErrorBody),
        (status = 409, description = "Duplicate answer or question closed", body = ErrorBody)
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    PlayerIdentity(player_id): PlayerIdentity,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<Json<SubmitAnswerResponse>, AppError> {
    payload.validate()?;
    let verdict = session_service::submit_answer(&state, id, player_id, payload).await?;
    Ok(Json(verdict))
}

/// Full ranking of a session.
#[utoipa::path(
    get,
    path = "/sessions/{id}/leaderboard",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Current ranking", body = LeaderboardResponse),
        (status = 404, description = "Session not found", body = ErrorBody)
    )
)]
pub async fn get_leaderboard(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    Ok(Json(session_service::get_leaderboard(&state, id).await?))
}
