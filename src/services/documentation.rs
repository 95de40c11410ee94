use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quizz-it Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sessions::list_question_sets,
        crate::routes::sessions::create_session,
        crate::routes::sessions::get_session,
        crate::routes::sessions::get_session_by_pin,
        crate::routes::sessions::join_session,
        crate::routes::sessions::start_session,
        crate::routes::sessions::close_question,
        crate::routes::sessions::advance_session,
        crate::routes::sessions::abort_session,
        crate::routes::sessions::heartbeat,
        crate::routes::sessions::submit_answer,
        crate::routes::sessions::get_leaderboard,
        crate::routes::sse::session_events,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::CreateSessionResponse,
            crate::dto::session::JoinSessionRequest,
            crate::dto::session::JoinSessionResponse,
            crate::dto::session::SubmitAnswerRequest,
            crate::dto::session::SubmitAnswerResponse,
            crate::dto::session::SessionResponse,
            crate::dto::session::CurrentQuestionResponse,
            crate::dto::session::LeaderboardResponse,
            crate::dto::session::QuestionSetListItem,
            crate::dto::phase::PhaseResponse,
            crate::dto::phase::VisibleSessionStatus,
            crate::dto::events::EventEnvelope,
            crate::dto::events::QuizEvent,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::state::leaderboard::LeaderboardEntry,
            crate::error::ErrorBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Session lifecycle, players and answers"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
