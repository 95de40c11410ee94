use axum::{
    Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    error::{AppError, ErrorBody},
    services::sse_service::{self, EventStream, StreamRole},
    state::SharedState,
};

const LAST_EVENT_ID_HEADER: &str = "last-event-id";

/// Identity of the stream holder; at most one of the two is expected.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StreamQuery {
    /// Player identity handed out on join.
    pub player_id: Option<Uuid>,
    /// Host identity chosen at session creation.
    pub host_id: Option<String>,
}

impl StreamQuery {
    fn role(self) -> StreamRole {
        match (self.host_id, self.player_id) {
            (Some(host_id), _) => StreamRole::Host(host_id),
            (None, Some(player_id)) => StreamRole::Player(player_id),
            (None, None) => StreamRole::Spectator,
        }
    }
}

#[utoipa::path(
    get,
    path = "/sessions/{id}/events",
    tag = "sse",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("Last-Event-ID" = Option<u64>, Header, description = "Sequence number of the last event received"),
        StreamQuery
    ),
    responses(
        (status = 200, description = "Ordered session events", content_type = "text/event-stream", body = String),
        (status = 401, description = "Unknown host or player", body = ErrorBody),
        (status = 404, description = "Session not found", body = ErrorBody)
    )
)]
/// Stream the events of a session, replaying what a resuming client missed.
pub async fn session_events(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<EventStream, AppError> {
    let last_event_id = match headers.get(LAST_EVENT_ID_HEADER) {
        Some(value) => Some(
            value
                .to_str()
                .ok()
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .ok_or_else(|| AppError::BadRequest("Last-Event-ID must be a sequence number".into()))?,
        ),
        None => None,
    };
    let stream = sse_service::open_stream(&state, id, query.role(), last_event_id).await?;
    Ok(stream)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sessions/{id}/events", get(session_events))
}
