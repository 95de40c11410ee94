use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::events::EventEnvelope;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE `id:` field, the session sequence number for quiz events.
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            id: None,
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Quiz event stamped with its sequence number so clients can resume with `Last-Event-ID`.
    pub fn from_envelope(envelope: &EventEnvelope) -> serde_json::Result<Self> {
        let mut event = Self::json(envelope.event.name().to_owned(), envelope)?;
        event.id = Some(envelope.seq.to_string());
        Ok(event)
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    pub session_id: Uuid,
    /// `host`, `player` or `spectator`.
    pub role: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
    /// Number of missed events replayed right after this handshake.
    pub replayed: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}
