use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc, watch,
    },
    time::{MissedTickBehavior, interval},
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        events::EventEnvelope,
        sse::{Handshake, ServerEvent, SystemStatus},
    },
    error::ServiceError,
    state::{SharedState, broadcaster::SessionHub, session::LiveSession},
};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Who is holding the stream; drives connection bookkeeping on both ends of its life.
#[derive(Clone, Debug)]
pub enum StreamRole {
    Host(String),
    Player(Uuid),
    Spectator,
}

impl StreamRole {
    fn name(&self) -> &'static str {
        match self {
            StreamRole::Host(_) => "host",
            StreamRole::Player(_) => "player",
            StreamRole::Spectator => "spectator",
        }
    }
}

/// Response body of an event stream: forwarded events plus keep-alive comments.
pub type EventStream = Sse<KeepAliveStream<ReceiverStream<Result<Event, Infallible>>>>;

/// Open the event stream of a session.
///
/// Events newer than `last_event_id` still in the replay history are sent right
/// after the handshake. A player counts as connected while any of their
/// streams is open; a host stream keeps the host heartbeat fresh. Closing the
/// session hub ends the stream.
pub async fn open_stream(
    state: &SharedState,
    session_id: Uuid,
    role: StreamRole,
    last_event_id: Option<u64>,
) -> Result<EventStream, ServiceError> {
    let session = state.registry().find_by_id(session_id)?;
    let hub = state
        .hub()
        .get(&session_id)
        .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))?;

    match &role {
        StreamRole::Host(host_id) => session.heartbeat(host_id).await?,
        StreamRole::Player(player_id) => session.attach_player_stream(*player_id).await?,
        StreamRole::Spectator => {}
    }

    let (replay, receiver) = hub.subscribe_from(last_event_id);
    let handshake = Handshake {
        session_id,
        role: role.name().to_owned(),
        degraded: state.is_degraded(),
        replayed: replay.len(),
    };
    info!(session_id = %session_id, role = role.name(), replayed = replay.len(), "event stream opened");

    let heartbeat_every = (state.config().host_grace / 3).max(MIN_HEARTBEAT_INTERVAL);
    let forwarder = Forwarder {
        session,
        hub,
        role,
        last_sent: last_event_id.unwrap_or(0),
        heartbeat_every,
    };
    Ok(forwarder.spawn(
        handshake,
        replay,
        receiver,
        state.storage().degraded_watcher(),
    ))
}

/// Task moving events from the session hub into one client's response body.
struct Forwarder {
    session: Arc<LiveSession>,
    hub: Arc<SessionHub>,
    role: StreamRole,
    /// Highest sequence number handed to the client.
    last_sent: u64,
    heartbeat_every: Duration,
}

impl Forwarder {
    fn spawn(
        mut self,
        handshake: Handshake,
        replay: Vec<EventEnvelope>,
        mut receiver: broadcast::Receiver<EventEnvelope>,
        mut degraded: watch::Receiver<bool>,
    ) -> EventStream {
        // small bounded channel between forwarder and response
        let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(16);

        tokio::spawn(async move {
            let opened = match ServerEvent::json("handshake".to_owned(), &handshake) {
                Ok(event) => send(&tx, event).await,
                Err(err) => {
                    warn!(error = %err, "failed to encode stream handshake");
                    true
                }
            };
            let mut closed = self.hub.closed_watcher();
            if opened && self.deliver(&tx, replay).await {
                self.pump(&tx, &mut receiver, &mut degraded, &mut closed).await;
            }
            self.teardown().await;
        });

        Sse::new(ReceiverStream::new(rx)).keep_alive(
            KeepAlive::new()
                .interval(KEEP_ALIVE_INTERVAL)
                .text("keep-alive"),
        )
    }

    async fn pump(
        &mut self,
        tx: &mpsc::Sender<Result<Event, Infallible>>,
        receiver: &mut broadcast::Receiver<EventEnvelope>,
        degraded: &mut watch::Receiver<bool>,
        closed: &mut watch::Receiver<bool>,
    ) {
        let mut heartbeat = interval(self.heartbeat_every);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watching_storage = true;

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                _ = hub_closed(closed) => {
                    debug!(session_id = %self.session.id(), "session hub closed; ending stream");
                    break;
                }
                recv_result = receiver.recv() => match recv_result {
                    Ok(envelope) => {
                        if !self.deliver(tx, vec![envelope]).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(session_id = %self.session.id(), skipped, "event stream lagged; replaying history");
                        let missed = self.hub.replay_after(Some(self.last_sent));
                        if !self.deliver(tx, missed).await {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
                changed = degraded.changed(), if watching_storage => {
                    if changed.is_err() {
                        watching_storage = false;
                        continue;
                    }
                    let status = SystemStatus { degraded: *degraded.borrow_and_update() };
                    if let Ok(event) = ServerEvent::json("system_status".to_owned(), &status)
                        && !send(tx, event).await
                    {
                        break;
                    }
                }
                _ = heartbeat.tick(), if matches!(self.role, StreamRole::Host(_)) => {
                    if let StreamRole::Host(host_id) = &self.role
                        && let Err(err) = self.session.heartbeat(host_id).await
                    {
                        debug!(session_id = %self.session.id(), error = %err, "host heartbeat refresh failed");
                    }
                }
            }
        }
    }

    /// Send the envelopes not yet seen by the client. Returns `false` once the client is gone.
    async fn deliver(
        &mut self,
        tx: &mpsc::Sender<Result<Event, Infallible>>,
        envelopes: Vec<EventEnvelope>,
    ) -> bool {
        for envelope in envelopes {
            if envelope.seq <= self.last_sent {
                continue;
            }
            match ServerEvent::from_envelope(&envelope) {
                Ok(event) => {
                    if !send(tx, event).await {
                        return false;
                    }
                }
                Err(err) => warn!(session_id = %envelope.session_id, seq = envelope.seq, error = %err, "failed to encode event"),
            }
            self.last_sent = envelope.seq;
        }
        true
    }

    async fn teardown(self) {
        let session_id = self.session.id();
        if let StreamRole::Player(player_id) = &self.role
            && let Err(err) = self.session.detach_player_stream(*player_id).await
        {
            debug!(session_id = %session_id, player_id = %player_id, error = %err, "failed to mark player disconnected");
        }
        info!(session_id = %session_id, role = self.role.name(), "event stream closed");
    }
}

async fn hub_closed(closed: &mut watch::Receiver<bool>) {
    // a dropped hub ends the stream as well
    let _ = closed.wait_for(|closed| *closed).await;
}

async fn send(tx: &mpsc::Sender<Result<Event, Infallible>>, payload: ServerEvent) -> bool {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    if let Some(id) = payload.id {
        event = event.id(id);
    }
    tx.send(Ok(event)).await.is_ok()
}
