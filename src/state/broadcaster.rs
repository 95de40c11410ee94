use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
};

use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::dto::events::EventEnvelope;

/// Fan-out of session events to every subscriber of that session.
///
/// Implementations must preserve the publication order per session and must
/// never block the caller; a failed delivery is the subscriber's problem.
pub trait Broadcaster: Send + Sync {
    /// Hand `envelope` to every subscriber of `envelope.session_id`.
    fn publish(&self, envelope: EventEnvelope);
}

/// Broadcast channel of a single session plus a bounded replay history.
pub struct SessionHub {
    sender: broadcast::Sender<EventEnvelope>,
    history: Mutex<VecDeque<EventEnvelope>>,
    history_limit: usize,
    /// Flipped once when the session is evicted; subscribers holding the hub stop on it.
    closed: watch::Sender<bool>,
}

impl SessionHub {
    /// Construct a hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize, history_limit: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            history: Mutex::new(VecDeque::with_capacity(history_limit)),
            history_limit,
            closed: watch::Sender::new(false),
        }
    }

    /// Watch the closed flag of the hub.
    pub fn closed_watcher(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    /// Tell every stream of the session to end.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Subscribe and collect the retained events newer than `last_seen`.
    ///
    /// The receiver is registered before the history is read, so an event
    /// published in between shows up in both; subscribers drop it by `seq`.
    pub fn subscribe_from(
        &self,
        last_seen: Option<u64>,
    ) -> (Vec<EventEnvelope>, broadcast::Receiver<EventEnvelope>) {
        let receiver = self.subscribe();
        (self.replay_after(last_seen), receiver)
    }

    /// Retained events with a sequence number above `last_seen` (all of them for `None`).
    pub fn replay_after(&self, last_seen: Option<u64>) -> Vec<EventEnvelope> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history
            .iter()
            .filter(|envelope| last_seen.is_none_or(|seen| envelope.seq > seen))
            .cloned()
            .collect()
    }

    /// Record the event and send it to all current subscribers, ignoring delivery errors.
    pub fn publish(&self, envelope: EventEnvelope) {
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if self.history_limit > 0 {
                if history.len() == self.history_limit {
                    history.pop_front();
                }
                history.push_back(envelope.clone());
            }
        }
        let _ = self.sender.send(envelope);
    }
}

/// Registry of per-session hubs; the default [`Broadcaster`].
pub struct EventHub {
    hubs: DashMap<Uuid, Arc<SessionHub>>,
    capacity: usize,
    history_limit: usize,
}

impl EventHub {
    /// Build an empty hub registry with per-session channel sizing.
    pub fn new(capacity: usize, history_limit: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity,
            history_limit,
        }
    }

    /// Create (or return) the hub of `session_id`.
    pub fn open(&self, session_id: Uuid) -> Arc<SessionHub> {
        self.hubs
            .entry(session_id)
            .or_insert_with(|| Arc::new(SessionHub::new(self.capacity, self.history_limit)))
            .clone()
    }

    /// Hub of `session_id`, if the session is still registered.
    pub fn get(&self, session_id: &Uuid) -> Option<Arc<SessionHub>> {
        self.hubs.get(session_id).map(|hub| hub.clone())
    }

    /// Unregister the hub and end the streams still attached to it.
    pub fn close(&self, session_id: &Uuid) {
        if let Some((_, hub)) = self.hubs.remove(session_id) {
            hub.close();
        }
    }
}

impl Broadcaster for EventHub {
    fn publish(&self, envelope: EventEnvelope) {
        let hub = self.hubs.get(&envelope.session_id).map(|hub| hub.clone());
        if let Some(hub) = hub {
            hub.publish(envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::dto::events::{PlayerJoinedEvent, QuizEvent};

    fn envelope(session_id: Uuid, seq: u64) -> EventEnvelope {
        EventEnvelope {
            session_id,
            seq,
            event: QuizEvent::PlayerJoined(PlayerJoinedEvent {
                player_id: Uuid::nil(),
                nickname: format!("p{seq}"),
                observer: false,
            }),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let hub = EventHub::new(8, 8);
        let session_id = Uuid::new_v4();
        let mut rx = hub.open(session_id).subscribe();

        for seq in 1..=3 {
            hub.publish(envelope(session_id, seq));
        }

        for expected in 1..=3 {
            assert_eq!(rx.recv().await.unwrap().seq, expected);
        }
    }

    #[test]
    fn history_is_bounded_and_filtered() {
        let session_hub = SessionHub::new(8, 2);
        let session_id = Uuid::new_v4();
        for seq in 1..=3 {
            session_hub.publish(envelope(session_id, seq));
        }

        let all: Vec<_> = session_hub.replay_after(None).iter().map(|e| e.seq).collect();
        assert_eq!(all, [2, 3]);
        let newer: Vec<_> = session_hub
            .replay_after(Some(2))
            .iter()
            .map(|e| e.seq)
            .collect();
        assert_eq!(newer, [3]);
    }

    #[test]
    fn publishing_to_an_unknown_session_is_a_no_op() {
        let hub = EventHub::new(8, 8);
        hub.publish(envelope(Uuid::new_v4(), 1));
    }

    #[tokio::test]
    async fn closing_a_hub_signals_streams_that_still_hold_it() {
        let hub = EventHub::new(8, 8);
        let session_id = Uuid::new_v4();
        hub.open(session_id);

        let session_hub = hub.get(&session_id).unwrap();
        let (_, _receiver) = session_hub.subscribe_from(None);
        let mut closed = session_hub.closed_watcher();
        assert!(!*closed.borrow());

        hub.close(&session_id);

        assert!(hub.get(&session_id).is_none());
        timeout(Duration::from_millis(200), closed.wait_for(|closed| *closed))
            .await
            .expect("close signal not delivered")
            .unwrap();
    }
}
