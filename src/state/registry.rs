//! Live sessions indexed by identifier and join PIN.

use std::{sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    state::{
        broadcaster::EventHub,
        question::QuestionSet,
        recorder::SessionRecorder,
        session::{LiveSession, SessionSettings},
        storage::StorageHandle,
    },
};

/// Draws attempted before giving up on finding a free PIN.
const MAX_PIN_ATTEMPTS: usize = 32;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions aborted because their host went silent.
    pub expired: usize,
    /// Sessions removed from the registry.
    pub evicted: usize,
}

pub struct SessionRegistry {
    sessions: DashMap<Uuid, Arc<LiveSession>>,
    /// PIN -> session id; a PIN stays reserved until its session is evicted.
    pins: DashMap<String, Uuid>,
    hub: Arc<EventHub>,
    storage: Arc<StorageHandle>,
    pin_length: usize,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(
        hub: Arc<EventHub>,
        storage: Arc<StorageHandle>,
        pin_length: usize,
        settings: SessionSettings,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            pins: DashMap::new(),
            hub,
            storage,
            pin_length,
            settings,
        }
    }

    /// Load the question set, reserve a PIN and open a session in the lobby.
    pub async fn create(
        &self,
        question_set_id: Uuid,
        host_id: &str,
    ) -> Result<Arc<LiveSession>, ServiceError> {
        let store = self.storage.store().await.ok_or(ServiceError::Degraded)?;
        let entity = store
            .find_question_set(question_set_id)
            .await?
            .ok_or_else(|| {
                ServiceError::QuestionSetInvalid(format!(
                    "question set {question_set_id} does not exist"
                ))
            })?;
        let questions = QuestionSet::try_from(entity)?;

        let id = Uuid::new_v4();
        let pin = self.reserve_pin(id, || random_pin(self.pin_length))?;
        self.hub.open(id);
        let session = LiveSession::new(
            id,
            pin,
            host_id.to_owned(),
            questions,
            self.settings,
            self.hub.clone(),
            SessionRecorder::spawn(self.storage.clone(), id),
        );
        self.sessions.insert(id, session.clone());

        info!(
            session_id = %id,
            pin = %session.pin(),
            question_set_id = %question_set_id,
            "session created"
        );
        Ok(session)
    }

    /// Reserve the first candidate PIN not held by a registered session.
    fn reserve_pin(
        &self,
        session_id: Uuid,
        mut candidate: impl FnMut() -> String,
    ) -> Result<String, ServiceError> {
        for attempt in 1..=MAX_PIN_ATTEMPTS {
            let pin = candidate();
            match self.pins.entry(pin) {
                Entry::Vacant(slot) => {
                    let pin = slot.key().clone();
                    slot.insert(session_id);
                    return Ok(pin);
                }
                Entry::Occupied(_) => debug!(attempt, "PIN collision; drawing again"),
            }
        }
        Err(ServiceError::PinSpaceExhausted(MAX_PIN_ATTEMPTS))
    }

    pub fn find_by_pin(&self, pin: &str) -> Result<Arc<LiveSession>, ServiceError> {
        let id = self
            .pins
            .get(pin)
            .map(|entry| *entry.value())
            .ok_or_else(|| ServiceError::SessionNotFound(format!("no session with PIN {pin}")))?;
        self.find_by_id(id)
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Arc<LiveSession>, ServiceError> {
        self.sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::SessionNotFound(id.to_string()))
    }

    /// Abort sessions whose host went silent, then drop them together with
    /// finished sessions older than `retention`.
    pub async fn expire_idle(
        &self,
        now: Instant,
        host_grace: Duration,
        retention: Duration,
    ) -> SweepReport {
        let sessions: Vec<Arc<LiveSession>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut report = SweepReport::default();
        for session in sessions {
            let expired = session.expire_if_idle(now, host_grace).await;
            if expired {
                report.expired += 1;
            }
            if expired || session.is_evictable(now, retention).await {
                self.evict(session.id());
                report.evicted += 1;
            }
        }
        report
    }

    /// Remove a session, release its PIN and close its event channel.
    pub fn evict(&self, id: Uuid) {
        let Some((_, session)) = self.sessions.remove(&id) else {
            return;
        };
        self.pins.remove_if(session.pin(), |_, owner| *owner == id);
        self.hub.close(&id);
        info!(session_id = %id, pin = %session.pin(), "session evicted");
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn random_pin(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10)))
        .collect()
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;
    use crate::{
        dao::{
            models::{OptionEntity, QuestionEntity, QuestionSetEntity},
            session_store::memory::MemoryStore,
        },
        state::state_machine::{FinishReason, SessionPhase},
    };

    fn question_set(questions: Vec<QuestionEntity>) -> QuestionSetEntity {
        QuestionSetEntity {
            id: Uuid::new_v4(),
            title: "Capitals".into(),
            questions,
        }
    }

    fn question() -> QuestionEntity {
        QuestionEntity {
            id: "q0".into(),
            order: 0,
            text: "Capital of France?".into(),
            options: vec![
                OptionEntity {
                    id: "a".into(),
                    text: "Paris".into(),
                },
                OptionEntity {
                    id: "b".into(),
                    text: "Lyon".into(),
                },
            ],
            correct_option_id: "a".into(),
            duration_seconds: 20,
        }
    }

    fn registry(sets: Vec<QuestionSetEntity>) -> SessionRegistry {
        let store = MemoryStore::with_question_sets(sets);
        SessionRegistry::new(
            Arc::new(EventHub::new(16, 16)),
            Arc::new(StorageHandle::with_store(Arc::new(store))),
            6,
            SessionSettings::default(),
        )
    }

    #[tokio::test]
    async fn created_sessions_are_found_by_pin_and_id() {
        let set = question_set(vec![question()]);
        let registry = registry(vec![set.clone()]);

        let session = registry.create(set.id, "host").await.unwrap();

        assert_eq!(session.pin().len(), 6);
        assert!(session.pin().chars().all(|c| c.is_ascii_digit()));
        assert_eq!(registry.find_by_pin(session.pin()).unwrap().id(), session.id());
        assert_eq!(registry.find_by_id(session.id()).unwrap().pin(), session.pin());
        assert!(matches!(
            registry.find_by_pin("000000x"),
            Err(ServiceError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn unknown_or_empty_question_sets_are_rejected() {
        let empty = question_set(Vec::new());
        let registry = registry(vec![empty.clone()]);

        assert!(matches!(
            registry.create(empty.id, "host").await,
            Err(ServiceError::QuestionSetInvalid(_))
        ));
        assert!(matches!(
            registry.create(Uuid::new_v4(), "host").await,
            Err(ServiceError::QuestionSetInvalid(_))
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn degraded_storage_refuses_new_sessions() {
        let registry = SessionRegistry::new(
            Arc::new(EventHub::new(16, 16)),
            Arc::new(StorageHandle::new()),
            6,
            SessionSettings::default(),
        );
        assert!(matches!(
            registry.create(Uuid::new_v4(), "host").await,
            Err(ServiceError::Degraded)
        ));
    }

    #[test]
    fn colliding_pins_are_redrawn() {
        let registry = registry(Vec::new());
        registry.pins.insert("111111".into(), Uuid::new_v4());

        let mut draws = ["111111", "111111", "222222"].into_iter();
        let pin = registry
            .reserve_pin(Uuid::new_v4(), || draws.next().unwrap().to_owned())
            .unwrap();

        assert_eq!(pin, "222222");
    }

    #[test]
    fn exhausted_pin_space_is_reported() {
        let registry = registry(Vec::new());
        registry.pins.insert("111111".into(), Uuid::new_v4());

        let result = registry.reserve_pin(Uuid::new_v4(), || "111111".to_owned());

        assert!(matches!(
            result,
            Err(ServiceError::PinSpaceExhausted(MAX_PIN_ATTEMPTS))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_expires_silent_hosts_and_releases_their_pin() {
        let set = question_set(vec![question()]);
        let registry = registry(vec![set.clone()]);
        let session = registry.create(set.id, "host").await.unwrap();
        let pin = session.pin().to_owned();

        sleep(Duration::from_secs(30)).await;
        let report = registry
            .expire_idle(Instant::now(), Duration::from_secs(60), Duration::from_secs(300))
            .await;
        assert_eq!(report, SweepReport::default());

        sleep(Duration::from_secs(31)).await;
        let report = registry
            .expire_idle(Instant::now(), Duration::from_secs(60), Duration::from_secs(300))
            .await;
        assert_eq!(report, SweepReport { expired: 1, evicted: 1 });
        assert_eq!(
            session.view().await.unwrap().phase,
            SessionPhase::Finished(FinishReason::HostTimeout)
        );
        assert!(registry.find_by_pin(&pin).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn finished_sessions_stay_until_the_retention_window_ends() {
        let set = question_set(vec![question()]);
        let registry = registry(vec![set.clone()]);
        let session = registry.create(set.id, "host").await.unwrap();
        session.abort("host").await.unwrap();

        let grace = Duration::from_secs(600);
        let retention = Duration::from_secs(300);
        let report = registry.expire_idle(Instant::now(), grace, retention).await;
        assert_eq!(report.evicted, 0);
        assert!(registry.find_by_id(session.id()).is_ok());

        sleep(retention).await;
        let report = registry.expire_idle(Instant::now(), grace, retention).await;
        assert_eq!(report.evicted, 1);
        assert!(registry.is_empty());
    }
}
