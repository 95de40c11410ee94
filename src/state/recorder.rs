//! Ordered write-behind of session records to the persistence store.
//!
//! Live state is authoritative: a write that keeps failing is logged and
//! dropped, it never rolls back a transition.

use std::{sync::Arc, time::Duration};

use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{AnswerEntity, PlayerEntity, SessionEntity},
        session_store::SessionStore,
        storage::StorageResult,
    },
    state::storage::StorageHandle,
};

const INITIAL_DELAY: Duration = Duration::from_millis(200);
const MAX_DELAY: Duration = Duration::from_secs(5);
const MAX_ATTEMPTS: u32 = 5;

/// One record to persist.
#[derive(Debug, Clone)]
pub enum StorageWrite {
    Session(SessionEntity),
    Player(PlayerEntity),
    Answer(AnswerEntity),
}

impl StorageWrite {
    fn kind(&self) -> &'static str {
        match self {
            StorageWrite::Session(_) => "session",
            StorageWrite::Player(_) => "player",
            StorageWrite::Answer(_) => "answer",
        }
    }

    async fn send(&self, store: &dyn SessionStore) -> StorageResult<()> {
        match self {
            StorageWrite::Session(session) => store.save_session(session.clone()).await,
            StorageWrite::Player(player) => store.save_player(player.clone()).await,
            StorageWrite::Answer(answer) => store.append_answer(answer.clone()).await,
        }
    }
}

/// Per-session queue drained by a single writer task, so records land in submission order.
#[derive(Clone)]
pub struct SessionRecorder {
    tx: mpsc::UnboundedSender<StorageWrite>,
}

impl SessionRecorder {
    /// Spawn the writer task of `session_id`. It ends once every recorder clone is dropped.
    pub fn spawn(storage: Arc<StorageHandle>, session_id: Uuid) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<StorageWrite>();
        tokio::spawn(async move {
            while let Some(write) = rx.recv().await {
                persist(&storage, session_id, write).await;
            }
            debug!(session_id = %session_id, "session recorder drained");
        });
        Self { tx }
    }

    /// Queue `write`; never blocks.
    pub fn record(&self, write: StorageWrite) {
        if let Err(err) = self.tx.send(write) {
            debug!(kind = err.0.kind(), "session recorder closed; dropping write");
        }
    }
}

async fn persist(storage: &StorageHandle, session_id: Uuid, write: StorageWrite) {
    let mut delay = INITIAL_DELAY;
    for attempt in 1..=MAX_ATTEMPTS {
        let outcome = match storage.store().await {
            Some(store) => write.send(store.as_ref()).await,
            None => {
                debug!(session_id = %session_id, attempt, "no storage installed; write delayed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        match outcome {
            Ok(()) => return,
            Err(err) => {
                warn!(
                    session_id = %session_id,
                    kind = write.kind(),
                    attempt,
                    error = %err,
                    "failed to persist session record"
                );
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }

    warn!(
        session_id = %session_id,
        kind = write.kind(),
        "giving up on session record after {MAX_ATTEMPTS} attempts"
    );
}
