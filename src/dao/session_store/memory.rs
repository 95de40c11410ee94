//! Process-local store, used when no database is configured and in tests.

use std::{fs, path::Path, sync::Arc};

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{AnswerEntity, PlayerEntity, QuestionSetEntity, SessionEntity},
    session_store::SessionStore,
    storage::{StorageError, StorageResult},
};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    question_sets: DashMap<Uuid, QuestionSetEntity>,
    sessions: DashMap<Uuid, SessionEntity>,
    players: DashMap<(Uuid, Uuid), PlayerEntity>,
    answers: DashMap<Uuid, Vec<AnswerEntity>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store serving the given question sets.
    pub fn with_question_sets(sets: impl IntoIterator<Item = QuestionSetEntity>) -> Self {
        let store = Self::new();
        for set in sets {
            store.inner.question_sets.insert(set.id, set);
        }
        store
    }

    /// Load a JSON array of question sets from disk.
    pub fn from_json_file(path: &Path) -> StorageResult<Self> {
        let contents = fs::read_to_string(path).map_err(|source| {
            StorageError::unavailable(
                format!("cannot read question bank `{}`", path.display()),
                source,
            )
        })?;
        let sets: Vec<QuestionSetEntity> = serde_json::from_str(&contents).map_err(|source| {
            StorageError::invalid_data(
                format!("cannot parse question bank `{}`", path.display()),
                source,
            )
        })?;
        Ok(Self::with_question_sets(sets))
    }

    /// Players recorded for `session_id`, in no particular order.
    pub fn players(&self, session_id: Uuid) -> Vec<PlayerEntity> {
        self.inner
            .players
            .iter()
            .filter(|entry| entry.key().0 == session_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Last archived record of a session.
    pub fn session(&self, session_id: Uuid) -> Option<SessionEntity> {
        self.inner
            .sessions
            .get(&session_id)
            .map(|session| session.clone())
    }
}

impl SessionStore for MemoryStore {
    fn find_question_set(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionSetEntity>>> {
        let found = self.inner.question_sets.get(&id).map(|set| set.clone());
        Box::pin(async move { Ok(found) })
    }

    fn list_question_sets(&self) -> BoxFuture<'static, StorageResult<Vec<(Uuid, String)>>> {
        let mut sets: Vec<(Uuid, String)> = self
            .inner
            .question_sets
            .iter()
            .map(|entry| (entry.id, entry.title.clone()))
            .collect();
        sets.sort_by(|a, b| a.1.cmp(&b.1));
        Box::pin(async move { Ok(sets) })
    }

    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.sessions.insert(session.id, session);
        Box::pin(async { Ok(()) })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner
            .players
            .insert((player.session_id, player.player_id), player);
        Box::pin(async { Ok(()) })
    }

    fn append_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let mut answers = self.inner.answers.entry(answer.session_id).or_default();
        let exists = answers.iter().any(|stored| {
            stored.question_id == answer.question_id && stored.player_id == answer.player_id
        });
        if !exists {
            answers.push(answer);
        }
        Box::pin(async { Ok(()) })
    }

    fn list_answers(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let answers = self
            .inner
            .answers
            .get(&session_id)
            .map(|answers| answers.clone())
            .unwrap_or_default();
        Box::pin(async move { Ok(answers) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn answer(session_id: Uuid, player_id: Uuid) -> AnswerEntity {
        AnswerEntity {
            session_id,
            question_id: "q0".into(),
            player_id,
            selected_option_id: "a".into(),
            response_time_ms: 1_200,
            submitted_at: SystemTime::now(),
            score_awarded: 940,
            is_correct: true,
        }
    }

    #[tokio::test]
    async fn replayed_answer_writes_are_idempotent() {
        let store = MemoryStore::new();
        let session_id = Uuid::new_v4();
        let player_id = Uuid::new_v4();

        store.append_answer(answer(session_id, player_id)).await.unwrap();
        store.append_answer(answer(session_id, player_id)).await.unwrap();

        assert_eq!(store.list_answers(session_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn question_sets_are_served_by_id() {
        let set = QuestionSetEntity {
            id: Uuid::new_v4(),
            title: "Capitals".into(),
            questions: Vec::new(),
        };
        let store = MemoryStore::with_question_sets([set.clone()]);

        assert_eq!(store.find_question_set(set.id).await.unwrap(), Some(set));
        assert_eq!(store.find_question_set(Uuid::new_v4()).await.unwrap(), None);
        assert_eq!(store.list_question_sets().await.unwrap().len(), 1);
    }

    #[test]
    fn missing_bank_file_is_reported() {
        let err = MemoryStore::from_json_file(Path::new("/nonexistent/questions.json"))
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::Unavailable { .. }));
    }
}
