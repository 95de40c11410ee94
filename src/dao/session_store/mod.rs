pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{AnswerEntity, PlayerEntity, QuestionSetEntity, SessionEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the question bank and the archive of played sessions.
///
/// Question sets are read-only from the engine's point of view; sessions,
/// players and answers are written by the session recorder.
pub trait SessionStore: Send + Sync {
    fn find_question_set(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionSetEntity>>>;
    fn list_question_sets(&self) -> BoxFuture<'static, StorageResult<Vec<(Uuid, String)>>>;
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn append_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn list_answers(&self, session_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
