use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        ANSWER_COLLECTION, MongoAnswerDocument, MongoPlayerDocument, MongoQuestionSetDocument,
        MongoSessionDocument, PLAYER_COLLECTION, QUESTION_SET_COLLECTION, SESSION_COLLECTION,
        doc_id,
    },
};
use crate::dao::{
    models::{AnswerEntity, PlayerEntity, QuestionSetEntity, SessionEntity},
    session_store::SessionStore,
    storage::StorageResult,
};

#[derive(Clone)]
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoSessionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let sessions = database.collection::<mongodb::bson::Document>(SESSION_COLLECTION);
        let pin_index = IndexModel::builder()
            .keys(doc! {"pin": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_pin_idx".to_owned()))
                    .build(),
            )
            .build();
        sessions
            .create_index(pin_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION,
                index: "pin",
                source,
            })?;

        let players = database.collection::<mongodb::bson::Document>(PLAYER_COLLECTION);
        let player_index = IndexModel::builder()
            .keys(doc! {"session_id": 1, "player_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("player_session_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        players
            .create_index(player_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PLAYER_COLLECTION,
                index: "session_id,player_id",
                source,
            })?;

        // One answer per player and question.
        let answers = database.collection::<mongodb::bson::Document>(ANSWER_COLLECTION);
        let answer_index = IndexModel::builder()
            .keys(doc! {"session_id": 1, "question_id": 1, "player_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("answer_unique_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        answers
            .create_index(answer_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ANSWER_COLLECTION,
                index: "session_id,question_id,player_id",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn find_question_set(&self, id: Uuid) -> MongoResult<Option<QuestionSetEntity>> {
        let collection = self
            .collection::<MongoQuestionSetDocument>(QUESTION_SET_COLLECTION)
            .await;
        let document = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadQuestionSet { id, source })?;
        document.map(MongoQuestionSetDocument::into_entity).transpose()
    }

    async fn list_question_sets(&self) -> MongoResult<Vec<(Uuid, String)>> {
        let collection = self
            .collection::<MongoQuestionSetDocument>(QUESTION_SET_COLLECTION)
            .await;
        let documents: Vec<MongoQuestionSetDocument> = collection
            .find(doc! {})
            .sort(doc! {"title": 1})
            .await
            .map_err(|source| MongoDaoError::ListQuestionSets { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListQuestionSets { source })?;

        documents.iter().map(MongoQuestionSetDocument::summary).collect()
    }

    async fn save_session(&self, session: SessionEntity) -> MongoResult<()> {
        let id = session.id;
        let document = MongoSessionDocument::from(session);
        let collection = self
            .collection::<MongoSessionDocument>(SESSION_COLLECTION)
            .await;
        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSession { id, source })?;
        Ok(())
    }

    async fn save_player(&self, player: PlayerEntity) -> MongoResult<()> {
        let session_id = player.session_id;
        let player_id = player.player_id;
        let document = MongoPlayerDocument::from(player);
        let collection = self
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION)
            .await;
        collection
            .replace_one(
                doc! {"session_id": &document.session_id, "player_id": &document.player_id},
                &document,
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePlayer {
                session_id,
                player_id,
                source,
            })?;
        Ok(())
    }

    async fn append_answer(&self, answer: AnswerEntity) -> MongoResult<()> {
        let session_id = answer.session_id;
        let player_id = answer.player_id;
        let question_id = answer.question_id.clone();
        let document = MongoAnswerDocument::from(answer);
        let collection = self
            .collection::<MongoAnswerDocument>(ANSWER_COLLECTION)
            .await;
        // Upsert keyed on the unique index so a retried write stays a single record.
        collection
            .replace_one(
                doc! {
                    "session_id": &document.session_id,
                    "question_id": &document.question_id,
                    "player_id": &document.player_id,
                },
                &document,
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::AppendAnswer {
                session_id,
                player_id,
                question_id,
                source,
            })?;
        Ok(())
    }

    async fn list_answers(&self, id: Uuid) -> MongoResult<Vec<AnswerEntity>> {
        let collection = self
            .collection::<MongoAnswerDocument>(ANSWER_COLLECTION)
            .await;
        let documents: Vec<MongoAnswerDocument> = collection
            .find(doc! {"session_id": id.to_string()})
            .sort(doc! {"submitted_at": 1})
            .await
            .map_err(|source| MongoDaoError::LoadAnswers { id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadAnswers { id, source })?;

        documents
            .into_iter()
            .map(MongoAnswerDocument::into_entity)
            .collect()
    }
}

impl SessionStore for MongoSessionStore {
    fn find_question_set(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionSetEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_question_set(id).await.map_err(Into::into) })
    }

    fn list_question_sets(&self) -> BoxFuture<'static, StorageResult<Vec<(Uuid, String)>>> {
        let store = self.clone();
        Box::pin(async move { store.list_question_sets().await.map_err(Into::into) })
    }

    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_session(session).await.map_err(Into::into) })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_player(player).await.map_err(Into::into) })
    }

    fn append_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append_answer(answer).await.map_err(Into::into) })
    }

    fn list_answers(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_answers(session_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
