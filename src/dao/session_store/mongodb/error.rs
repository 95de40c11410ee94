use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("invalid MongoDB connection URI for quiz database `{database}`")]
    InvalidUri {
        database: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client for quiz database `{database}`")]
    ClientConstruction {
        database: String,
        #[source]
        source: MongoError,
    },
    #[error("quiz database `{database}` did not answer a ping after {attempts} attempt(s)")]
    DatabaseUnreachable {
        database: String,
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save session `{id}`")]
    SaveSession {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to save player `{player_id}` of session `{session_id}`")]
    SavePlayer {
        session_id: Uuid,
        player_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to record answer of `{player_id}` to `{question_id}` in session `{session_id}`")]
    AppendAnswer {
        session_id: Uuid,
        player_id: Uuid,
        question_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load answers of session `{id}`")]
    LoadAnswers {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load question set `{id}`")]
    LoadQuestionSet {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list question sets")]
    ListQuestionSets {
        #[source]
        source: MongoError,
    },
    #[error("document in `{collection}` holds an invalid identifier `{value}`")]
    CorruptDocument {
        collection: &'static str,
        value: String,
        #[source]
        source: uuid::Error,
    },
}
