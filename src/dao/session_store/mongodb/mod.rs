//! MongoDB-backed [`SessionStore`](crate::dao::session_store::SessionStore).

mod config;
mod connection;
mod error;
mod models;
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoSessionStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::CorruptDocument { .. } => StorageError::invalid_data(err.to_string(), err),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
