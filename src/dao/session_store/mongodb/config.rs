//! Where the question bank and the session archive live.

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const URI_VAR: &str = "MONGO_URI";
const DATABASE_VAR: &str = "MONGO_DB";
/// Database holding the `question_sets` bank and the played-session collections.
const DEFAULT_DATABASE: &str = "quizzit";
/// Shows up in the server logs and `currentOp` output of the database.
const APP_NAME: &str = "quizzit-back";

/// Connection settings of the quiz database.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    /// Parse `uri`; a missing or blank `database_name` falls back to `quizzit`.
    pub async fn from_uri(uri: &str, database_name: Option<&str>) -> MongoResult<Self> {
        let database_name = database_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_DATABASE)
            .to_owned();
        let mut options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    database: database_name.clone(),
                    source,
                })?;
        if options.app_name.is_none() {
            options.app_name = Some(APP_NAME.to_owned());
        }

        Ok(Self {
            options,
            database_name,
        })
    }

    /// Read `MONGO_URI` (required) and `MONGO_DB` (optional).
    pub async fn from_env() -> MongoResult<Self> {
        let uri =
            std::env::var(URI_VAR).map_err(|_| MongoDaoError::MissingEnvVar { var: URI_VAR })?;
        let database_name = std::env::var(DATABASE_VAR).ok();
        Self::from_uri(&uri, database_name.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_database_name_uses_the_quiz_database() {
        let config = MongoConfig::from_uri("mongodb://localhost:27017", Some("  "))
            .await
            .unwrap();
        assert_eq!(config.database_name, "quizzit");
        assert_eq!(config.options.app_name.as_deref(), Some("quizzit-back"));
    }

    #[tokio::test]
    async fn explicit_app_name_is_kept() {
        let config =
            MongoConfig::from_uri("mongodb://localhost:27017/?appName=trivia-night", Some("trivia"))
                .await
                .unwrap();
        assert_eq!(config.database_name, "trivia");
        assert_eq!(config.options.app_name.as_deref(), Some("trivia-night"));
    }

    #[tokio::test]
    async fn malformed_uri_names_the_target_database() {
        let err = MongoConfig::from_uri("postgres://localhost", None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, MongoDaoError::InvalidUri { ref database, .. } if database == "quizzit"));
    }
}
