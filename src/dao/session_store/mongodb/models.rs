use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::models::{
    AnswerEntity, PlayerEntity, QuestionEntity, QuestionSetEntity, SessionEntity,
    SessionStatusEntity,
};

pub const QUESTION_SET_COLLECTION: &str = "question_sets";
pub const SESSION_COLLECTION: &str = "sessions";
pub const PLAYER_COLLECTION: &str = "players";
pub const ANSWER_COLLECTION: &str = "answers";

// Identifiers are stored as canonical hyphenated strings.

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

fn parse_id(collection: &'static str, value: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(value).map_err(|source| MongoDaoError::CorruptDocument {
        collection,
        value: value.to_owned(),
        source,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionSetDocument {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    questions: Vec<QuestionEntity>,
}

impl MongoQuestionSetDocument {
    pub fn into_entity(self) -> MongoResult<QuestionSetEntity> {
        Ok(QuestionSetEntity {
            id: parse_id(QUESTION_SET_COLLECTION, &self.id)?,
            title: self.title,
            questions: self.questions,
        })
    }

    pub fn summary(&self) -> MongoResult<(Uuid, String)> {
        Ok((parse_id(QUESTION_SET_COLLECTION, &self.id)?, self.title.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    id: String,
    pin: String,
    host_id: String,
    question_set_id: String,
    status: SessionStatusEntity,
    current_question_index: Option<i64>,
    question_started_at: Option<DateTime>,
    created_at: DateTime,
    finished_at: Option<DateTime>,
    finish_reason: Option<String>,
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.id.to_string(),
            pin: value.pin,
            host_id: value.host_id,
            question_set_id: value.question_set_id.to_string(),
            status: value.status,
            current_question_index: value.current_question_index.map(|index| index as i64),
            question_started_at: value.question_started_at.map(DateTime::from_system_time),
            created_at: DateTime::from_system_time(value.created_at),
            finished_at: value.finished_at.map(DateTime::from_system_time),
            finish_reason: value.finish_reason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    pub session_id: String,
    pub player_id: String,
    nickname: String,
    score: i64,
    joined_at: DateTime,
    connected: bool,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            session_id: value.session_id.to_string(),
            player_id: value.player_id.to_string(),
            nickname: value.nickname,
            score: i64::from(value.score),
            joined_at: DateTime::from_system_time(value.joined_at),
            connected: value.connected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAnswerDocument {
    pub session_id: String,
    pub question_id: String,
    pub player_id: String,
    selected_option_id: String,
    response_time_ms: i64,
    submitted_at: DateTime,
    score_awarded: i64,
    is_correct: bool,
}

impl From<AnswerEntity> for MongoAnswerDocument {
    fn from(value: AnswerEntity) -> Self {
        Self {
            session_id: value.session_id.to_string(),
            question_id: value.question_id,
            player_id: value.player_id.to_string(),
            selected_option_id: value.selected_option_id,
            response_time_ms: i64::try_from(value.response_time_ms).unwrap_or(i64::MAX),
            submitted_at: DateTime::from_system_time(value.submitted_at),
            score_awarded: i64::from(value.score_awarded),
            is_correct: value.is_correct,
        }
    }
}

impl MongoAnswerDocument {
    pub fn into_entity(self) -> MongoResult<AnswerEntity> {
        Ok(AnswerEntity {
            session_id: parse_id(ANSWER_COLLECTION, &self.session_id)?,
            question_id: self.question_id,
            player_id: parse_id(ANSWER_COLLECTION, &self.player_id)?,
            selected_option_id: self.selected_option_id,
            response_time_ms: u64::try_from(self.response_time_ms).unwrap_or_default(),
            submitted_at: self.submitted_at.to_system_time(),
            score_awarded: u32::try_from(self.score_awarded).unwrap_or_default(),
            is_correct: self.is_correct,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    #[test]
    fn session_documents_keep_their_fields() {
        let entity = SessionEntity {
            id: Uuid::new_v4(),
            pin: "123456".into(),
            host_id: "host".into(),
            question_set_id: Uuid::new_v4(),
            status: SessionStatusEntity::ShowingResults,
            current_question_index: Some(2),
            question_started_at: None,
            // bson dates carry millisecond precision
            created_at: SystemTime::UNIX_EPOCH + Duration::from_millis(1_700_000_000_123),
            finished_at: None,
            finish_reason: None,
        };

        let document = MongoSessionDocument::from(entity.clone());
        assert_eq!(document.id, entity.id.to_string());
        assert_eq!(document.question_set_id, entity.question_set_id.to_string());
        assert_eq!(document.current_question_index, Some(2));
        assert_eq!(document.created_at.to_system_time(), entity.created_at);
        assert!(document.finished_at.is_none());
    }

    #[test]
    fn corrupt_identifiers_are_reported() {
        let document = MongoQuestionSetDocument {
            id: "not-a-uuid".into(),
            title: "broken".into(),
            questions: Vec::new(),
        };
        assert!(matches!(
            document.into_entity(),
            Err(MongoDaoError::CorruptDocument { .. })
        ));
    }
}
