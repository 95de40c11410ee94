use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{OptionEntity, QuestionEntity, QuestionSetEntity};

/// Candidate answer shown to players.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOption {
    /// Identifier of the option, unique inside its question.
    pub id: String,
    /// Label displayed to players.
    pub text: String,
}

/// A timed question, immutable once its session has been created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Identifier of the question, unique inside its set.
    pub id: String,
    /// Position of the question inside the set.
    pub order: u32,
    /// Prompt displayed to players.
    pub text: String,
    /// Candidate answers.
    pub options: Vec<QuestionOption>,
    /// Identifier of the correct option.
    pub correct_option_id: String,
    /// Time allowed to answer, in seconds.
    pub duration_seconds: u32,
}

impl Question {
    /// Whether `option_id` is one of this question's options.
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|option| option.id == option_id)
    }
}

/// Ordered, validated set of questions played by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    /// Stable identifier of the set in the question bank.
    pub id: Uuid,
    /// Human readable title of the quiz.
    pub title: String,
    /// Questions sorted by their `order`.
    pub questions: Vec<Question>,
}

impl QuestionSet {
    /// Number of questions in the set.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the set holds no question at all.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Question at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

/// Reasons a question set cannot be played.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionSetError {
    #[error("question set `{0}` has no questions")]
    Empty(Uuid),
    #[error("question `{0}` appears more than once")]
    DuplicateQuestion(String),
    #[error("question `{0}` needs at least two options")]
    TooFewOptions(String),
    #[error("question `{question_id}` declares option `{option_id}` twice")]
    DuplicateOption {
        question_id: String,
        option_id: String,
    },
    #[error("question `{question_id}` marks unknown option `{option_id}` as correct")]
    UnknownCorrectOption {
        question_id: String,
        option_id: String,
    },
    #[error("question `{0}` has a zero duration")]
    ZeroDuration(String),
}

impl TryFrom<QuestionSetEntity> for QuestionSet {
    type Error = QuestionSetError;

    fn try_from(value: QuestionSetEntity) -> Result<Self, Self::Error> {
        if value.questions.is_empty() {
            return Err(QuestionSetError::Empty(value.id));
        }

        let mut seen_questions = HashSet::new();
        let mut questions = value
            .questions
            .into_iter()
            .map(|question| {
                if !seen_questions.insert(question.id.clone()) {
                    return Err(QuestionSetError::DuplicateQuestion(question.id));
                }
                Question::try_from(question)
            })
            .collect::<Result<Vec<_>, _>>()?;
        questions.sort_by_key(|question| question.order);

        Ok(Self {
            id: value.id,
            title: value.title,
            questions,
        })
    }
}

impl TryFrom<QuestionEntity> for Question {
    type Error = QuestionSetError;

    fn try_from(value: QuestionEntity) -> Result<Self, Self::Error> {
        if value.options.len() < 2 {
            return Err(QuestionSetError::TooFewOptions(value.id));
        }

        if value.duration_seconds == 0 {
            return Err(QuestionSetError::ZeroDuration(value.id));
        }

        let mut seen = HashSet::new();
        for option in &value.options {
            if !seen.insert(option.id.as_str()) {
                return Err(QuestionSetError::DuplicateOption {
                    question_id: value.id.clone(),
                    option_id: option.id.clone(),
                });
            }
        }

        if !seen.contains(value.correct_option_id.as_str()) {
            return Err(QuestionSetError::UnknownCorrectOption {
                question_id: value.id,
                option_id: value.correct_option_id,
            });
        }

        Ok(Self {
            id: value.id,
            order: value.order,
            text: value.text,
            options: value.options.into_iter().map(Into::into).collect(),
            correct_option_id: value.correct_option_id,
            duration_seconds: value.duration_seconds,
        })
    }
}

impl From<OptionEntity> for QuestionOption {
    fn from(value: OptionEntity) -> Self {
        Self {
            id: value.id,
            text: value.text,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::{fixtures::question_entity, *};

    fn set_of(questions: Vec<QuestionEntity>) -> QuestionSetEntity {
        QuestionSetEntity {
            id: Uuid::new_v4(),
            title: "set".into(),
            questions,
        }
    }

    #[test]
    fn questions_are_sorted_by_order() {
        let set = QuestionSet::try_from(set_of(vec![
            question_entity("second", 2, 10),
            question_entity("first", 1, 10),
        ]))
        .unwrap();

        let ids: Vec<_> = set.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, ["first", "second"]);
    }

    #[test]
    fn empty_set_is_rejected() {
        let entity = set_of(Vec::new());
        let id = entity.id;
        assert_eq!(
            QuestionSet::try_from(entity).unwrap_err(),
            QuestionSetError::Empty(id)
        );
    }

    #[test]
    fn unknown_correct_option_is_rejected() {
        let mut question = question_entity("q", 0, 10);
        question.correct_option_id = "z".into();
        assert!(matches!(
            QuestionSet::try_from(set_of(vec![question])),
            Err(QuestionSetError::UnknownCorrectOption { .. })
        ));
    }

    #[test]
    fn zero_duration_is_rejected() {
        assert_eq!(
            QuestionSet::try_from(set_of(vec![question_entity("q", 0, 0)])).unwrap_err(),
            QuestionSetError::ZeroDuration("q".into())
        );
    }

    #[test]
    fn duplicate_options_and_questions_are_rejected() {
        let mut question = question_entity("q", 0, 10);
        question.options[1].id = "a".into();
        assert!(matches!(
            QuestionSet::try_from(set_of(vec![question])),
            Err(QuestionSetError::DuplicateOption { .. })
        ));

        assert_eq!(
            QuestionSet::try_from(set_of(vec![
                question_entity("q", 0, 10),
                question_entity("q", 1, 10),
            ]))
            .unwrap_err(),
            QuestionSetError::DuplicateQuestion("q".into())
        );
    }
}
