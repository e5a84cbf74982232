//! Exercise model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::{
    constants::MAX_AWARDED_SCORE,
    models::ExamId,
    utils::validation::validate_language,
};

/// Exercise ID type
pub type ExerciseId = Uuid;

/// Exercise creation / modification payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ExercisePayload {
    #[validate(length(min = 1))]
    pub question: String,

    /// Language the answer must be written in
    #[validate(custom(function = "validate_language"))]
    pub language: String,

    /// Code handed to the student as a starting point
    pub solution_template: Option<String>,

    #[validate(range(min = 1, max = MAX_AWARDED_SCORE))]
    pub awarded_score: i32,
}

/// Exercise domain model, exclusively owned by one exam
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Exercise {
    pub id: ExerciseId,
    pub exam_id: ExamId,
    pub question: String,
    pub language: String,
    pub solution_template: Option<String>,
    pub awarded_score: i32,
}

impl Exercise {
    pub fn new(exam_id: ExamId, payload: ExercisePayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            exam_id,
            question: payload.question,
            language: payload.language,
            solution_template: payload.solution_template,
            awarded_score: payload.awarded_score,
        }
    }

    /// Replace the mutable fields. The owning exam never changes.
    pub fn update(&mut self, payload: ExercisePayload) {
        self.question = payload.question;
        self.language = payload.language;
        self.solution_template = payload.solution_template;
        self.awarded_score = payload.awarded_score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ExercisePayload {
        ExercisePayload {
            question: "Reverse a linked list".to_string(),
            language: "java".to_string(),
            solution_template: Some("class Solution {}".to_string()),
            awarded_score: 10,
        }
    }

    #[test]
    fn test_update_keeps_owner() {
        let exam_id = Uuid::new_v4();
        let mut exercise = Exercise::new(exam_id, payload());
        let id = exercise.id;

        exercise.update(ExercisePayload {
            question: "Sort an array".to_string(),
            language: "python".to_string(),
            solution_template: None,
            awarded_score: 20,
        });

        assert_eq!(exercise.id, id);
        assert_eq!(exercise.exam_id, exam_id);
        assert_eq!(exercise.language, "python");
        assert_eq!(exercise.awarded_score, 20);
        assert!(exercise.solution_template.is_none());
    }

    #[test]
    fn test_payload_validation() {
        assert!(payload().validate().is_ok());

        let mut unknown_language = payload();
        unknown_language.language = "cobol".to_string();
        assert!(unknown_language.validate().is_err());

        let mut zero_score = payload();
        zero_score.awarded_score = 0;
        assert!(zero_score.validate().is_err());

        let mut no_question = payload();
        no_question.question = String::new();
        assert!(no_question.validate().is_err());
    }
}
