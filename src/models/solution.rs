//! Exercise solution and grading result models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::{
    constants::MAX_ANSWER_SIZE,
    models::{ExerciseId, TestCaseId},
};

/// Exercise solution ID type
pub type SolutionId = Uuid;

/// Solution submission payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SolutionPayload {
    /// The submitted code
    #[validate(length(min = 1, max = MAX_ANSWER_SIZE))]
    pub answer: String,

    #[validate(length(max = 256))]
    pub compiler_flags: Option<String>,
}

/// A student's answer to an exercise. Never edited after creation;
/// a resubmission is a new solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExerciseSolution {
    pub id: SolutionId,
    pub exercise_id: ExerciseId,
    pub answer: String,
    pub compiler_flags: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl ExerciseSolution {
    pub fn new(exercise_id: ExerciseId, payload: SolutionPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            exercise_id,
            answer: payload.answer,
            compiler_flags: payload.compiler_flags,
            submitted_at: Utc::now(),
        }
    }
}

/// Verdict of grading one solution against one test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Output matched, nothing on stderr, exit code zero
    Approved,
    /// Ran to completion but did not produce the expected result
    Failed,
    /// Killed by the executor's timeout
    TimedOut,
    /// Compilation failed
    NotCompiled,
    UnknownError,
}

impl Verdict {
    /// Get verdict as its stored string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMED_OUT",
            Self::NotCompiled => "NOT_COMPILED",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Parse verdict from its stored string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "APPROVED" => Some(Self::Approved),
            "FAILED" => Some(Self::Failed),
            "TIMED_OUT" => Some(Self::TimedOut),
            "NOT_COMPILED" => Some(Self::NotCompiled),
            "UNKNOWN_ERROR" => Some(Self::UnknownError),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted verdict for one (solution, test case) pair. Never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSolutionResult {
    pub id: Uuid,
    pub solution_id: SolutionId,
    pub test_case_id: TestCaseId,
    pub verdict: Verdict,
    /// Captured stderr or compiler output
    pub diagnostic: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExerciseSolutionResult {
    pub fn new(
        solution_id: SolutionId,
        test_case_id: TestCaseId,
        verdict: Verdict,
        diagnostic: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            solution_id,
            test_case_id,
            verdict,
            diagnostic,
            created_at: Utc::now(),
        }
    }
}
