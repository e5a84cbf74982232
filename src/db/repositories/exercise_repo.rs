//! Exercise repository port

use async_trait::async_trait;

use crate::{
    error::StorageResult,
    models::{ExamId, Exercise, ExerciseId},
};

/// Storage contract for exercises
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExerciseRepository: Send + Sync {
    async fn find_by_id(&self, id: ExerciseId) -> StorageResult<Option<Exercise>>;

    async fn save(&self, exercise: Exercise) -> StorageResult<Exercise>;

    /// Delete an exercise and its test cases atomically
    async fn delete_cascade(&self, id: ExerciseId) -> StorageResult<()>;

    /// All exercises owned by an exam
    async fn get_exam_exercises(&self, exam_id: ExamId) -> StorageResult<Vec<Exercise>>;

    /// Delete every exercise of an exam, and their test cases, atomically
    async fn delete_exam_exercises(&self, exam_id: ExamId) -> StorageResult<()>;
}
