//! Exam repository port

use async_trait::async_trait;

use crate::{
    error::StorageResult,
    models::{Exam, ExamId},
};

/// Storage contract for exams
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExamRepository: Send + Sync {
    /// Find exam by ID
    async fn find_by_id(&self, id: ExamId) -> StorageResult<Option<Exam>>;

    /// Every exam, oldest first
    async fn find_all(&self) -> StorageResult<Vec<Exam>>;

    /// Exams listing `owner` among their owners, oldest first
    async fn find_by_owner(&self, owner: &str) -> StorageResult<Vec<Exam>>;

    /// Insert or replace an exam
    async fn save(&self, exam: Exam) -> StorageResult<Exam>;

    /// Delete an exam together with its exercises and their test cases.
    /// Either everything is removed or nothing is.
    async fn delete_cascade(&self, id: ExamId) -> StorageResult<()>;
}
