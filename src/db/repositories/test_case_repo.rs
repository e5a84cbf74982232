//! Test case repository port

use async_trait::async_trait;

use crate::{
    error::StorageResult,
    models::{ExerciseId, TestCase, TestCaseId},
};

/// Storage contract for test cases
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TestCaseRepository: Send + Sync {
    async fn find_by_id(&self, id: TestCaseId) -> StorageResult<Option<TestCase>>;

    async fn save(&self, test_case: TestCase) -> StorageResult<TestCase>;

    async fn delete(&self, id: TestCaseId) -> StorageResult<()>;

    async fn get_exercise_private_test_cases(
        &self,
        exercise_id: ExerciseId,
    ) -> StorageResult<Vec<TestCase>>;

    async fn get_exercise_public_test_cases(
        &self,
        exercise_id: ExerciseId,
    ) -> StorageResult<Vec<TestCase>>;
}
