//! Exercise solution and solution result repository ports

use async_trait::async_trait;

use crate::{
    error::StorageResult,
    models::{ExerciseId, ExerciseSolution, ExerciseSolutionResult, SolutionId},
};

/// Storage contract for submitted solutions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SolutionRepository: Send + Sync {
    async fn find_by_id(&self, id: SolutionId) -> StorageResult<Option<ExerciseSolution>>;

    async fn save(&self, solution: ExerciseSolution) -> StorageResult<ExerciseSolution>;

    /// Solutions of an exercise, oldest first
    async fn get_exercise_solutions(
        &self,
        exercise_id: ExerciseId,
    ) -> StorageResult<Vec<ExerciseSolution>>;
}

/// Storage contract for grading verdicts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SolutionResultRepository: Send + Sync {
    /// Insert unless a result for the same (solution, test case) exists.
    /// Returns whether the row was written; the check and the insert are one
    /// atomic step.
    async fn save_if_absent(&self, result: ExerciseSolutionResult) -> StorageResult<bool>;

    async fn get_solution_results(
        &self,
        solution_id: SolutionId,
    ) -> StorageResult<Vec<ExerciseSolutionResult>>;
}
