//! Repository ports
//!
//! Storage-agnostic contracts consumed by the services. Adapters live in
//! [`crate::db::memory`] and [`crate::db::postgres`].

pub mod exam_repo;
pub mod exercise_repo;
pub mod solution_repo;
pub mod test_case_repo;

pub use exam_repo::ExamRepository;
pub use exercise_repo::ExerciseRepository;
pub use solution_repo::{SolutionRepository, SolutionResultRepository};
pub use test_case_repo::TestCaseRepository;

#[cfg(test)]
pub use exam_repo::MockExamRepository;
#[cfg(test)]
pub use exercise_repo::MockExerciseRepository;
#[cfg(test)]
pub use solution_repo::{MockSolutionRepository, MockSolutionResultRepository};
#[cfg(test)]
pub use test_case_repo::MockTestCaseRepository;
