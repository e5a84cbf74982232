//! Exam lifecycle service
//!
//! Every mutation of an exam or of anything it owns is gated by the exam
//! state. Gates are checked, and payloads validated, before any write.

use std::sync::Arc;

use serde::Serialize;
use validator::Validate;

use crate::{
    db::repositories::{
        ExamRepository, ExerciseRepository, SolutionRepository, SolutionResultRepository,
        TestCaseRepository,
    },
    error::{AppError, AppResult},
    models::{
        Exam, ExamId, ExamPayload, Exercise, ExerciseId, ExercisePayload, ExerciseSolution,
        ExerciseSolutionResult, SolutionId, SolutionPayload, TestCase, TestCaseId,
        TestCasePayload,
    },
    services::DispatchService,
    utils::validate_owner,
};

/// Exam together with the sum of its exercises' awarded scores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamWithScore {
    #[serde(flatten)]
    pub exam: Exam,
    pub total_score: i64,
}

/// Storage ports used by [`ExamService`]
#[derive(Clone)]
pub struct ExamRepositories {
    pub exams: Arc<dyn ExamRepository>,
    pub exercises: Arc<dyn ExerciseRepository>,
    pub test_cases: Arc<dyn TestCaseRepository>,
    pub solutions: Arc<dyn SolutionRepository>,
    pub results: Arc<dyn SolutionResultRepository>,
}

/// Exam lifecycle manager
pub struct ExamService {
    repos: ExamRepositories,
    dispatcher: Arc<DispatchService>,
}

impl ExamService {
    pub fn new(repos: ExamRepositories, dispatcher: Arc<DispatchService>) -> Self {
        Self { repos, dispatcher }
    }

    // =========================================================================
    // Exams
    // =========================================================================

    /// Create a new exam in the upcoming state
    pub async fn create_exam(&self, payload: ExamPayload) -> AppResult<Exam> {
        payload.validate()?;

        let exam = self.repos.exams.save(Exam::new(payload)).await?;
        tracing::info!(exam_id = %exam.id, starting_at = %exam.starting_at, "Exam created");

        Ok(exam)
    }

    /// Get exam by ID
    pub async fn get_exam(&self, id: ExamId) -> AppResult<Exam> {
        self.load_exam(id).await
    }

    /// Every exam, oldest first
    pub async fn list_exams(&self) -> AppResult<Vec<Exam>> {
        Ok(self.repos.exams.find_all().await?)
    }

    /// Exams the given owner is listed on
    pub async fn list_owned_exams(&self, owner: &str) -> AppResult<Vec<Exam>> {
        validate_owner(owner).map_err(|e| AppError::Validation(e.to_string()))?;
        Ok(self.repos.exams.find_by_owner(owner).await?)
    }

    /// Exam plus the total score its exercises award
    pub async fn get_exam_score(&self, id: ExamId) -> AppResult<ExamWithScore> {
        let exam = self.load_exam(id).await?;
        let total_score = self
            .repos
            .exercises
            .get_exam_exercises(id)
            .await?
            .iter()
            .map(|e| i64::from(e.awarded_score))
            .sum();

        Ok(ExamWithScore { exam, total_score })
    }

    /// Replace description, start and duration of an upcoming exam
    pub async fn modify_exam(&self, id: ExamId, payload: ExamPayload) -> AppResult<Exam> {
        let mut exam = self.load_exam(id).await?;
        exam.ensure_upcoming()?;

        payload.validate()?;
        exam.update(payload)?;

        Ok(self.repos.exams.save(exam).await?)
    }

    pub async fn start_exam(&self, id: ExamId) -> AppResult<Exam> {
        let mut exam = self.load_exam(id).await?;
        exam.start()?;

        let exam = self.repos.exams.save(exam).await?;
        tracing::info!(exam_id = %id, ends_at = %exam.ends_at(), "Exam started");

        Ok(exam)
    }

    pub async fn finish_exam(&self, id: ExamId) -> AppResult<Exam> {
        let mut exam = self.load_exam(id).await?;
        exam.finish()?;

        let exam = self.repos.exams.save(exam).await?;
        tracing::info!(exam_id = %id, state = %exam.state(), "Exam finished");

        Ok(exam)
    }

    /// Delete an upcoming exam with its exercises and test cases
    pub async fn delete_exam(&self, id: ExamId) -> AppResult<()> {
        let exam = self.load_exam(id).await?;
        exam.ensure_upcoming()?;

        self.repos.exams.delete_cascade(id).await?;
        tracing::info!(exam_id = %id, "Exam deleted");

        Ok(())
    }

    pub async fn add_owner(&self, id: ExamId, owner: &str) -> AppResult<Exam> {
        validate_owner(owner).map_err(|e| AppError::Validation(e.to_string()))?;

        let mut exam = self.load_exam(id).await?;
        if !exam.add_owner(owner)? {
            return Ok(exam);
        }

        tracing::debug!(exam_id = %id, owner, "Owner added");
        Ok(self.repos.exams.save(exam).await?)
    }

    pub async fn remove_owner(&self, id: ExamId, owner: &str) -> AppResult<Exam> {
        let mut exam = self.load_exam(id).await?;
        if !exam.remove_owner(owner)? {
            return Ok(exam);
        }

        tracing::debug!(exam_id = %id, owner, "Owner removed");
        Ok(self.repos.exams.save(exam).await?)
    }

    // =========================================================================
    // Exercises
    // =========================================================================

    pub async fn get_exercise(&self, id: ExerciseId) -> AppResult<Exercise> {
        self.load_exercise(id).await
    }

    pub async fn get_exercises(&self, exam_id: ExamId) -> AppResult<Vec<Exercise>> {
        self.load_exam(exam_id).await?;
        Ok(self.repos.exercises.get_exam_exercises(exam_id).await?)
    }

    /// Remove every exercise of an upcoming exam
    pub async fn clear_exercises(&self, exam_id: ExamId) -> AppResult<()> {
        let exam = self.load_exam(exam_id).await?;
        exam.ensure_upcoming()?;

        self.repos.exercises.delete_exam_exercises(exam_id).await?;
        tracing::info!(exam_id = %exam_id, "Exam exercises cleared");

        Ok(())
    }

    pub async fn create_exercise(
        &self,
        exam_id: ExamId,
        payload: ExercisePayload,
    ) -> AppResult<Exercise> {
        payload.validate()?;

        let exam = self.load_exam(exam_id).await?;
        exam.ensure_upcoming()?;

        let exercise = self
            .repos
            .exercises
            .save(Exercise::new(exam_id, payload))
            .await?;
        tracing::info!(exam_id = %exam_id, exercise_id = %exercise.id, "Exercise created");

        Ok(exercise)
    }

    pub async fn modify_exercise(
        &self,
        id: ExerciseId,
        payload: ExercisePayload,
    ) -> AppResult<Exercise> {
        payload.validate()?;

        let mut exercise = self.load_exercise(id).await?;
        self.load_exam(exercise.exam_id).await?.ensure_upcoming()?;

        exercise.update(payload);
        Ok(self.repos.exercises.save(exercise).await?)
    }

    /// Delete an exercise together with its test cases
    pub async fn delete_exercise(&self, id: ExerciseId) -> AppResult<()> {
        let exercise = self.load_exercise(id).await?;
        self.load_exam(exercise.exam_id).await?.ensure_upcoming()?;

        self.repos.exercises.delete_cascade(id).await?;
        tracing::info!(exercise_id = %id, "Exercise deleted");

        Ok(())
    }

    // =========================================================================
    // Test cases
    // =========================================================================

    pub async fn get_private_test_cases(&self, exercise_id: ExerciseId) -> AppResult<Vec<TestCase>> {
        self.load_exercise(exercise_id).await?;
        Ok(self
            .repos
            .test_cases
            .get_exercise_private_test_cases(exercise_id)
            .await?)
    }

    pub async fn get_public_test_cases(&self, exercise_id: ExerciseId) -> AppResult<Vec<TestCase>> {
        self.load_exercise(exercise_id).await?;
        Ok(self
            .repos
            .test_cases
            .get_exercise_public_test_cases(exercise_id)
            .await?)
    }

    pub async fn create_test_case(
        &self,
        exercise_id: ExerciseId,
        payload: TestCasePayload,
    ) -> AppResult<TestCase> {
        payload.validate()?;

        let exercise = self.load_exercise(exercise_id).await?;
        self.load_exam(exercise.exam_id).await?.ensure_upcoming()?;

        let test_case = self
            .repos
            .test_cases
            .save(TestCase::new(exercise_id, payload))
            .await?;
        tracing::debug!(
            exercise_id = %exercise_id,
            test_case_id = %test_case.id,
            visibility = %test_case.visibility,
            "Test case created"
        );

        Ok(test_case)
    }

    pub async fn modify_test_case(
        &self,
        id: TestCaseId,
        payload: TestCasePayload,
    ) -> AppResult<TestCase> {
        payload.validate()?;

        let mut test_case = self.load_test_case(id).await?;
        self.exam_of_exercise(test_case.exercise_id)
            .await?
            .ensure_upcoming()?;

        test_case.update(payload);
        Ok(self.repos.test_cases.save(test_case).await?)
    }

    pub async fn delete_test_case(&self, id: TestCaseId) -> AppResult<()> {
        let test_case = self.load_test_case(id).await?;
        self.exam_of_exercise(test_case.exercise_id)
            .await?
            .ensure_upcoming()?;

        self.repos.test_cases.delete(id).await?;
        Ok(())
    }

    // =========================================================================
    // Solutions
    // =========================================================================

    /// Submit a solution and request one execution per test case.
    ///
    /// The solution is kept even if some dispatches fail; the error then
    /// names the solution and every test case that could not be sent.
    pub async fn create_exercise_solution(
        &self,
        exercise_id: ExerciseId,
        payload: SolutionPayload,
    ) -> AppResult<ExerciseSolution> {
        payload.validate()?;

        let exercise = self.load_exercise(exercise_id).await?;
        self.load_exam(exercise.exam_id)
            .await?
            .ensure_in_progress()?;

        let solution = self
            .repos
            .solutions
            .save(ExerciseSolution::new(exercise_id, payload))
            .await?;
        tracing::info!(
            exercise_id = %exercise_id,
            solution_id = %solution.id,
            "Exercise solution submitted"
        );

        let mut test_cases = self
            .repos
            .test_cases
            .get_exercise_private_test_cases(exercise_id)
            .await?;
        test_cases.extend(
            self.repos
                .test_cases
                .get_exercise_public_test_cases(exercise_id)
                .await?,
        );

        let mut failed = Vec::new();
        for test_case in &test_cases {
            if self
                .dispatcher
                .dispatch(&solution, test_case, &exercise)
                .await
                .is_err()
            {
                failed.push(test_case.id.to_string());
            }
        }

        if !failed.is_empty() {
            tracing::error!(
                solution_id = %solution.id,
                failed = failed.len(),
                total = test_cases.len(),
                "Execution dispatch incomplete"
            );
            return Err(AppError::Dispatch(format!(
                "Solution {} saved but execution could not be requested for test cases [{}]",
                solution.id,
                failed.join(", ")
            )));
        }

        Ok(solution)
    }

    pub async fn list_solutions(&self, exercise_id: ExerciseId) -> AppResult<Vec<ExerciseSolution>> {
        self.load_exercise(exercise_id).await?;
        Ok(self
            .repos
            .solutions
            .get_exercise_solutions(exercise_id)
            .await?)
    }

    pub async fn get_exercise_solution(&self, id: SolutionId) -> AppResult<ExerciseSolution> {
        self.repos
            .solutions
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::solution_not_found(id))
    }

    /// Verdicts recorded so far for a solution
    pub async fn get_solution_results(
        &self,
        solution_id: SolutionId,
    ) -> AppResult<Vec<ExerciseSolutionResult>> {
        self.get_exercise_solution(solution_id).await?;
        Ok(self.repos.results.get_solution_results(solution_id).await?)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    async fn load_exam(&self, id: ExamId) -> AppResult<Exam> {
        self.repos
            .exams
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::exam_not_found(id))
    }

    async fn load_exercise(&self, id: ExerciseId) -> AppResult<Exercise> {
        self.repos
            .exercises
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::exercise_not_found(id))
    }

    async fn load_test_case(&self, id: TestCaseId) -> AppResult<TestCase> {
        self.repos
            .test_cases
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::test_case_not_found(id))
    }

    async fn exam_of_exercise(&self, exercise_id: ExerciseId) -> AppResult<Exam> {
        let exercise = self.load_exercise(exercise_id).await?;
        self.load_exam(exercise.exam_id).await
    }
}
