//! In-process storage adapter
//!
//! Every table sits behind one lock, so each cascade runs as a single
//! critical section and is never observed half done.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    db::repositories::{
        ExamRepository, ExerciseRepository, SolutionRepository, SolutionResultRepository,
        TestCaseRepository,
    },
    error::StorageResult,
    models::{
        Exam, ExamId, Exercise, ExerciseId, ExerciseSolution, ExerciseSolutionResult, SolutionId,
        TestCase, TestCaseId, Visibility,
    },
};

#[derive(Default)]
struct Tables {
    exams: HashMap<ExamId, Exam>,
    exercises: HashMap<ExerciseId, Exercise>,
    test_cases: HashMap<TestCaseId, TestCase>,
    solutions: HashMap<SolutionId, ExerciseSolution>,
    results: HashMap<(SolutionId, TestCaseId), ExerciseSolutionResult>,
    // Insertion order, so listings are stable
    sequence: u64,
    order: HashMap<uuid::Uuid, u64>,
}

impl Tables {
    fn touch(&mut self, id: uuid::Uuid) {
        if !self.order.contains_key(&id) {
            self.sequence += 1;
            self.order.insert(id, self.sequence);
        }
    }

    fn rank(&self, id: &uuid::Uuid) -> u64 {
        self.order.get(id).copied().unwrap_or(u64::MAX)
    }

    fn remove_exercise(&mut self, id: ExerciseId) {
        self.exercises.remove(&id);
        self.order.remove(&id);
        self.remove_exercise_test_cases(id);
    }

    fn remove_exercise_test_cases(&mut self, exercise_id: ExerciseId) {
        let doomed: Vec<TestCaseId> = self
            .test_cases
            .values()
            .filter(|tc| tc.exercise_id == exercise_id)
            .map(|tc| tc.id)
            .collect();
        for id in doomed {
            self.test_cases.remove(&id);
            self.order.remove(&id);
        }
    }

    fn remove_exam_exercises(&mut self, exam_id: ExamId) {
        let doomed: Vec<ExerciseId> = self
            .exercises
            .values()
            .filter(|e| e.exam_id == exam_id)
            .map(|e| e.id)
            .collect();
        for id in doomed {
            self.remove_exercise(id);
        }
    }

    fn exams_where(&self, keep: impl Fn(&Exam) -> bool) -> Vec<Exam> {
        let mut found: Vec<Exam> = self.exams.values().filter(|e| keep(*e)).cloned().collect();
        found.sort_by_key(|e| self.rank(&e.id));
        found
    }

    fn test_cases_of(&self, exercise_id: ExerciseId, visibility: Visibility) -> Vec<TestCase> {
        let mut found: Vec<TestCase> = self
            .test_cases
            .values()
            .filter(|tc| tc.exercise_id == exercise_id && tc.visibility == visibility)
            .cloned()
            .collect();
        found.sort_by_key(|tc| self.rank(&tc.id));
        found
    }
}

/// Storage adapter keeping every entity in memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted verdicts, across all solutions
    pub async fn result_count(&self) -> usize {
        self.tables.read().await.results.len()
    }
}

#[async_trait]
impl ExamRepository for MemoryStore {
    async fn find_by_id(&self, id: ExamId) -> StorageResult<Option<Exam>> {
        Ok(self.tables.read().await.exams.get(&id).cloned())
    }

    async fn find_all(&self) -> StorageResult<Vec<Exam>> {
        Ok(self.tables.read().await.exams_where(|_| true))
    }

    async fn find_by_owner(&self, owner: &str) -> StorageResult<Vec<Exam>> {
        Ok(self
            .tables
            .read()
            .await
            .exams_where(|e| e.owners().contains(owner)))
    }

    async fn save(&self, exam: Exam) -> StorageResult<Exam> {
        let mut tables = self.tables.write().await;
        tables.touch(exam.id);
        tables.exams.insert(exam.id, exam.clone());
        Ok(exam)
    }

    async fn delete_cascade(&self, id: ExamId) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        tables.remove_exam_exercises(id);
        tables.exams.remove(&id);
        tables.order.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ExerciseRepository for MemoryStore {
    async fn find_by_id(&self, id: ExerciseId) -> StorageResult<Option<Exercise>> {
        Ok(self.tables.read().await.exercises.get(&id).cloned())
    }

    async fn save(&self, exercise: Exercise) -> StorageResult<Exercise> {
        let mut tables = self.tables.write().await;
        tables.touch(exercise.id);
        tables.exercises.insert(exercise.id, exercise.clone());
        Ok(exercise)
    }

    async fn delete_cascade(&self, id: ExerciseId) -> StorageResult<()> {
        self.tables.write().await.remove_exercise(id);
        Ok(())
    }

    async fn get_exam_exercises(&self, exam_id: ExamId) -> StorageResult<Vec<Exercise>> {
        let tables = self.tables.read().await;
        let mut found: Vec<Exercise> = tables
            .exercises
            .values()
            .filter(|e| e.exam_id == exam_id)
            .cloned()
            .collect();
        found.sort_by_key(|e| tables.rank(&e.id));
        Ok(found)
    }

    async fn delete_exam_exercises(&self, exam_id: ExamId) -> StorageResult<()> {
        self.tables.write().await.remove_exam_exercises(exam_id);
        Ok(())
    }
}

#[async_trait]
impl TestCaseRepository for MemoryStore {
    async fn find_by_id(&self, id: TestCaseId) -> StorageResult<Option<TestCase>> {
        Ok(self.tables.read().await.test_cases.get(&id).cloned())
    }

    async fn save(&self, test_case: TestCase) -> StorageResult<TestCase> {
        let mut tables = self.tables.write().await;
        tables.touch(test_case.id);
        tables.test_cases.insert(test_case.id, test_case.clone());
        Ok(test_case)
    }

    async fn delete(&self, id: TestCaseId) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        tables.test_cases.remove(&id);
        tables.order.remove(&id);
        Ok(())
    }

    async fn get_exercise_private_test_cases(
        &self,
        exercise_id: ExerciseId,
    ) -> StorageResult<Vec<TestCase>> {
        Ok(self
            .tables
            .read()
            .await
            .test_cases_of(exercise_id, Visibility::Private))
    }

    async fn get_exercise_public_test_cases(
        &self,
        exercise_id: ExerciseId,
    ) -> StorageResult<Vec<TestCase>> {
        Ok(self
            .tables
            .read()
            .await
            .test_cases_of(exercise_id, Visibility::Public))
    }
}

#[async_trait]
impl SolutionRepository for MemoryStore {
    async fn find_by_id(&self, id: SolutionId) -> StorageResult<Option<ExerciseSolution>> {
        Ok(self.tables.read().await.solutions.get(&id).cloned())
    }

    async fn save(&self, solution: ExerciseSolution) -> StorageResult<ExerciseSolution> {
        let mut tables = self.tables.write().await;
        tables.touch(solution.id);
        tables.solutions.insert(solution.id, solution.clone());
        Ok(solution)
    }

    async fn get_exercise_solutions(
        &self,
        exercise_id: ExerciseId,
    ) -> StorageResult<Vec<ExerciseSolution>> {
        let tables = self.tables.read().await;
        let mut found: Vec<ExerciseSolution> = tables
            .solutions
            .values()
            .filter(|s| s.exercise_id == exercise_id)
            .cloned()
            .collect();
        found.sort_by_key(|s| tables.rank(&s.id));
        Ok(found)
    }
}

#[async_trait]
impl SolutionResultRepository for MemoryStore {
    async fn save_if_absent(&self, result: ExerciseSolutionResult) -> StorageResult<bool> {
        let mut tables = self.tables.write().await;
        let key = (result.solution_id, result.test_case_id);
        if tables.results.contains_key(&key) {
            return Ok(false);
        }
        tables.touch(result.id);
        tables.results.insert(key, result);
        Ok(true)
    }

    async fn get_solution_results(
        &self,
        solution_id: SolutionId,
    ) -> StorageResult<Vec<ExerciseSolutionResult>> {
        let tables = self.tables.read().await;
        let mut found: Vec<ExerciseSolutionResult> = tables
            .results
            .values()
            .filter(|r| r.solution_id == solution_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| tables.rank(&r.id));
        Ok(found)
    }
}
