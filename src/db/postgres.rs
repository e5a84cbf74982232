//! PostgreSQL storage adapter

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    db::repositories::{
        ExamRepository, ExerciseRepository, SolutionRepository, SolutionResultRepository,
        TestCaseRepository,
    },
    error::{StorageError, StorageResult},
    models::{
        Exam, ExamId, ExamState, Exercise, ExerciseId, ExerciseSolution, ExerciseSolutionResult,
        SolutionId, TestCase, TestCaseId, Verdict, Visibility,
    },
};

#[derive(FromRow)]
struct ExamRow {
    id: Uuid,
    description: String,
    starting_at: DateTime<Utc>,
    duration_minutes: i64,
    state: String,
    owners: Vec<String>,
}

impl TryFrom<ExamRow> for Exam {
    type Error = StorageError;

    fn try_from(row: ExamRow) -> Result<Self, Self::Error> {
        let state = ExamState::parse(&row.state).ok_or_else(|| {
            StorageError::Corrupted(format!("exam {} has state {}", row.id, row.state))
        })?;
        Ok(Exam::restore(
            row.id,
            row.description,
            row.starting_at,
            row.duration_minutes,
            state,
            row.owners,
        ))
    }
}

#[derive(FromRow)]
struct TestCaseRow {
    id: Uuid,
    exercise_id: Uuid,
    visibility: String,
    timeout_ms: i64,
    inputs: Vec<String>,
    expected_outputs: Vec<String>,
    program_arguments: Option<Vec<String>>,
    stdin: Option<Vec<String>>,
}

impl TryFrom<TestCaseRow> for TestCase {
    type Error = StorageError;

    fn try_from(row: TestCaseRow) -> Result<Self, Self::Error> {
        let visibility = Visibility::parse(&row.visibility).ok_or_else(|| {
            StorageError::Corrupted(format!(
                "test case {} has visibility {}",
                row.id, row.visibility
            ))
        })?;
        Ok(TestCase {
            id: row.id,
            exercise_id: row.exercise_id,
            visibility,
            timeout_ms: row.timeout_ms,
            inputs: row.inputs,
            expected_outputs: row.expected_outputs,
            program_arguments: row.program_arguments,
            stdin: row.stdin,
        })
    }
}

#[derive(FromRow)]
struct ResultRow {
    id: Uuid,
    solution_id: Uuid,
    test_case_id: Uuid,
    verdict: String,
    diagnostic: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ResultRow> for ExerciseSolutionResult {
    type Error = StorageError;

    fn try_from(row: ResultRow) -> Result<Self, Self::Error> {
        let verdict = Verdict::parse(&row.verdict).ok_or_else(|| {
            StorageError::Corrupted(format!("result {} has verdict {}", row.id, row.verdict))
        })?;
        Ok(ExerciseSolutionResult {
            id: row.id,
            solution_id: row.solution_id,
            test_case_id: row.test_case_id,
            verdict,
            diagnostic: row.diagnostic,
            created_at: row.created_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StorageResult<Vec<T>>
where
    T: TryFrom<R, Error = StorageError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Storage adapter backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExamRepository for PgStore {
    async fn find_by_id(&self, id: ExamId) -> StorageResult<Option<Exam>> {
        let row = sqlx::query_as::<_, ExamRow>(
            r#"
            SELECT id, description, starting_at, duration_minutes, state, owners
            FROM exams WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Exam::try_from).transpose()
    }

    async fn find_all(&self) -> StorageResult<Vec<Exam>> {
        let rows = sqlx::query_as::<_, ExamRow>(
            r#"
            SELECT id, description, starting_at, duration_minutes, state, owners
            FROM exams
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn find_by_owner(&self, owner: &str) -> StorageResult<Vec<Exam>> {
        let rows = sqlx::query_as::<_, ExamRow>(
            r#"
            SELECT id, description, starting_at, duration_minutes, state, owners
            FROM exams
            WHERE owners @> ARRAY[$1]
            ORDER BY created_at
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn save(&self, exam: Exam) -> StorageResult<Exam> {
        let owners: Vec<String> = exam.owners().iter().cloned().collect();

        sqlx::query(
            r#"
            INSERT INTO exams (id, description, starting_at, duration_minutes, state, owners)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                description = EXCLUDED.description,
                starting_at = EXCLUDED.starting_at,
                duration_minutes = EXCLUDED.duration_minutes,
                state = EXCLUDED.state,
                owners = EXCLUDED.owners
            "#,
        )
        .bind(exam.id)
        .bind(&exam.description)
        .bind(exam.starting_at)
        .bind(exam.duration_minutes)
        .bind(exam.state().as_str())
        .bind(&owners)
        .execute(&self.pool)
        .await?;

        Ok(exam)
    }

    async fn delete_cascade(&self, id: ExamId) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM test_cases
            WHERE exercise_id IN (SELECT id FROM exercises WHERE exam_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM exercises WHERE exam_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM exams WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ExerciseRepository for PgStore {
    async fn find_by_id(&self, id: ExerciseId) -> StorageResult<Option<Exercise>> {
        let exercise = sqlx::query_as::<_, Exercise>(
            r#"
            SELECT id, exam_id, question, language, solution_template, awarded_score
            FROM exercises WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(exercise)
    }

    async fn save(&self, exercise: Exercise) -> StorageResult<Exercise> {
        sqlx::query(
            r#"
            INSERT INTO exercises (id, exam_id, question, language, solution_template, awarded_score)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                question = EXCLUDED.question,
                language = EXCLUDED.language,
                solution_template = EXCLUDED.solution_template,
                awarded_score = EXCLUDED.awarded_score
            "#,
        )
        .bind(exercise.id)
        .bind(exercise.exam_id)
        .bind(&exercise.question)
        .bind(&exercise.language)
        .bind(&exercise.solution_template)
        .bind(exercise.awarded_score)
        .execute(&self.pool)
        .await?;

        Ok(exercise)
    }

    async fn delete_cascade(&self, id: ExerciseId) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM test_cases WHERE exercise_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM exercises WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_exam_exercises(&self, exam_id: ExamId) -> StorageResult<Vec<Exercise>> {
        let exercises = sqlx::query_as::<_, Exercise>(
            r#"
            SELECT id, exam_id, question, language, solution_template, awarded_score
            FROM exercises WHERE exam_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(exercises)
    }

    async fn delete_exam_exercises(&self, exam_id: ExamId) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM test_cases
            WHERE exercise_id IN (SELECT id FROM exercises WHERE exam_id = $1)
            "#,
        )
        .bind(exam_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM exercises WHERE exam_id = $1")
            .bind(exam_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

impl PgStore {
    async fn test_cases_by_visibility(
        &self,
        exercise_id: ExerciseId,
        visibility: Visibility,
    ) -> StorageResult<Vec<TestCase>> {
        let rows = sqlx::query_as::<_, TestCaseRow>(
            r#"
            SELECT id, exercise_id, visibility, timeout_ms, inputs, expected_outputs,
                   program_arguments, stdin
            FROM test_cases
            WHERE exercise_id = $1 AND visibility = $2
            ORDER BY created_at
            "#,
        )
        .bind(exercise_id)
        .bind(visibility.as_str())
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }
}

#[async_trait]
impl TestCaseRepository for PgStore {
    async fn find_by_id(&self, id: TestCaseId) -> StorageResult<Option<TestCase>> {
        let row = sqlx::query_as::<_, TestCaseRow>(
            r#"
            SELECT id, exercise_id, visibility, timeout_ms, inputs, expected_outputs,
                   program_arguments, stdin
            FROM test_cases WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TestCase::try_from).transpose()
    }

    async fn save(&self, test_case: TestCase) -> StorageResult<TestCase> {
        sqlx::query(
            r#"
            INSERT INTO test_cases (
                id, exercise_id, visibility, timeout_ms, inputs, expected_outputs,
                program_arguments, stdin
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                visibility = EXCLUDED.visibility,
                timeout_ms = EXCLUDED.timeout_ms,
                inputs = EXCLUDED.inputs,
                expected_outputs = EXCLUDED.expected_outputs,
                program_arguments = EXCLUDED.program_arguments,
                stdin = EXCLUDED.stdin
            "#,
        )
        .bind(test_case.id)
        .bind(test_case.exercise_id)
        .bind(test_case.visibility.as_str())
        .bind(test_case.timeout_ms)
        .bind(&test_case.inputs)
        .bind(&test_case.expected_outputs)
        .bind(&test_case.program_arguments)
        .bind(&test_case.stdin)
        .execute(&self.pool)
        .await?;

        Ok(test_case)
    }

    async fn delete(&self, id: TestCaseId) -> StorageResult<()> {
        sqlx::query("DELETE FROM test_cases WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_exercise_private_test_cases(
        &self,
        exercise_id: ExerciseId,
    ) -> StorageResult<Vec<TestCase>> {
        self.test_cases_by_visibility(exercise_id, Visibility::Private)
            .await
    }

    async fn get_exercise_public_test_cases(
        &self,
        exercise_id: ExerciseId,
    ) -> StorageResult<Vec<TestCase>> {
        self.test_cases_by_visibility(exercise_id, Visibility::Public)
            .await
    }
}

#[async_trait]
impl SolutionRepository for PgStore {
    async fn find_by_id(&self, id: SolutionId) -> StorageResult<Option<ExerciseSolution>> {
        let solution = sqlx::query_as::<_, ExerciseSolution>(
            r#"
            SELECT id, exercise_id, answer, compiler_flags, submitted_at
            FROM exercise_solutions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(solution)
    }

    async fn save(&self, solution: ExerciseSolution) -> StorageResult<ExerciseSolution> {
        sqlx::query(
            r#"
            INSERT INTO exercise_solutions (id, exercise_id, answer, compiler_flags, submitted_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(solution.id)
        .bind(solution.exercise_id)
        .bind(&solution.answer)
        .bind(&solution.compiler_flags)
        .bind(solution.submitted_at)
        .execute(&self.pool)
        .await?;

        Ok(solution)
    }

    async fn get_exercise_solutions(
        &self,
        exercise_id: ExerciseId,
    ) -> StorageResult<Vec<ExerciseSolution>> {
        let solutions = sqlx::query_as::<_, ExerciseSolution>(
            r#"
            SELECT id, exercise_id, answer, compiler_flags, submitted_at
            FROM exercise_solutions WHERE exercise_id = $1
            ORDER BY submitted_at
            "#,
        )
        .bind(exercise_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(solutions)
    }
}

#[async_trait]
impl SolutionResultRepository for PgStore {
    async fn save_if_absent(&self, result: ExerciseSolutionResult) -> StorageResult<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO exercise_solution_results (
                id, solution_id, test_case_id, verdict, diagnostic, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (solution_id, test_case_id) DO NOTHING
            "#,
        )
        .bind(result.id)
        .bind(result.solution_id)
        .bind(result.test_case_id)
        .bind(result.verdict.as_str())
        .bind(&result.diagnostic)
        .bind(result.created_at)
        .execute(&self.pool)
        .await?;

        Ok(inserted.rows_affected() == 1)
    }

    async fn get_solution_results(
        &self,
        solution_id: SolutionId,
    ) -> StorageResult<Vec<ExerciseSolutionResult>> {
        let rows = sqlx::query_as::<_, ResultRow>(
            r#"
            SELECT id, solution_id, test_case_id, verdict, diagnostic, created_at
            FROM exercise_solution_results
            WHERE solution_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(solution_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }
}
