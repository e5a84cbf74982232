//! Result correlation and grading
//!
//! Outcomes arrive asynchronously, in any order, tagged with the correlation
//! token of the request that produced them. The service keeps no state of its
//! own between calls: the token plus the persisted entities are enough to
//! grade, so ingestion can resume after a restart.

use std::sync::Arc;

use crate::{
    db::repositories::{SolutionRepository, SolutionResultRepository, TestCaseRepository},
    error::{AppError, AppResult},
    events::{DomainEvent, EventPublisher},
    execution::{CorrelationToken, ExecutionOutcome},
    models::{ExerciseSolutionResult, TestCase, Verdict},
};

/// Classify an outcome against the test case it ran for.
///
/// Returns `None` for infrastructure faults: the program never reached a
/// terminal state of its own, so there is nothing to grade.
pub fn grade(outcome: &ExecutionOutcome, test_case: &TestCase) -> Option<(Verdict, Option<String>)> {
    let graded = match outcome {
        ExecutionOutcome::InitializationError { .. } | ExecutionOutcome::UnknownError { .. } => {
            return None;
        }
        ExecutionOutcome::CompileError { compiler_errors } => {
            (Verdict::NotCompiled, join_lines(compiler_errors))
        }
        ExecutionOutcome::TimedOut => (Verdict::TimedOut, None),
        ExecutionOutcome::Finished {
            exit_code, stderr, ..
        } if *exit_code != 0 => (Verdict::Failed, join_lines(stderr)),
        ExecutionOutcome::Finished { stderr, .. } if !stderr.is_empty() => {
            (Verdict::Failed, join_lines(stderr))
        }
        ExecutionOutcome::Finished { stdout, .. } if test_case.matches_expected(stdout) => {
            (Verdict::Approved, None)
        }
        ExecutionOutcome::Finished { .. } => (Verdict::Failed, None),
    };

    Some(graded)
}

fn join_lines(lines: &[String]) -> Option<String> {
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Resolves outcomes back to (solution, test case) and records verdicts
pub struct GradingService {
    solutions: Arc<dyn SolutionRepository>,
    test_cases: Arc<dyn TestCaseRepository>,
    results: Arc<dyn SolutionResultRepository>,
    events: Arc<dyn EventPublisher>,
}

impl GradingService {
    pub fn new(
        solutions: Arc<dyn SolutionRepository>,
        test_cases: Arc<dyn TestCaseRepository>,
        results: Arc<dyn SolutionResultRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            solutions,
            test_cases,
            results,
            events,
        }
    }

    /// Ingest one execution outcome.
    ///
    /// Returns the persisted result, or `None` when nothing was written:
    /// either the outcome was an infrastructure fault or a result for the
    /// same token already exists (first write wins).
    pub async fn process_execution(
        &self,
        token: CorrelationToken,
        outcome: ExecutionOutcome,
    ) -> AppResult<Option<ExerciseSolutionResult>> {
        self.events.publish(DomainEvent::ExecutionOutcomeArrived {
            token,
            kind: outcome.kind().to_string(),
        });

        let (solution, test_case) = futures::try_join!(
            self.solutions.find_by_id(token.solution_id()),
            self.test_cases.find_by_id(token.test_case_id()),
        )?;
        let solution = solution.ok_or_else(|| AppError::solution_not_found(token.solution_id()))?;
        let test_case =
            test_case.ok_or_else(|| AppError::test_case_not_found(token.test_case_id()))?;

        if test_case.exercise_id != solution.exercise_id {
            return Err(AppError::Validation(format!(
                "Test case {} does not belong to the exercise of solution {}",
                test_case.id, solution.id
            )));
        }

        let Some((verdict, diagnostic)) = grade(&outcome, &test_case) else {
            let reason = outcome
                .fault_message()
                .unwrap_or(outcome.kind())
                .to_string();
            tracing::warn!(
                token = %token,
                kind = outcome.kind(),
                reason = %reason,
                "Executor fault, no verdict recorded"
            );
            self.events
                .publish(DomainEvent::ExecutionFaulted { token, reason });
            return Ok(None);
        };

        let result = ExerciseSolutionResult::new(solution.id, test_case.id, verdict, diagnostic);
        if !self.results.save_if_absent(result.clone()).await? {
            tracing::warn!(token = %token, "Duplicate outcome ignored, verdict already recorded");
            return Ok(None);
        }

        tracing::info!(token = %token, verdict = %verdict, "Solution result recorded");
        self.events
            .publish(DomainEvent::SolutionResultRecorded { token, verdict });

        Ok(Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::repositories::{
            MockSolutionRepository, MockSolutionResultRepository, MockTestCaseRepository,
        },
        events::MockEventPublisher,
        models::{ExerciseSolution, SolutionPayload, TestCasePayload, Visibility},
    };
    use uuid::Uuid;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn test_case_expecting(expected: &[&str]) -> TestCase {
        TestCase::new(
            Uuid::new_v4(),
            TestCasePayload {
                visibility: Visibility::Public,
                timeout_ms: 1000,
                inputs: vec![],
                expected_outputs: lines(expected),
                program_arguments: None,
                stdin: None,
            },
        )
    }

    fn finished(exit_code: i32, stdout: &[&str], stderr: &[&str]) -> ExecutionOutcome {
        ExecutionOutcome::Finished {
            exit_code,
            stdout: lines(stdout),
            stderr: lines(stderr),
        }
    }

    fn verdict_of(outcome: ExecutionOutcome, expected: &[&str]) -> Option<Verdict> {
        grade(&outcome, &test_case_expecting(expected)).map(|(verdict, _)| verdict)
    }

    #[test]
    fn test_non_zero_exit_fails() {
        assert_eq!(verdict_of(finished(7, &["x"], &[]), &["x"]), Some(Verdict::Failed));
    }

    #[test]
    fn test_stderr_output_fails() {
        let graded = grade(&finished(0, &["x"], &["warn"]), &test_case_expecting(&["x"]));
        assert_eq!(graded, Some((Verdict::Failed, Some("warn".to_string()))));
    }

    #[test]
    fn test_output_order_matters() {
        assert_eq!(
            verdict_of(finished(0, &["a", "b"], &[]), &["b", "a"]),
            Some(Verdict::Failed)
        );
    }

    #[test]
    fn test_matching_output_is_approved() {
        assert_eq!(
            verdict_of(finished(0, &["x", "y"], &[]), &["x", "y"]),
            Some(Verdict::Approved)
        );
    }

    #[test]
    fn test_timeout_and_compile_error() {
        assert_eq!(verdict_of(ExecutionOutcome::TimedOut, &[]), Some(Verdict::TimedOut));

        let graded = grade(
            &ExecutionOutcome::CompileError {
                compiler_errors: lines(&["main.c:1: error", "1 error generated"]),
            },
            &test_case_expecting(&[]),
        );
        assert_eq!(
            graded,
            Some((
                Verdict::NotCompiled,
                Some("main.c:1: error\n1 error generated".to_string())
            ))
        );
    }

    #[test]
    fn test_infrastructure_faults_are_not_graded() {
        assert_eq!(
            verdict_of(
                ExecutionOutcome::InitializationError {
                    message: "image missing".to_string()
                },
                &[]
            ),
            None
        );
        assert_eq!(
            verdict_of(ExecutionOutcome::UnknownError { message: String::new() }, &[]),
            None
        );
    }

    struct Fixture {
        solution: ExerciseSolution,
        test_case: TestCase,
    }

    impl Fixture {
        fn new() -> Self {
            let test_case = test_case_expecting(&["42"]);
            let solution = ExerciseSolution::new(
                test_case.exercise_id,
                SolutionPayload {
                    answer: "puts 42".to_string(),
                    compiler_flags: None,
                },
            );
            Self { solution, test_case }
        }

        fn token(&self) -> CorrelationToken {
            CorrelationToken::new(self.solution.id, self.test_case.id)
        }

        fn repositories(&self) -> (MockSolutionRepository, MockTestCaseRepository) {
            let mut solutions = MockSolutionRepository::new();
            let solution = self.solution.clone();
            solutions
                .expect_find_by_id()
                .returning(move |_| Ok(Some(solution.clone())));

            let mut test_cases = MockTestCaseRepository::new();
            let test_case = self.test_case.clone();
            test_cases
                .expect_find_by_id()
                .returning(move |_| Ok(Some(test_case.clone())));

            (solutions, test_cases)
        }
    }

    fn quiet_events() -> MockEventPublisher {
        let mut events = MockEventPublisher::new();
        events.expect_publish().return_const(());
        events
    }

    #[tokio::test]
    async fn test_process_execution_records_verdict() {
        let fixture = Fixture::new();
        let (solutions, test_cases) = fixture.repositories();

        let mut results = MockSolutionResultRepository::new();
        let (solution_id, test_case_id) = (fixture.solution.id, fixture.test_case.id);
        results
            .expect_save_if_absent()
            .withf(move |r| {
                r.solution_id == solution_id
                    && r.test_case_id == test_case_id
                    && r.verdict == Verdict::Approved
            })
            .times(1)
            .returning(|_| Ok(true));

        let service = GradingService::new(
            Arc::new(solutions),
            Arc::new(test_cases),
            Arc::new(results),
            Arc::new(quiet_events()),
        );

        let recorded = service
            .process_execution(fixture.token(), finished(0, &["42"], &[]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recorded.verdict, Verdict::Approved);
    }

    #[tokio::test]
    async fn test_fault_outcome_persists_nothing() {
        let fixture = Fixture::new();
        let (solutions, test_cases) = fixture.repositories();

        // No expectation: any write would panic
        let results = MockSolutionResultRepository::new();

        let mut events = MockEventPublisher::new();
        events
            .expect_publish()
            .withf(|e| matches!(e, DomainEvent::ExecutionOutcomeArrived { .. }))
            .times(1)
            .return_const(());
        events
            .expect_publish()
            .withf(|e| matches!(e, DomainEvent::ExecutionFaulted { .. }))
            .times(1)
            .return_const(());

        let service = GradingService::new(
            Arc::new(solutions),
            Arc::new(test_cases),
            Arc::new(results),
            Arc::new(events),
        );

        let recorded = service
            .process_execution(
                fixture.token(),
                ExecutionOutcome::InitializationError {
                    message: "sandbox unavailable".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(recorded.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_ignored() {
        let fixture = Fixture::new();
        let (solutions, test_cases) = fixture.repositories();

        let mut results = MockSolutionResultRepository::new();
        results
            .expect_save_if_absent()
            .times(1)
            .returning(|_| Ok(false));

        let mut events = MockEventPublisher::new();
        events
            .expect_publish()
            .withf(|e| !matches!(e, DomainEvent::SolutionResultRecorded { .. }))
            .return_const(());

        let service = GradingService::new(
            Arc::new(solutions),
            Arc::new(test_cases),
            Arc::new(results),
            Arc::new(events),
        );

        let recorded = service
            .process_execution(fixture.token(), ExecutionOutcome::TimedOut)
            .await
            .unwrap();
        assert!(recorded.is_none());
    }

    #[tokio::test]
    async fn test_unknown_solution_is_not_found() {
        let fixture = Fixture::new();

        let mut solutions = MockSolutionRepository::new();
        solutions.expect_find_by_id().returning(|_| Ok(None));
        let (_, test_cases) = fixture.repositories();

        let service = GradingService::new(
            Arc::new(solutions),
            Arc::new(test_cases),
            Arc::new(MockSolutionResultRepository::new()),
            Arc::new(quiet_events()),
        );

        let err = service
            .process_execution(fixture.token(), ExecutionOutcome::TimedOut)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_foreign_test_case_is_rejected() {
        let mut fixture = Fixture::new();
        fixture.test_case.exercise_id = Uuid::new_v4();
        let (solutions, test_cases) = fixture.repositories();

        let service = GradingService::new(
            Arc::new(solutions),
            Arc::new(test_cases),
            Arc::new(MockSolutionResultRepository::new()),
            Arc::new(quiet_events()),
        );

        let err = service
            .process_execution(fixture.token(), finished(0, &["42"], &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
