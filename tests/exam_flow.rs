use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use exam_evaluations::{
    AppError, AppState,
    db::MemoryStore,
    error::DispatchError,
    events::DomainEvent,
    execution::{CorrelationToken, ExecutionOutcome, ExecutionRequest, ExecutionRequestSender},
    models::{
        ExamPayload, ExamState, ExercisePayload, SolutionPayload, TestCasePayload, Verdict,
        Visibility,
    },
};

/// Keeps every request instead of sending it anywhere
#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(ExecutionRequest, CorrelationToken)>>,
}

impl RecordingSender {
    fn sent(&self) -> Vec<(ExecutionRequest, CorrelationToken)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionRequestSender for RecordingSender {
    async fn request_execution(
        &self,
        request: ExecutionRequest,
        token: CorrelationToken,
    ) -> Result<(), DispatchError> {
        self.sent.lock().unwrap().push((request, token));
        Ok(())
    }
}

fn exam_payload() -> ExamPayload {
    ExamPayload {
        description: "Algorithms final".to_string(),
        starting_at: Utc::now() + Duration::days(3),
        duration_minutes: 180,
    }
}

fn test_case_payload(visibility: Visibility, expected: &[&str]) -> TestCasePayload {
    TestCasePayload {
        visibility,
        timeout_ms: 2000,
        inputs: vec!["3".to_string()],
        expected_outputs: expected.iter().map(|s| s.to_string()).collect(),
        program_arguments: None,
        stdin: Some(vec!["3".to_string()]),
    }
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_submit_and_grade_full_flow() {
    let store = Arc::new(MemoryStore::new());
    let sender = Arc::new(RecordingSender::default());
    let state = AppState::new(store.clone(), sender.clone());
    let mut events = state.subscribe();
    let exams = state.exams();

    let exam = exams.create_exam(exam_payload()).await.unwrap();
    let exercise = exams
        .create_exercise(
            exam.id,
            ExercisePayload {
                question: "Print the first n squares".to_string(),
                language: "rust".to_string(),
                solution_template: Some("fn main() {}".to_string()),
                awarded_score: 30,
            },
        )
        .await
        .unwrap();
    let public = exams
        .create_test_case(exercise.id, test_case_payload(Visibility::Public, &["1", "4", "9"]))
        .await
        .unwrap();
    let private = exams
        .create_test_case(exercise.id, test_case_payload(Visibility::Private, &["1", "4", "9"]))
        .await
        .unwrap();

    // Not started yet
    let err = exams
        .create_exercise_solution(
            exercise.id,
            SolutionPayload {
                answer: "fn main() {}".to_string(),
                compiler_flags: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::IllegalState(_)));
    assert!(sender.sent().is_empty());

    let exam = exams.start_exam(exam.id).await.unwrap();
    assert_eq!(exam.state(), ExamState::InProgress);

    let solution = exams
        .create_exercise_solution(
            exercise.id,
            SolutionPayload {
                answer: "fn main() { for i in 1..=3 { println!(\"{}\", i * i); } }".to_string(),
                compiler_flags: Some("-C opt-level=2".to_string()),
            },
        )
        .await
        .unwrap();

    let sent = sender.sent();
    assert_eq!(sent.len(), 2);
    for (request, token) in &sent {
        assert_eq!(token.solution_id(), solution.id);
        assert_eq!(request.language, "rust");
        assert_eq!(request.timeout_ms, 2000);
        assert_eq!(request.stdin, Some(vec!["3".to_string()]));
    }

    // Outcomes arrive out of order
    let grading = state.grading();
    let public_token = CorrelationToken::new(solution.id, public.id);
    let private_token = CorrelationToken::new(solution.id, private.id);

    let recorded = grading
        .process_execution(
            private_token,
            ExecutionOutcome::Finished {
                exit_code: 0,
                stdout: lines(&["1", "4", "9"]),
                stderr: vec![],
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recorded.verdict, Verdict::Approved);

    let recorded = grading
        .process_execution(public_token, ExecutionOutcome::TimedOut)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recorded.verdict, Verdict::TimedOut);

    // Late duplicate does not overwrite
    let duplicate = grading
        .process_execution(
            public_token,
            ExecutionOutcome::Finished {
                exit_code: 0,
                stdout: lines(&["1", "4", "9"]),
                stderr: vec![],
            },
        )
        .await
        .unwrap();
    assert!(duplicate.is_none());

    let results = exams.get_solution_results(solution.id).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(store.result_count().await, 2);
    let public_result = results
        .iter()
        .find(|r| r.test_case_id == public.id)
        .unwrap();
    assert_eq!(public_result.verdict, Verdict::TimedOut);

    exams.finish_exam(exam.id).await.unwrap();
    let err = exams.delete_exam(exam.id).await.unwrap_err();
    assert!(matches!(err, AppError::IllegalState(_)));

    let mut requested = 0;
    let mut recorded_events = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            DomainEvent::ExecutionRequested { .. } => requested += 1,
            DomainEvent::SolutionResultRecorded { .. } => recorded_events += 1,
            _ => {}
        }
    }
    assert_eq!(requested, 2);
    assert_eq!(recorded_events, 2);
}

#[tokio::test]
async fn test_infrastructure_fault_records_nothing() {
    let store = Arc::new(MemoryStore::new());
    let sender = Arc::new(RecordingSender::default());
    let state = AppState::new(store.clone(), sender.clone());
    let exams = state.exams();

    let exam = exams.create_exam(exam_payload()).await.unwrap();
    let exercise = exams
        .create_exercise(
            exam.id,
            ExercisePayload {
                question: "Echo stdin".to_string(),
                language: "python".to_string(),
                solution_template: None,
                awarded_score: 10,
            },
        )
        .await
        .unwrap();
    let test_case = exams
        .create_test_case(exercise.id, test_case_payload(Visibility::Private, &["3"]))
        .await
        .unwrap();
    exams.start_exam(exam.id).await.unwrap();

    let solution = exams
        .create_exercise_solution(
            exercise.id,
            SolutionPayload {
                answer: "print(input())".to_string(),
                compiler_flags: None,
            },
        )
        .await
        .unwrap();

    let token = CorrelationToken::new(solution.id, test_case.id);
    for outcome in [
        ExecutionOutcome::InitializationError {
            message: "container failed to start".to_string(),
        },
        ExecutionOutcome::UnknownError {
            message: "executor crashed".to_string(),
        },
    ] {
        let recorded = state.grading().process_execution(token, outcome).await.unwrap();
        assert!(recorded.is_none());
    }

    assert_eq!(store.result_count().await, 0);
}

#[tokio::test]
async fn test_delete_upcoming_exam_cascades() {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store, Arc::new(RecordingSender::default()));
    let exams = state.exams();

    let doomed = exams.create_exam(exam_payload()).await.unwrap();
    let kept = exams.create_exam(exam_payload()).await.unwrap();

    let payload = ExercisePayload {
        question: "Binary search".to_string(),
        language: "java".to_string(),
        solution_template: None,
        awarded_score: 25,
    };
    let doomed_exercise = exams.create_exercise(doomed.id, payload.clone()).await.unwrap();
    let kept_exercise = exams.create_exercise(kept.id, payload).await.unwrap();
    exams
        .create_test_case(doomed_exercise.id, test_case_payload(Visibility::Public, &["0"]))
        .await
        .unwrap();
    exams
        .create_test_case(kept_exercise.id, test_case_payload(Visibility::Public, &["0"]))
        .await
        .unwrap();

    let summary = exams.get_exam_score(kept.id).await.unwrap();
    assert_eq!(summary.total_score, 25);

    exams.delete_exam(doomed.id).await.unwrap();

    assert!(matches!(
        exams.get_exam(doomed.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));
    assert!(matches!(
        exams.get_public_test_cases(doomed_exercise.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));

    assert_eq!(exams.get_exercises(kept.id).await.unwrap().len(), 1);
    assert_eq!(
        exams
            .get_public_test_cases(kept_exercise.id)
            .await
            .unwrap()
            .len(),
        1
    );
}
