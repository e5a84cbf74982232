//! Execution dispatch service

use std::sync::Arc;

use crate::{
    error::AppResult,
    events::{DomainEvent, EventPublisher},
    execution::{CorrelationToken, ExecutionRequest, ExecutionRequestSender},
    models::{Exercise, ExerciseSolution, TestCase},
};

/// Turns (solution, test case) pairs into execution requests
pub struct DispatchService {
    sender: Arc<dyn ExecutionRequestSender>,
    events: Arc<dyn EventPublisher>,
}

impl DispatchService {
    pub fn new(sender: Arc<dyn ExecutionRequestSender>, events: Arc<dyn EventPublisher>) -> Self {
        Self { sender, events }
    }

    /// Send one execution request for `solution` against `test_case`.
    ///
    /// Returns once the request is handed to the executor transport; the
    /// outcome arrives later, tagged with the returned token. A failed send
    /// leaves every entity untouched.
    pub async fn dispatch(
        &self,
        solution: &ExerciseSolution,
        test_case: &TestCase,
        exercise: &Exercise,
    ) -> AppResult<CorrelationToken> {
        let token = CorrelationToken::new(solution.id, test_case.id);
        let request = ExecutionRequest::build(solution, test_case, exercise);

        if let Err(e) = self.sender.request_execution(request, token).await {
            tracing::warn!(token = %token, error = %e, "Execution request not delivered");
            return Err(e.into());
        }

        tracing::debug!(
            token = %token,
            language = %exercise.language,
            timeout_ms = test_case.timeout_ms,
            "Execution requested"
        );
        self.events.publish(DomainEvent::ExecutionRequested { token });

        Ok(token)
    }
}
