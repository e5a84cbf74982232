//! Application state management
//!
//! Wires one storage adapter, the executor transport and the event sink
//! into the services. Cheap to clone.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{
    constants::EVENT_CHANNEL_CAPACITY,
    db::repositories::{
        ExamRepository, ExerciseRepository, SolutionRepository, SolutionResultRepository,
        TestCaseRepository,
    },
    events::{BroadcastPublisher, DomainEvent},
    execution::ExecutionRequestSender,
    services::{DispatchService, ExamRepositories, ExamService, GradingService},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

/// Inner state (wrapped in Arc for cheap cloning)
struct AppStateInner {
    exams: ExamService,
    grading: Arc<GradingService>,
    events: Arc<BroadcastPublisher>,
}

impl AppState {
    /// Build the services on top of a store implementing every repository port
    pub fn new<S>(store: Arc<S>, sender: Arc<dyn ExecutionRequestSender>) -> Self
    where
        S: ExamRepository
            + ExerciseRepository
            + TestCaseRepository
            + SolutionRepository
            + SolutionResultRepository
            + 'static,
    {
        let events = Arc::new(BroadcastPublisher::new(EVENT_CHANNEL_CAPACITY));

        let repos = ExamRepositories {
            exams: store.clone(),
            exercises: store.clone(),
            test_cases: store.clone(),
            solutions: store.clone(),
            results: store.clone(),
        };

        let dispatcher = Arc::new(DispatchService::new(sender, events.clone()));
        let grading = Arc::new(GradingService::new(
            repos.solutions.clone(),
            repos.test_cases.clone(),
            repos.results.clone(),
            events.clone(),
        ));

        Self {
            inner: Arc::new(AppStateInner {
                exams: ExamService::new(repos, dispatcher),
                grading,
                events,
            }),
        }
    }

    /// Exam lifecycle operations
    pub fn exams(&self) -> &ExamService {
        &self.inner.exams
    }

    /// Outcome ingestion
    pub fn grading(&self) -> Arc<GradingService> {
        self.inner.grading.clone()
    }

    /// Subscribe to domain events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.inner.events.subscribe()
    }
}
