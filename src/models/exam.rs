//! Exam model

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    constants::{MAX_EXAM_DESCRIPTION_LENGTH, MAX_EXAM_DURATION_MINUTES, MIN_EXAM_DURATION_MINUTES},
    error::{AppError, AppResult},
    utils::validation::validate_future_moment,
};

/// Exam ID type
pub type ExamId = Uuid;

/// Exam lifecycle state
///
/// Transitions only move forward: `Upcoming -> InProgress -> Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamState {
    Upcoming,
    InProgress,
    Finished,
}

impl ExamState {
    /// Get state as its stored string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "UPCOMING",
            Self::InProgress => "IN_PROGRESS",
            Self::Finished => "FINISHED",
        }
    }

    /// Parse state from its stored string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UPCOMING" => Some(Self::Upcoming),
            "IN_PROGRESS" => Some(Self::InProgress),
            "FINISHED" => Some(Self::Finished),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exam creation / modification payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ExamPayload {
    #[validate(length(min = 1, max = MAX_EXAM_DESCRIPTION_LENGTH))]
    pub description: String,

    /// Moment the exam is scheduled to start
    #[validate(custom(function = "validate_future_moment"))]
    pub starting_at: DateTime<Utc>,

    #[validate(range(min = MIN_EXAM_DURATION_MINUTES, max = MAX_EXAM_DURATION_MINUTES))]
    pub duration_minutes: i64,
}

/// Exam domain model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: ExamId,
    pub description: String,
    pub starting_at: DateTime<Utc>,
    pub duration_minutes: i64,
    state: ExamState,
    owners: BTreeSet<String>,
}

impl Exam {
    /// Create a new exam in the `Upcoming` state
    pub fn new(payload: ExamPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: payload.description,
            starting_at: payload.starting_at,
            duration_minutes: payload.duration_minutes,
            state: ExamState::Upcoming,
            owners: BTreeSet::new(),
        }
    }

    /// Rebuild an exam from persisted fields
    pub fn restore(
        id: ExamId,
        description: String,
        starting_at: DateTime<Utc>,
        duration_minutes: i64,
        state: ExamState,
        owners: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            id,
            description,
            starting_at,
            duration_minutes,
            state,
            owners: owners.into_iter().collect(),
        }
    }

    pub fn state(&self) -> ExamState {
        self.state
    }

    pub fn owners(&self) -> &BTreeSet<String> {
        &self.owners
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration_minutes)
    }

    /// Scheduled end of the exam
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.starting_at + self.duration()
    }

    /// Fail unless the exam has not started yet
    pub fn ensure_upcoming(&self) -> AppResult<()> {
        self.ensure_state(ExamState::Upcoming)
    }

    /// Fail unless the exam is being taken
    pub fn ensure_in_progress(&self) -> AppResult<()> {
        self.ensure_state(ExamState::InProgress)
    }

    fn ensure_state(&self, expected: ExamState) -> AppResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(AppError::IllegalState(format!(
                "Exam {} is {}, expected {}",
                self.id, self.state, expected
            )))
        }
    }

    /// Replace description, start and duration. Only allowed while upcoming.
    pub fn update(&mut self, payload: ExamPayload) -> AppResult<()> {
        self.ensure_upcoming()?;
        self.description = payload.description;
        self.starting_at = payload.starting_at;
        self.duration_minutes = payload.duration_minutes;
        Ok(())
    }

    /// `Upcoming -> InProgress`
    pub fn start(&mut self) -> AppResult<()> {
        self.ensure_upcoming()?;
        self.state = ExamState::InProgress;
        Ok(())
    }

    /// `InProgress -> Finished`
    pub fn finish(&mut self) -> AppResult<()> {
        self.ensure_in_progress()?;
        self.state = ExamState::Finished;
        Ok(())
    }

    /// Add an owner. Returns `false` if it was already present.
    pub fn add_owner(&mut self, owner: &str) -> AppResult<bool> {
        self.ensure_not_finished()?;
        Ok(self.owners.insert(owner.to_string()))
    }

    /// Remove an owner. Returns `false` if it was not present.
    pub fn remove_owner(&mut self, owner: &str) -> AppResult<bool> {
        self.ensure_not_finished()?;
        Ok(self.owners.remove(owner))
    }

    fn ensure_not_finished(&self) -> AppResult<()> {
        if self.state == ExamState::Finished {
            return Err(AppError::IllegalState(format!(
                "Exam {} is finished, owners are frozen",
                self.id
            )));
        }
        Ok(())
    }
}
