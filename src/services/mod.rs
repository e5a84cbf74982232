//! Business logic services

pub mod dispatch_service;
pub mod exam_service;
pub mod grading_service;

pub use dispatch_service::DispatchService;
pub use exam_service::{ExamRepositories, ExamService, ExamWithScore};
pub use grading_service::GradingService;
