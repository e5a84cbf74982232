//! Exam Evaluations - Timed Coding Exams
//!
//! This library manages timed exams made of coding exercises. Student
//! solutions are run by an external executor against each exercise's test
//! cases, and the asynchronous outcomes are graded back into verdicts.
//!
//! # Features
//!
//! - Exam lifecycle state machine gating every mutation
//! - One execution request per (solution, test case), correlated by token
//! - Exactly-once verdict persistence per (solution, test case)
//! - In-memory or PostgreSQL storage, Redis Streams executor transport
//!
//! # Architecture
//!
//! - **Models**: Entities and the invariants they enforce
//! - **Repositories**: Storage ports and their adapters
//! - **Execution**: Wire contract with the executor
//! - **Services**: Lifecycle, dispatch and grading logic

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod events;
pub mod execution;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
