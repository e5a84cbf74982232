//! Wire contract with the external executor
//!
//! Requests go out through an [`ExecutionRequestSender`]; outcomes come back
//! on the result stream and are fed to grading by the [`ResultConsumer`].

pub mod consumer;
pub mod outcome;
pub mod request;
pub mod sender;

pub use consumer::{OutcomeMessage, ResultConsumer, parse_outcome_message};
pub use outcome::ExecutionOutcome;
pub use request::{CorrelationToken, ExecutionRequest};
pub use sender::{ExecutionRequestSender, RedisExecutionSender};

#[cfg(test)]
pub use sender::MockExecutionRequestSender;
