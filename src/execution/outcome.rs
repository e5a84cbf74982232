//! Terminal outcomes reported by the executor

use serde::{Deserialize, Serialize};

/// Outcome of one dispatched execution request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionOutcome {
    /// The program ran to completion
    Finished {
        exit_code: i32,
        #[serde(default)]
        stdout: Vec<String>,
        #[serde(default)]
        stderr: Vec<String>,
    },
    /// The executor killed the program after the test case timeout
    TimedOut,
    CompileError {
        #[serde(default)]
        compiler_errors: Vec<String>,
    },
    /// The executor could not prepare the run
    InitializationError {
        #[serde(default)]
        message: String,
    },
    UnknownError {
        #[serde(default)]
        message: String,
    },
}

impl ExecutionOutcome {
    /// Short name of the variant, for logs and events
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Finished { .. } => "FINISHED",
            Self::TimedOut => "TIMED_OUT",
            Self::CompileError { .. } => "COMPILE_ERROR",
            Self::InitializationError { .. } => "INITIALIZATION_ERROR",
            Self::UnknownError { .. } => "UNKNOWN_ERROR",
        }
    }

    /// Executor message for faults of the execution infrastructure rather
    /// than of the program
    pub fn fault_message(&self) -> Option<&str> {
        match self {
            Self::InitializationError { message } | Self::UnknownError { message } => {
                Some(message)
            }
            _ => None,
        }
    }
}
