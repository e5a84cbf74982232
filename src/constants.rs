//! Application-wide constants
//!
//! This module contains all constant values used throughout the application.
//! Constants are grouped by their purpose for better organization.

// =============================================================================
// SERVICE DEFAULTS
// =============================================================================

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "exam_evaluations=info,sqlx=warn";

// =============================================================================
// DATABASE DEFAULTS
// =============================================================================

/// Default maximum database connections in the pool
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 20;

// =============================================================================
// EXECUTOR TRANSPORT DEFAULTS
// =============================================================================

/// Default Redis URL
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Stream execution requests are appended to
pub const DEFAULT_EXECUTION_REQUEST_STREAM: &str = "execution_requests";

/// Stream execution outcomes are read from
pub const DEFAULT_EXECUTION_RESULT_STREAM: &str = "execution_results";

/// Consumer group reading the result stream
pub const DEFAULT_RESULT_CONSUMER_GROUP: &str = "evaluations";

/// Block timeout for XREADGROUP (milliseconds)
pub const DEFAULT_BLOCK_TIMEOUT_MS: usize = 5000;

/// Attempts at ingesting an outcome before it is dead-lettered
pub const DEFAULT_MAX_INGEST_RETRIES: u32 = 3;

/// Idle time after which another consumer's pending outcome is claimed
pub const DEFAULT_CLAIM_MIN_IDLE_MS: u64 = 60_000;

/// Capacity of the in-process domain event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

// =============================================================================
// SUPPORTED LANGUAGES
// =============================================================================

/// Language identifiers
pub mod languages {
    pub const C: &str = "c";
    pub const CPP: &str = "cpp";
    pub const JAVA: &str = "java";
    pub const PYTHON: &str = "python";
    pub const RUBY: &str = "ruby";
    pub const RUST: &str = "rust";

    /// All supported language identifiers
    pub const ALL: &[&str] = &[C, CPP, JAVA, PYTHON, RUBY, RUST];
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Maximum exam description length
pub const MAX_EXAM_DESCRIPTION_LENGTH: u64 = 256;

/// Minimum exam duration in minutes
pub const MIN_EXAM_DURATION_MINUTES: i64 = 1;

/// Maximum exam duration in minutes (one day)
pub const MAX_EXAM_DURATION_MINUTES: i64 = 24 * 60;

/// Maximum awarded score for one exercise
pub const MAX_AWARDED_SCORE: i32 = 100;

/// Minimum test case timeout in milliseconds
pub const MIN_TEST_CASE_TIMEOUT_MS: i64 = 1;

/// Maximum test case timeout in milliseconds
pub const MAX_TEST_CASE_TIMEOUT_MS: i64 = 60_000;

/// Maximum answer size in bytes (64 KB)
pub const MAX_ANSWER_SIZE: u64 = 64 * 1024;

/// Maximum owner identifier length
pub const MAX_OWNER_LENGTH: usize = 128;
