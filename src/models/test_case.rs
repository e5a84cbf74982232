//! Test case model

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    constants::{MAX_TEST_CASE_TIMEOUT_MS, MIN_TEST_CASE_TIMEOUT_MS},
    models::ExerciseId,
};

/// Test case ID type
pub type TestCaseId = Uuid;

/// Whether a test case is shown to the student before grading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "PUBLIC",
            Self::Private => "PRIVATE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PUBLIC" => Some(Self::Public),
            "PRIVATE" => Some(Self::Private),
            _ => None,
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Test case creation / modification payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TestCasePayload {
    pub visibility: Visibility,

    #[validate(range(min = MIN_TEST_CASE_TIMEOUT_MS, max = MAX_TEST_CASE_TIMEOUT_MS))]
    pub timeout_ms: i64,

    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub expected_outputs: Vec<String>,

    pub program_arguments: Option<Vec<String>>,

    pub stdin: Option<Vec<String>>,
}

/// Test case domain model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: TestCaseId,
    pub exercise_id: ExerciseId,
    pub visibility: Visibility,
    pub timeout_ms: i64,
    pub inputs: Vec<String>,
    pub expected_outputs: Vec<String>,
    pub program_arguments: Option<Vec<String>>,
    pub stdin: Option<Vec<String>>,
}

impl TestCase {
    pub fn new(exercise_id: ExerciseId, payload: TestCasePayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            exercise_id,
            visibility: payload.visibility,
            timeout_ms: payload.timeout_ms,
            inputs: payload.inputs,
            expected_outputs: payload.expected_outputs,
            program_arguments: payload.program_arguments,
            stdin: payload.stdin,
        }
    }

    pub fn update(&mut self, payload: TestCasePayload) {
        self.visibility = payload.visibility;
        self.timeout_ms = payload.timeout_ms;
        self.inputs = payload.inputs;
        self.expected_outputs = payload.expected_outputs;
        self.program_arguments = payload.program_arguments;
        self.stdin = payload.stdin;
    }

    /// Element-wise, order-sensitive comparison against the expected output
    pub fn matches_expected(&self, stdout: &[String]) -> bool {
        self.expected_outputs.as_slice() == stdout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn payload() -> TestCasePayload {
        TestCasePayload {
            visibility: Visibility::Private,
            timeout_ms: 1000,
            inputs: lines(&["3", "1 2 3"]),
            expected_outputs: lines(&["x", "y"]),
            program_arguments: None,
            stdin: None,
        }
    }

    #[test]
    fn test_matches_expected_is_order_sensitive() {
        let test_case = TestCase::new(Uuid::new_v4(), payload());
        assert!(test_case.matches_expected(&lines(&["x", "y"])));
        assert!(!test_case.matches_expected(&lines(&["y", "x"])));
        assert!(!test_case.matches_expected(&lines(&["x"])));
        assert!(!test_case.matches_expected(&lines(&["x", "y", ""])));
    }

    #[test]
    fn test_timeout_bounds() {
        assert!(payload().validate().is_ok());

        let mut zero = payload();
        zero.timeout_ms = 0;
        assert!(zero.validate().is_err());

        let mut huge = payload();
        huge.timeout_ms = MAX_TEST_CASE_TIMEOUT_MS + 1;
        assert!(huge.validate().is_err());
    }

    #[test]
    fn test_visibility_parse() {
        assert_eq!(Visibility::parse("PUBLIC"), Some(Visibility::Public));
        assert_eq!(Visibility::parse("PRIVATE"), Some(Visibility::Private));
        assert_eq!(Visibility::parse("hidden"), None);
    }
}
