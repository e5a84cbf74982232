//! Execution request and correlation token

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Exercise, ExerciseSolution, SolutionId, TestCase, TestCaseId};

/// Opaque pair matching an asynchronous outcome back to the
/// (solution, test case) that triggered it. Round-tripped unchanged
/// through the executor transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationToken {
    solution_id: SolutionId,
    test_case_id: TestCaseId,
}

impl CorrelationToken {
    pub const SOLUTION_FIELD: &'static str = "solution_id";
    pub const TEST_CASE_FIELD: &'static str = "test_case_id";

    pub fn new(solution_id: SolutionId, test_case_id: TestCaseId) -> Self {
        Self {
            solution_id,
            test_case_id,
        }
    }

    pub fn solution_id(&self) -> SolutionId {
        self.solution_id
    }

    pub fn test_case_id(&self) -> TestCaseId {
        self.test_case_id
    }

    /// Read the token back from stream message fields
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, String> {
        let read = |name: &str| -> Result<Uuid, String> {
            fields
                .get(name)
                .ok_or_else(|| format!("missing field {name}"))?
                .parse()
                .map_err(|e| format!("invalid {name}: {e}"))
        };

        Ok(Self::new(
            read(Self::SOLUTION_FIELD)?,
            read(Self::TEST_CASE_FIELD)?,
        ))
    }
}

impl std::fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.solution_id, self.test_case_id)
    }
}

/// What the executor needs to run one solution against one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    pub inputs: Vec<String>,
    pub program_arguments: Option<Vec<String>>,
    pub stdin: Option<Vec<String>>,
    pub compiler_flags: Option<String>,
    pub timeout_ms: i64,
}

impl ExecutionRequest {
    /// Build the request for running `solution` against `test_case`
    pub fn build(solution: &ExerciseSolution, test_case: &TestCase, exercise: &Exercise) -> Self {
        Self {
            code: solution.answer.clone(),
            language: exercise.language.clone(),
            inputs: test_case.inputs.clone(),
            program_arguments: test_case.program_arguments.clone(),
            stdin: test_case.stdin.clone(),
            compiler_flags: solution.compiler_flags.clone(),
            timeout_ms: test_case.timeout_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_from_fields() {
        let token = CorrelationToken::new(Uuid::new_v4(), Uuid::new_v4());
        let fields = HashMap::from([
            ("solution_id".to_string(), token.solution_id().to_string()),
            ("test_case_id".to_string(), token.test_case_id().to_string()),
        ]);
        assert_eq!(CorrelationToken::from_fields(&fields).unwrap(), token);
    }

    #[test]
    fn test_token_from_fields_rejects_garbage() {
        let missing = HashMap::from([("solution_id".to_string(), Uuid::nil().to_string())]);
        assert!(CorrelationToken::from_fields(&missing).is_err());

        let garbage = HashMap::from([
            ("solution_id".to_string(), "42".to_string()),
            ("test_case_id".to_string(), Uuid::nil().to_string()),
        ]);
        assert!(CorrelationToken::from_fields(&garbage).is_err());
    }
}
