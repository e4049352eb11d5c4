//! Test case results
//!
//! Every terminal outcome of a test case maps to exactly one
//! [`TestResultCode`]. Results are immutable once produced and are handed
//! unchanged to whatever aggregates or reports them.

use serde::Serialize;
use std::fmt;

/// Outcome code of a single test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestResultCode {
    TestPassed,
    TestSkipped,
    TestPermanentlySkipped,
    TestUnexpectedPassed,
    CompileFailed,
    CompileTimeout,
    ExecuteFailed,
    ExecuteTimeout,
}

impl TestResultCode {
    /// All codes, in declaration order
    pub const ALL: [TestResultCode; 8] = [
        TestResultCode::TestPassed,
        TestResultCode::TestSkipped,
        TestResultCode::TestPermanentlySkipped,
        TestResultCode::TestUnexpectedPassed,
        TestResultCode::CompileFailed,
        TestResultCode::CompileTimeout,
        TestResultCode::ExecuteFailed,
        TestResultCode::ExecuteTimeout,
    ];

    /// Whether this code counts as a test failure
    pub fn is_failure(self) -> bool {
        !matches!(
            self,
            TestResultCode::TestPassed
                | TestResultCode::TestSkipped
                | TestResultCode::TestPermanentlySkipped
        )
    }

    /// Upper-case name used in logs and reports
    pub fn as_str(self) -> &'static str {
        match self {
            TestResultCode::TestPassed => "TEST_PASSED",
            TestResultCode::TestSkipped => "TEST_SKIPPED",
            TestResultCode::TestPermanentlySkipped => "TEST_PERMANENTLY_SKIPPED",
            TestResultCode::TestUnexpectedPassed => "TEST_UNEXPECTED_PASSED",
            TestResultCode::CompileFailed => "COMPILE_FAILED",
            TestResultCode::CompileTimeout => "COMPILE_TIMEOUT",
            TestResultCode::ExecuteFailed => "EXECUTE_FAILED",
            TestResultCode::ExecuteTimeout => "EXECUTE_TIMEOUT",
        }
    }
}

impl fmt::Display for TestResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCaseResult {
    /// Short test name used for printing
    pub test_name: String,
    /// Outcome code
    pub code: TestResultCode,
    /// One-line summary, e.g. `FAIL: Compilation failed with command: ...`
    pub message: String,
    /// Captured command line and process output, when there is any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl TestCaseResult {
    /// Create a result without attached output
    pub fn new(test_name: impl Into<String>, code: TestResultCode, message: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            code,
            message: message.into(),
            output: None,
        }
    }

    /// Attach captured output
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Shorthand for a whole-test-case pass
    pub fn passed(test_name: impl Into<String>) -> Self {
        Self::new(test_name, TestResultCode::TestPassed, "")
    }

    pub fn is_failure(&self) -> bool {
        self.code.is_failure()
    }
}

impl fmt::Display for TestCaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.test_name)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}
