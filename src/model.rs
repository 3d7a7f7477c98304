//! Wire and document shapes shared by the queue, the test-case API, and the
//! result store.

use bson::DateTime as BsonDateTime;
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A job as popped off the queue. All fields arrive as JSON strings;
/// `submission_id` is the hex form of the `Submission`'s `_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    #[serde(rename = "submissionId")]
    pub submission_id: String,
    #[serde(rename = "problemId")]
    pub problem_id: String,
    pub language: String,
    #[serde(rename = "sourceCode")]
    pub source_code: String,
    #[serde(default)]
    pub stdin: String,
}

/// Submission lifecycle status. Transitions: `Pending` -> `Running` ->
/// (`Success` | `Failed`); the worker never writes any other transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl SubmissionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// A persisted Submission document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename = "userId")]
    pub user_id: ObjectId,
    #[serde(rename = "problemId")]
    pub problem_id: ObjectId,
    pub language: String,
    #[serde(rename = "sourceCode")]
    pub source_code: String,
    #[serde(default)]
    pub stdin: String,
    pub status: SubmissionStatus,
    #[serde(rename = "submittedAt")]
    pub submitted_at: BsonDateTime,
    #[serde(rename = "createdAt")]
    pub created_at: BsonDateTime,
    #[serde(rename = "updatedAt")]
    pub updated_at: BsonDateTime,
    #[serde(rename = "completedAt", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<BsonDateTime>,
    #[serde(default)]
    pub canceled: bool,
    #[serde(rename = "timeLimitMs")]
    pub time_limit_ms: u64,
    #[serde(rename = "memoryLimitB")]
    pub memory_limit_b: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SubmissionResult>,
}

/// The aggregated outcome of running every fetched test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
    #[serde(rename = "totalTests")]
    pub total_tests: u32,
    #[serde(rename = "passedTests")]
    pub passed_tests: u32,
    #[serde(rename = "maxRuntimeMs")]
    pub max_runtime_ms: f64,
    #[serde(rename = "maxMemoryBytes")]
    pub max_memory_bytes: u64,
    #[serde(rename = "testDetails")]
    pub test_details: Vec<TestDetail>,
}

impl SubmissionResult {
    /// Build an aggregate from the details the processor actually produced.
    /// `total_tests` is the number of test cases *fetched*, which may exceed
    /// `test_details.len()` when fail-fast stopped execution early.
    pub fn aggregate(total_tests: u32, test_details: Vec<TestDetail>) -> Self {
        let passed_tests = test_details
            .iter()
            .filter(|d| d.status == TestStatus::Passed)
            .count() as u32;
        let max_runtime_ms = test_details
            .iter()
            .map(|d| d.runtime_ms)
            .fold(0.0_f64, f64::max);
        let max_memory_bytes = test_details
            .iter()
            .map(|d| d.memory_bytes)
            .max()
            .unwrap_or(0);
        Self {
            total_tests,
            passed_tests,
            max_runtime_ms,
            max_memory_bytes,
            test_details,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

/// Outcome of running a single test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDetail {
    #[serde(rename = "testCaseId")]
    pub test_case_id: String,
    pub verdict: String,
    pub status: TestStatus,
    pub stdout: String,
    #[serde(rename = "runtimeMs")]
    pub runtime_ms: f64,
    #[serde(rename = "memoryBytes")]
    pub memory_bytes: u64,
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A test case as returned by the test-case API. `is_remote` discriminates
/// which pair of optional fields is populated; see [`TestCase::source`].
#[derive(Debug, Clone, Deserialize)]
pub struct TestCase {
    #[serde(rename = "caseId")]
    pub case_id: String,
    #[serde(rename = "isHidden", default)]
    pub is_hidden: bool,
    #[serde(rename = "isRemote", default)]
    pub is_remote: bool,
    pub input: Option<String>,
    #[serde(rename = "expectedOutput")]
    pub expected_output: Option<String>,
    #[serde(rename = "inputPath")]
    pub input_path: Option<String>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
}

/// Where to read a test case's input/expected output from.
pub enum TestSource<'a> {
    Inline {
        input: &'a str,
        expected_output: &'a str,
    },
    Remote {
        input_path: &'a str,
        output_path: &'a str,
    },
}

impl TestCase {
    pub fn source(&self) -> TestSource<'_> {
        if self.is_remote {
            TestSource::Remote {
                input_path: self.input_path.as_deref().unwrap_or(""),
                output_path: self.output_path.as_deref().unwrap_or(""),
            }
        } else {
            TestSource::Inline {
                input: self.input.as_deref().unwrap_or(""),
                expected_output: self.expected_output.as_deref().unwrap_or(""),
            }
        }
    }
}

/// Response envelope from the test-case API: `{"testCases": [...]}`.
#[derive(Debug, Deserialize)]
pub struct TestCaseListResponse {
    #[serde(rename = "testCases")]
    pub test_cases: Vec<TestCase>,
}

/// Pub/sub status event published on the `<submissionId>` channel.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusEvent {
    pub status: &'static str,
}

impl StatusEvent {
    pub const fn running() -> Self {
        Self { status: "running" }
    }

    pub const fn terminal(status: SubmissionStatus) -> Self {
        match status {
            SubmissionStatus::Success => Self { status: "success" },
            _ => Self { status: "failed" },
        }
    }
}
