//! Fetches the ordered test-case list for a problem over HTTP. Grounded in
//! the teacher's `dispatch::http::HttpDispatch` for client construction and
//! capped-body reading, simplified to a single non-streaming GET since the
//! test-case API returns a bounded JSON document rather than an SSE stream.

use std::time::Duration;

use reqwest::Client;

use crate::error::WorkerError;
use crate::model::{TestCase, TestCaseListResponse};

/// Response bodies above this size are rejected rather than buffered in
/// full — a misbehaving test-case service shouldn't be able to OOM the
/// worker.
const MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

pub struct TestCaseClient {
    client: Client,
    url_format: String,
}

impl TestCaseClient {
    pub fn new(url_format: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self { client, url_format }
    }

    /// Fetches test cases for `problem_id`. Any transport error or non-2xx
    /// status is surfaced as [`WorkerError::TestCaseFetch`]; there is no
    /// retry at this layer (spec.md §4.2).
    pub async fn fetch(&self, problem_id: &str) -> Result<Vec<TestCase>, WorkerError> {
        let url = self.url_format.replace("{problemId}", problem_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WorkerError::TestCaseFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::TestCaseFetch(format!(
                "unexpected status {status} from {url}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WorkerError::TestCaseFetch(e.to_string()))?;
        if bytes.len() > MAX_RESPONSE_BYTES {
            return Err(WorkerError::TestCaseFetch(format!(
                "response from {url} exceeded {MAX_RESPONSE_BYTES} bytes"
            )));
        }

        let parsed: TestCaseListResponse = serde_json::from_slice(&bytes)
            .map_err(|e| WorkerError::TestCaseFetch(format!("invalid JSON from {url}: {e}")))?;

        Ok(parsed.test_cases)
    }
}
