use thiserror::Error;

/// Closed taxonomy of infrastructure failures the worker can encounter.
///
/// Judging outcomes (`CompilationError`, `TimeLimitExceeded`, ...) are not
/// errors — they travel on the `Ok` side as a `sandbox::Verdict`. This enum
/// only covers the things the job processor has to recover from: a bad
/// queue payload, a store that won't answer, an unreachable test-case
/// service, or a sandbox that failed before it could even produce a verdict.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("malformed job payload: {0}")]
    MalformedJob(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("test-case fetch failed: {0}")]
    TestCaseFetch(String),

    #[error("sandbox infrastructure error: {0}")]
    Sandbox(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
