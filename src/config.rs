//! Environment-prefixed configuration, mirroring
//! `original_source/Platform/src/config/config.py`'s `DevConfig` /
//! `ProdConfig` / `TestConfig` split: `ENV_STATE` is read unprefixed first,
//! then every other variable is read under the `DEV_`/`PROD_`/`TEST_`
//! prefix it selects.

use std::env;

use crate::error::WorkerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvState {
    Dev,
    Prod,
    Test,
}

impl EnvState {
    fn prefix(self) -> &'static str {
        match self {
            Self::Dev => "DEV_",
            Self::Prod => "PROD_",
            Self::Test => "TEST_",
        }
    }

    fn from_str(value: &str) -> Result<Self, WorkerError> {
        match value.to_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            "test" => Ok(Self::Test),
            other => Err(WorkerError::Config(format!(
                "unrecognised ENV_STATE {other:?}, expected dev|prod|test"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub env_state: EnvState,
    pub mongo_uri: String,
    pub db_name: String,
    pub redis_url: String,
    pub queue_key: String,
    pub testcase_api_format: String,
    pub terminal_statuses: Vec<String>,
    pub log_dir: Option<String>,
    pub log_file_path: Option<String>,
}

impl Config {
    /// Reads `ENV_STATE` and then every prefixed variable. Missing required
    /// variables are a hard startup error — there is no sensible default
    /// for where the queue or document store live.
    pub fn from_env() -> Result<Self, WorkerError> {
        let env_state = EnvState::from_str(&required("ENV_STATE")?)?;
        let prefix = env_state.prefix();

        Ok(Self {
            env_state,
            mongo_uri: required_prefixed(prefix, "MONGO_URI")?,
            db_name: required_prefixed(prefix, "DB_NAME")?,
            redis_url: required_prefixed(prefix, "REDIS_URL")?,
            queue_key: required_prefixed(prefix, "QUEUE_KEY")?,
            testcase_api_format: required_prefixed(prefix, "TESTCASE_API_FORMAT")?,
            terminal_statuses: split_csv(&optional_prefixed(prefix, "TERMINAL_STATUSES")),
            log_dir: env::var(format!("{prefix}LOG_DIR")).ok(),
            log_file_path: env::var(format!("{prefix}LOG_FILE_PATH")).ok(),
        })
    }

    /// Default `RUST_LOG` level when the operator hasn't set one: `debug`
    /// outside `prod`, matching the original's `'DEBUG' if ENV_STATE == 'dev'
    /// else 'INFO'`.
    pub fn default_log_level(&self) -> &'static str {
        match self.env_state {
            EnvState::Prod => "info",
            EnvState::Dev | EnvState::Test => "debug",
        }
    }
}

fn required(name: &str) -> Result<String, WorkerError> {
    env::var(name).map_err(|_| WorkerError::Config(format!("missing required env var {name}")))
}

fn required_prefixed(prefix: &str, name: &str) -> Result<String, WorkerError> {
    required(&format!("{prefix}{name}"))
}

fn optional_prefixed(prefix: &str, name: &str) -> String {
    env::var(format!("{prefix}{name}")).unwrap_or_default()
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
