use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use judge_worker::config::Config;
use judge_worker::processor::JobProcessor;
use judge_worker::queue::RedisJobQueue;
use judge_worker::sandbox::SandboxRunner;
use judge_worker::store::MongoResultStore;
use judge_worker::testcase_client::TestCaseClient;
use judge_worker::worker::WorkerLoop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (silently ignored if missing), before any
    // config or logging init reads the environment.
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let _log_guard = init_logging(&config);

    tracing::info!(env = ?config.env_state, "judge-worker starting");

    let store = Arc::new(MongoResultStore::connect(&config.mongo_uri, &config.db_name).await?);
    let queue = Arc::new(RedisJobQueue::connect(&config.redis_url).await?);
    let testcase_client = TestCaseClient::new(config.testcase_api_format.clone());
    let sandbox = SandboxRunner::new();

    let processor = Arc::new(JobProcessor::new(
        queue.clone(),
        store.clone(),
        testcase_client,
        sandbox,
    ));
    let worker = WorkerLoop::new(queue.clone(), processor, config.queue_key.clone());

    let cancel = CancellationToken::new();
    tokio::spawn(wait_for_shutdown_signal(cancel.clone()));

    worker.run(cancel).await;

    tracing::info!("judge-worker shutting down");
    Ok(())
}

/// Structured logging, configured once at process start: a human-readable
/// stderr layer always on, plus a non-blocking rolling file layer when
/// `LOG_DIR`/`LOG_FILE_PATH` are set. Verbosity defaults per environment
/// unless `RUST_LOG` overrides it.
fn init_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.default_log_level()));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false);

    match (&config.log_dir, &config.log_file_path) {
        (Some(dir), Some(file_name)) => {
            let file_appender = tracing_appender::rolling::daily(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

/// Resolves once Ctrl+C or (on Unix) SIGTERM arrives, then cancels the
/// token. The Worker Loop races this against its blocking queue pop so
/// shutdown isn't held hostage by an empty queue.
async fn wait_for_shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::warn!("failed to install SIGTERM handler: {e}"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }

    cancel.cancel();
}
