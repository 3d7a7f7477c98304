//! Compiles (if needed) and runs one program against one stdin under a
//! CPU-wall timeout and an RSS ceiling, classifying the result into the
//! closed [`Verdict`] set.
//!
//! Process lifecycle here follows the same shape as the teacher's
//! `dispatch::cli::CliDispatch::query_model`: the child becomes the leader
//! of its own process group (so a kill reaches anything it spawns), a
//! `ProcessGroupGuard` sends that kill on drop as a backstop, and stdin is
//! written from a separate task so a large prompt can't deadlock against a
//! large echoed response.

pub mod languages;
pub mod monitor;

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::oneshot;

use crate::error::WorkerError;

/// Added to the requested memory ceiling before enforcement (spec.md
/// "grace margin").
pub const GRACE_MEMORY_BYTES: u64 = 15 * 1024 * 1024;

/// Stderr substrings that indicate an out-of-memory condition the exit code
/// alone wouldn't reveal. Closed, versioned set — extending it is a code
/// change, not configuration (spec.md Design Notes, resolved Open Question c).
const MEMORY_ERROR_MARKERS: &[&str] = &[
    "MemoryError",
    "std::bad_alloc",
    "OutOfMemoryError",
    "out of memory",
    "malloc failed",
    "mmap failed",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    CompilationError,
    RuntimeError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    UnsupportedLanguage,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::CompilationError => "CompilationError",
            Self::RuntimeError => "RuntimeError",
            Self::TimeLimitExceeded => "TimeLimitExceeded",
            Self::MemoryLimitExceeded => "MemoryLimitExceeded",
            Self::UnsupportedLanguage => "UnsupportedLanguage",
        }
    }
}

/// Result of one sandboxed run.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub verdict: Verdict,
    pub stdout: String,
    pub stderr: String,
    pub compiler_msg: String,
    pub runtime_ms: f64,
    pub memory_bytes: u64,
}

impl Outcome {
    fn unsupported() -> Self {
        Self {
            verdict: Verdict::UnsupportedLanguage,
            stdout: String::new(),
            stderr: String::new(),
            compiler_msg: String::new(),
            runtime_ms: 0.0,
            memory_bytes: 0,
        }
    }
}

/// Kills the entire process group on drop (SIGKILL), not just the leader —
/// grandchildren (e.g. a compiler's helper processes) would otherwise
/// survive as orphans.
struct ProcessGroupGuard {
    pid: Option<u32>,
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pid) = self.pid {
            unsafe {
                libc::kill(-(pid as i32), libc::SIGKILL);
            }
        }
    }
}

#[allow(clippy::new_without_default)]
pub struct SandboxRunner;

impl SandboxRunner {
    pub fn new() -> Self {
        Self
    }

    /// Runs `source_code` under `language` against `stdin`, enforcing
    /// `timeout` wall-clock and `memory_bytes` RSS (before the grace
    /// margin). Always cleans up its workspace, including on every verdict
    /// and on infrastructure failure.
    pub async fn run(
        &self,
        language: &str,
        source_code: &str,
        stdin: &str,
        timeout: Duration,
        memory_bytes: u64,
    ) -> Result<Outcome, WorkerError> {
        let Some(spec) = languages::lookup(language) else {
            return Ok(Outcome::unsupported());
        };

        let effective_memory = memory_bytes + GRACE_MEMORY_BYTES;

        let workdir = tempfile::Builder::new()
            .prefix("judge-sandbox-")
            .tempdir()
            .map_err(|e| WorkerError::Sandbox(format!("failed to create workspace: {e}")))?;

        let src_path = workdir.path().join(spec.source_filename);
        tokio::fs::write(&src_path, source_code)
            .await
            .map_err(|e| WorkerError::Sandbox(format!("failed to write source: {e}")))?;

        if let Some(compile_cmd) = spec.compile {
            let (exe, args) = compile_cmd.split_first().expect("compile cmd non-empty");
            let output = Command::new(exe)
                .args(args)
                .current_dir(workdir.path())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .process_group(0)
                .output()
                .await
                .map_err(|e| WorkerError::Sandbox(format!("failed to spawn {exe}: {e}")))?;

            if !output.status.success() {
                return Ok(Outcome {
                    verdict: Verdict::CompilationError,
                    stdout: String::new(),
                    stderr: String::new(),
                    compiler_msg: String::from_utf8_lossy(&output.stderr).into_owned(),
                    runtime_ms: 0.0,
                    memory_bytes: 0,
                });
            }
        }

        let run_cmd: Vec<String> = if languages::is_java(language) {
            let mem_mb = effective_memory / (1024 * 1024);
            vec![
                "java".to_string(),
                format!("-Xmx{mem_mb}m"),
                "-cp".to_string(),
                ".".to_string(),
                "Main".to_string(),
            ]
        } else {
            spec.run.iter().map(|s| s.to_string()).collect()
        };
        let (exe, args) = run_cmd.split_first().expect("run cmd non-empty");

        let mut cmd = Command::new(exe);
        cmd.args(args)
            .current_dir(workdir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        #[cfg(target_os = "linux")]
        if !languages::is_java(language) {
            apply_address_space_limit(&mut cmd, effective_memory);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| WorkerError::Sandbox(format!("failed to spawn {exe}: {e}")))?;
        let _pg_guard = ProcessGroupGuard { pid: child.id() };
        let child_pid = child.id();

        {
            let mut child_stdin = child.stdin.take().expect("stdin was piped");
            let payload = stdin.to_string();
            tokio::spawn(async move {
                let _ = child_stdin.write_all(payload.as_bytes()).await;
                // drop closes the pipe, delivering EOF to the child
            });
        }

        let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
        let mut stderr_pipe = child.stderr.take().expect("stderr was piped");

        let (stop_tx, stop_rx) = oneshot::channel();
        let monitor_handle = match child_pid {
            Some(pid) => Some(tokio::spawn(monitor::watch_memory(
                pid,
                effective_memory,
                stop_rx,
            ))),
            None => None,
        };

        let start = Instant::now();
        let read_future = async {
            let mut stdout_buf = Vec::new();
            let mut stderr_buf = Vec::new();
            let (stdout_res, stderr_res) = tokio::join!(
                stdout_pipe.read_to_end(&mut stdout_buf),
                stderr_pipe.read_to_end(&mut stderr_buf)
            );
            stdout_res.ok();
            stderr_res.ok();
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((stdout_buf, stderr_buf, status))
        };

        match tokio::time::timeout(timeout, read_future).await {
            Err(_) => {
                // Deadline hit: kill the whole group, then let the monitor
                // unwind (it'll see the process gone and return quickly).
                if let Some(pid) = child_pid {
                    unsafe {
                        libc::kill(-(pid as i32), libc::SIGKILL);
                    }
                }
                let _ = stop_tx.send(());
                if let Some(handle) = monitor_handle {
                    let _ = handle.await;
                }
                let runtime_ms = start.elapsed().as_secs_f64() * 1000.0;
                Ok(Outcome {
                    verdict: Verdict::TimeLimitExceeded,
                    stdout: String::new(),
                    stderr: String::new(),
                    compiler_msg: String::new(),
                    runtime_ms,
                    memory_bytes: 0,
                })
            }
            Ok(Err(e)) => Err(WorkerError::Sandbox(format!("failed to run program: {e}"))),
            Ok(Ok((stdout_buf, stderr_buf, status))) => {
                let runtime_ms = start.elapsed().as_secs_f64() * 1000.0;
                let _ = stop_tx.send(());
                let (mem_killed, peak) = match monitor_handle {
                    Some(handle) => handle.await.unwrap_or((false, 0)),
                    None => (false, 0),
                };

                let stderr_text = String::from_utf8_lossy(&stderr_buf).into_owned();

                if mem_killed
                    || MEMORY_ERROR_MARKERS
                        .iter()
                        .any(|marker| stderr_text.contains(marker))
                {
                    return Ok(Outcome {
                        verdict: Verdict::MemoryLimitExceeded,
                        stdout: String::new(),
                        stderr: stderr_text,
                        compiler_msg: String::new(),
                        runtime_ms,
                        memory_bytes: peak,
                    });
                }

                if !status.success() {
                    return Ok(Outcome {
                        verdict: Verdict::RuntimeError,
                        stdout: String::new(),
                        stderr: stderr_text,
                        compiler_msg: String::new(),
                        runtime_ms,
                        memory_bytes: peak,
                    });
                }

                let stdout_text = String::from_utf8_lossy(&stdout_buf).trim().to_string();
                Ok(Outcome {
                    verdict: Verdict::Ok,
                    stdout: stdout_text,
                    stderr: stderr_text,
                    compiler_msg: String::new(),
                    runtime_ms,
                    memory_bytes: peak,
                })
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn apply_address_space_limit(cmd: &mut Command, limit_bytes: u64) {
    use std::os::unix::process::CommandExt;

    unsafe {
        cmd.pre_exec(move || {
            let limit = libc::rlimit {
                rlim_cur: limit_bytes,
                rlim_max: limit_bytes,
            };
            // Non-fatal if this fails: the RSS monitor still enforces the
            // ceiling. Avoid anything beyond async-signal-safe calls here —
            // this closure runs in the child between fork and exec.
            let _ = libc::setrlimit(libc::RLIMIT_AS, &limit);
            Ok(())
        });
    }
}
