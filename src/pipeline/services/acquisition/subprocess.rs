use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

/// Captured output is truncated past this many bytes per stream.
const MAX_OUTPUT_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    /// Lines the tool flagged as warnings on stderr.
    pub fn warnings(&self) -> impl Iterator<Item = &str> + '_ {
        self.stderr
            .lines()
            .map(str::trim)
            .filter(|line| line.to_ascii_lowercase().starts_with("warning"))
    }
}

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with code {code}: {stderr}")]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },
    #[error("{program} did not finish within {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
}

/// Run an external tool to completion, capturing stdout and stderr.
///
/// The child is killed if `timeout` elapses. A non-zero exit is an error
/// carrying the tail of stderr.
pub async fn run_tool(cmd: &mut Command, timeout: Duration) -> Result<ToolOutput, ToolError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
        program: program.clone(),
        source,
    })?;

    let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(source)) => return Err(ToolError::Spawn { program, source }),
        // child is dropped here and killed
        Err(_) => return Err(ToolError::Timeout { program, timeout }),
    };

    let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();
    let elapsed = start.elapsed();

    debug!("{} finished in {:?} with {}", program, elapsed, status);

    if !status.success() {
        return Err(ToolError::Failed {
            program,
            code: status.code().unwrap_or(-1),
            stderr: tail(&stderr, 500),
        });
    }

    Ok(ToolOutput {
        stdout,
        stderr,
        elapsed,
    })
}

async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let _ = h.take(MAX_OUTPUT_BYTES).read_to_end(&mut buf).await;
    }
    buf
}

fn tail(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - max_chars).collect()
}
