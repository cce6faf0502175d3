// src/exec/command.rs

//! Individual task process runner.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::engine::TaskOutcome;

/// Run `cmd` through the platform shell in `cwd` and wait for it to exit.
///
/// stdout is logged at info, stderr at debug, line by line.
pub async fn run_shell_command(task: &str, cmd: &str, cwd: &Path) -> Result<TaskOutcome> {
    info!(task, cmd, "starting task process");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", task))?;

    let stdout = child.stdout.take().map(|out| forward_lines(task, "stdout", out));
    let stderr = child.stderr.take().map(|err| forward_lines(task, "stderr", err));

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of task '{}'", task))?;

    // Drain the pipes so trailing output is not lost.
    for reader in [stdout, stderr].into_iter().flatten() {
        let _ = reader.await;
    }

    let code = status.code().unwrap_or(-1);
    info!(task, exit_code = code, success = status.success(), "task process exited");

    Ok(if status.success() {
        TaskOutcome::Success
    } else {
        TaskOutcome::Failed(code)
    })
}

fn forward_lines<R>(task: &str, stream: &'static str, reader: R) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let task = task.to_string();
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if stream == "stdout" {
                info!(task = %task, "{}", line);
            } else {
                debug!(task = %task, "stderr: {}", line);
            }
        }
    })
}
