// src/exec/command.rs

//! Shell-command task bodies and handlers used by chain files.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use tracing::{debug, error, info};

use crate::chain::TaskResult;
use crate::engine::Rejector;
use crate::errors::{Result, StagechainError, TaskError};

/// Environment variable carrying the rejection message into an
/// `on_failure` command.
pub const ERROR_ENV_VAR: &str = "STAGECHAIN_ERROR";

/// Build a shell command appropriate for the platform.
pub fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Run `cmd` to completion on the calling thread.
///
/// Stdout is inherited so task output reaches the terminal; stderr is
/// consumed line by line and logged at debug. A non-zero exit is reported as
/// [`StagechainError::CommandFailed`].
pub fn run_shell(cmd: &str, envs: &[(&str, &str)]) -> Result<()> {
    info!(cmd = %cmd, "starting command");

    let mut command = shell_command(cmd);
    command
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped());

    let mut child = command.spawn()?;

    if let Some(stderr) = child.stderr.take() {
        for line in BufReader::new(stderr).lines().map_while(std::result::Result::ok) {
            debug!(cmd = %cmd, "stderr: {}", line);
        }
    }

    let status = child.wait()?;
    let code = status.code().unwrap_or(-1);

    info!(
        cmd = %cmd,
        exit_code = code,
        success = status.success(),
        "command exited"
    );

    if status.success() {
        Ok(())
    } else {
        Err(StagechainError::CommandFailed {
            cmd: cmd.to_string(),
            code,
        })
    }
}

/// A task that runs `cmd` and fails the run on a non-zero exit.
pub fn shell_task(cmd: String) -> impl FnOnce(&Rejector) -> TaskResult + Send + 'static {
    move |_| run_shell(&cmd, &[]).map_err(TaskError::from)
}

/// A failure handler that runs `cmd` with the error text in
/// [`ERROR_ENV_VAR`].
pub fn shell_failure_handler(cmd: String) -> impl Fn(TaskError) + Send + Sync + 'static {
    move |err| {
        let message = format!("{err:#}");
        if let Err(e) = run_shell(&cmd, &[(ERROR_ENV_VAR, message.as_str())]) {
            error!(cmd = %cmd, error = %e, "on_failure command failed");
        }
    }
}

/// A success handler that runs `cmd`.
pub fn shell_success_handler(cmd: String) -> impl Fn() + Send + Sync + 'static {
    move || {
        if let Err(e) = run_shell(&cmd, &[]) {
            error!(cmd = %cmd, error = %e, "on_success command failed");
        }
    }
}
