//! Subprocess boundary for external tools.
//!
//! Every external tool invocation goes through [`run_command`]: the child's
//! stdout and stderr are captured together and a non-zero exit, a timeout or
//! a cancellation turns into an [`ExecError`].
mod spec;
pub use spec::{CommandOutput, CommandSpec};

use std::process::Stdio;

use tokio::{io::AsyncWriteExt, process::Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::ExecError;

/// Run `spec` to completion.
///
/// The child is killed when `cancel` fires or the command's timeout elapses.
pub async fn run_command(
    spec: &CommandSpec,
    cancel: &CancellationToken,
) -> Result<CommandOutput, ExecError> {
    spec.validate()?;
    trace!(
        program = %spec.program(),
        args = ?spec.argv(),
        cwd = ?spec.working_dir(),
        env_len = spec.env_vars().len(),
        "spawning subprocess"
    );

    let mut cmd = Command::new(spec.program());
    cmd.args(spec.argv())
        .stdin(if spec.input().is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = spec.working_dir() {
        cmd.current_dir(cwd);
    }
    for kv in spec.env_vars().iter() {
        cmd.env(kv.key(), kv.value());
    }

    let mut child = cmd.spawn()?;
    if let (Some(input), Some(mut stdin)) = (spec.input(), child.stdin.take()) {
        stdin.write_all(input.as_bytes()).await?;
        // Close stdin so tools reading until EOF (`--password-stdin`) proceed.
        drop(stdin);
    }

    let timeout = spec.time_limit();
    let output = tokio::select! {
        res = child.wait_with_output() => res?,
        _ = cancel.cancelled() => {
            debug!(program = %spec.program(), "cancellation requested; killing subprocess");
            return Err(ExecError::Cancelled(spec.program().to_string()));
        }
        _ = sleep_or_forever(timeout) => {
            return Err(ExecError::SubprocessFailed {
                program: spec.program().to_string(),
                code: None,
                output: format!("timed out after {:?}", timeout.unwrap_or_default()),
            });
        }
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&stderr);
    }
    let combined = combined.trim().to_string();

    if !output.status.success() {
        return Err(ExecError::SubprocessFailed {
            program: spec.program().to_string(),
            code: output.status.code(),
            output: combined,
        });
    }

    debug!(program = %spec.program(), "subprocess exited successfully");
    Ok(CommandOutput {
        code: output.status.code().unwrap_or(0),
        output: combined,
    })
}

async fn sleep_or_forever(timeout: Option<std::time::Duration>) {
    match timeout {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use std::time::Duration;

    #[tokio::test]
    async fn captures_stdout_and_stderr_trimmed() {
        let spec = CommandSpec::new("sh").args(["-c", "echo out; echo err >&2"]);
        let out = run_command(&spec, &CancellationToken::new()).await.unwrap();
        assert_eq!(out.code, 0);
        assert_eq!(out.output, "out\nerr");
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_failure() {
        let spec = CommandSpec::new("sh").args(["-c", "echo nope >&2; exit 3"]);
        match run_command(&spec, &CancellationToken::new()).await {
            Err(ExecError::SubprocessFailed { code, output, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(output, "nope");
            }
            other => panic!("expected SubprocessFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stdin_is_forwarded() {
        let spec = CommandSpec::new("cat").stdin("s3cret");
        let out = run_command(&spec, &CancellationToken::new()).await.unwrap();
        assert_eq!(out.output, "s3cret");
    }

    #[tokio::test]
    async fn env_and_cwd_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo $EPHREG_TEST_VAR; pwd"])
            .env("EPHREG_TEST_VAR", "hello")
            .cwd(dir.path());
        let out = run_command(&spec, &CancellationToken::new()).await.unwrap();
        let mut lines = out.output.lines();
        assert_eq!(lines.next(), Some("hello"));
        let cwd = std::fs::canonicalize(lines.next().unwrap()).unwrap();
        assert_eq!(cwd, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let spec = CommandSpec::new("sleep")
            .arg("30")
            .timeout(Duration::from_millis(100));
        let err = run_command(&spec, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::SubprocessFailed { code: None, .. }));
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = run_command(&CommandSpec::new("sleep").arg("30"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Cancelled(p) if p == "sleep"));
    }

    #[tokio::test]
    async fn missing_binary_is_an_io_error() {
        let spec = CommandSpec::new("ephreg-definitely-not-installed");
        let err = run_command(&spec, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ExecError::Io(_)));
    }
}
