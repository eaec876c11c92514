//! Local port-forward to the in-cluster registry service.
use std::{
    collections::VecDeque,
    path::Path,
    process::Stdio,
    time::{Duration, Instant},
};

use ephreg_model::constants::REGISTRY_PORT;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpStream,
    process::{Child, ChildStderr, Command},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ExecError;

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
const STOP_GRACE: Duration = Duration::from_secs(2);

/// stderr lines kept for the error of a child that exits during startup.
const STDERR_TAIL: usize = 20;

struct Session {
    child: Child,
    started: Instant,
    _stderr: Option<JoinHandle<String>>,
}

/// Owns one forwarding child process bound to a fixed local port.
///
/// `start` returns once `127.0.0.1:<local_port>` accepts connections. The
/// child is killed when the manager is dropped.
pub struct PortForward {
    program: String,
    args: Vec<String>,
    local_port: u16,
    poll_interval: Duration,
    startup_timeout: Duration,
    session: Option<Session>,
}

impl PortForward {
    /// `kubectl port-forward -n <namespace> svc/<service> <local>:5000`.
    pub fn kubectl(
        kubectl: &str,
        kubeconfig: &Path,
        namespace: &str,
        service: &str,
        local_port: u16,
    ) -> Self {
        let args = vec![
            "port-forward".to_string(),
            "-n".to_string(),
            namespace.to_string(),
            format!("svc/{service}"),
            format!("{local_port}:{REGISTRY_PORT}"),
            "--kubeconfig".to_string(),
            kubeconfig.display().to_string(),
        ];
        Self::with_command(kubectl, args, local_port)
    }

    /// Forward through an arbitrary command that listens on `local_port`.
    pub fn with_command<I, S>(program: impl Into<String>, args: I, local_port: u16) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            local_port,
            poll_interval: POLL_INTERVAL,
            startup_timeout: STARTUP_TIMEOUT,
            session: None,
        }
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Time since the forward became reachable.
    pub fn uptime(&self) -> Option<Duration> {
        self.session.as_ref().map(|s| s.started.elapsed())
    }

    /// Spawn the child and wait until the local port accepts connections.
    ///
    /// A no-op when already running.
    pub async fn start(&mut self, cancel: &CancellationToken) -> Result<(), ExecError> {
        if self.session.is_some() {
            return Ok(());
        }

        debug!(program = %self.program, args = ?self.args, "starting port-forward");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        // kubectl reports every failed connection on stderr for as long as it
        // runs; the pipe is drained so it never fills up and stalls the child.
        let mut stderr = child.stderr.take().map(|s| tokio::spawn(drain_stderr(s)));

        let begun = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                let output = match stderr.take() {
                    Some(task) => task.await.unwrap_or_default(),
                    None => String::new(),
                };
                return Err(ExecError::SubprocessFailed {
                    program: self.program.clone(),
                    code: status.code(),
                    output,
                });
            }

            if TcpStream::connect(("127.0.0.1", self.local_port)).await.is_ok() {
                info!(port = self.local_port, "port-forward ready");
                self.session = Some(Session {
                    child,
                    started: Instant::now(),
                    _stderr: stderr,
                });
                return Ok(());
            }

            if begun.elapsed() >= self.startup_timeout {
                terminate(&mut child).await;
                return Err(ExecError::PortForwardTimeout {
                    port: self.local_port,
                    after: self.startup_timeout,
                });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    terminate(&mut child).await;
                    return Err(ExecError::Cancelled(self.program.clone()));
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Stop the child. Idempotent and infallible.
    pub async fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            terminate(&mut session.child).await;
            debug!(port = self.local_port, "port-forward stopped");
        }
    }
}

/// Log every stderr line and return the last [`STDERR_TAIL`] once the pipe
/// closes.
async fn drain_stderr(stderr: ChildStderr) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL);
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(line = %line, "port-forward stderr");
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("\n").trim().to_string()
}

/// SIGTERM, wait out the grace period, then SIGKILL.
async fn terminate(child: &mut Child) {
    if send_sigterm(child) {
        if let Ok(Ok(_)) = tokio::time::timeout(STOP_GRACE, child.wait()).await {
            return;
        }
    }
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill port-forward child");
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    // SAFETY: `pid` belongs to a child that has not been reaped yet.
    unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn send_sigterm(_: &Child) -> bool {
    false
}
