use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("'{program}' failed ({}): {output}", exit_label(.code))]
    SubprocessFailed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("port-forward on 127.0.0.1:{port} not reachable after {after:?}")]
    PortForwardTimeout { port: u16, after: Duration },

    #[error("'{0}' cancelled")]
    Cancelled(String),

    #[error("invalid command: {0}")]
    InvalidSpec(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("hosts file {path}: {reason}")]
    Hosts { path: String, reason: String },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated".to_string(),
    }
}
