use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::{CommandSpec, ExecError, run_command};

/// Reads revisions from a working copy (`git`).
#[derive(Debug, Clone)]
pub struct VersionControl {
    binary: String,
    repo: Option<PathBuf>,
}

impl VersionControl {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            repo: None,
        }
    }

    pub fn in_repo(mut self, repo: impl Into<PathBuf>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    /// Commit id of `HEAD`; an empty answer is an error.
    pub async fn head_revision(&self, cancel: &CancellationToken) -> Result<String, ExecError> {
        let mut spec = CommandSpec::new(&self.binary).args(["rev-parse", "HEAD"]);
        if let Some(repo) = &self.repo {
            spec = spec.cwd(repo);
        }
        let out = run_command(&spec, cancel).await?;
        if out.output.is_empty() {
            return Err(ExecError::SubprocessFailed {
                program: self.binary.clone(),
                code: Some(out.code),
                output: "empty revision".into(),
            });
        }
        Ok(out.output)
    }
}
