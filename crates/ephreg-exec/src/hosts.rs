use std::{
    io::ErrorKind,
    net::IpAddr,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::ExecError;

/// Static host entries in an `/etc/hosts`-style file.
///
/// Only single-host lines of the form `<ip> <host>` are added or removed;
/// everything else in the file is left as it was.
#[derive(Debug, Clone)]
pub struct HostsFile {
    path: PathBuf,
}

impl HostsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `<ip> <host>` unless that exact entry exists. Returns whether
    /// the file changed.
    pub async fn add(&self, ip: IpAddr, host: &str) -> Result<bool, ExecError> {
        let contents = self.read().await?;
        let ip = ip.to_string();
        if contents.lines().any(|line| is_entry(line, Some(&ip), host)) {
            debug!(host, "hosts entry already present");
            return Ok(false);
        }

        let mut updated = contents;
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str(&format!("{ip} {host}\n"));
        self.write(&updated).await?;
        info!(host, ip = %ip, path = %self.path.display(), "hosts entry added");
        Ok(true)
    }

    /// Remove every single-host line for `host`. Returns whether the file
    /// changed; a missing file counts as nothing to remove.
    pub async fn remove(&self, host: &str) -> Result<bool, ExecError> {
        let contents = self.read().await?;
        let kept: Vec<&str> = contents
            .lines()
            .filter(|line| !is_entry(line, None, host))
            .collect();
        if kept.len() == contents.lines().count() {
            return Ok(false);
        }

        let mut updated = kept.join("\n");
        if !updated.is_empty() {
            updated.push('\n');
        }
        self.write(&updated).await?;
        info!(host, path = %self.path.display(), "hosts entry removed");
        Ok(true)
    }

    async fn read(&self) -> Result<String, ExecError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(self.error(e)),
        }
    }

    async fn write(&self, contents: &str) -> Result<(), ExecError> {
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| self.error(e))
    }

    fn error(&self, e: std::io::Error) -> ExecError {
        ExecError::Hosts {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

fn is_entry(line: &str, ip: Option<&str>, host: &str) -> bool {
    let mut fields = line.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(addr), Some(name), None) => {
            !addr.starts_with('#') && name == host && ip.is_none_or(|ip| ip == addr)
        }
        _ => false,
    }
}
