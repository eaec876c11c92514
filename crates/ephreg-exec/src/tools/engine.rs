use std::path::PathBuf;

use ephreg_model::{Credentials, Env};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{CommandSpec, ExecError, run_command};

/// Container image tool (`docker`).
#[derive(Debug, Clone)]
pub struct ContainerEngine {
    binary: String,
    env: Env,
}

impl ContainerEngine {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            env: Env::new(),
        }
    }

    /// Keep login state in `dir` instead of the user's own client config.
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.env
            .push("DOCKER_CONFIG", dir.into().display().to_string());
        self
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.binary).envs(&self.env)
    }

    /// Password goes through stdin, never the argument list.
    pub fn login_spec(&self, registry: &str, creds: &Credentials) -> CommandSpec {
        self.command()
            .args(["login", registry, "--username", creds.username.as_str(), "--password-stdin"])
            .stdin(creds.password.clone())
    }

    /// Log in to `registry`. The password goes through stdin, never argv.
    pub async fn login(
        &self,
        registry: &str,
        creds: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<(), ExecError> {
        run_command(&self.login_spec(registry, creds), cancel).await?;
        info!(registry, "logged in");
        Ok(())
    }

    pub async fn tag(
        &self,
        source: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ExecError> {
        run_command(&self.command().args(["tag", source, target]), cancel).await?;
        Ok(())
    }

    /// Push `image`; the engine must already trust the registry's CA.
    pub async fn push(&self, image: &str, cancel: &CancellationToken) -> Result<(), ExecError> {
        run_command(&self.command().args(["push", image]), cancel).await?;
        info!(image, "pushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials {
            username: "u".into(),
            password: "hunter2".into(),
        }
    }

    #[test]
    fn password_is_not_an_argument() {
        let spec = ContainerEngine::new("docker").login_spec("localhost:5000", &creds());

        assert!(spec.argv().iter().all(|a| a != "hunter2"));
        assert_eq!(spec.input(), Some("hunter2"));
        assert_eq!(
            spec.to_string(),
            "docker login localhost:5000 --username u --password-stdin"
        );
        assert!(spec.env_vars().is_empty());
    }

    #[test]
    fn config_dir_reaches_every_command() {
        let engine = ContainerEngine::new("docker").with_config_dir("/work/docker");
        let spec = engine.login_spec("localhost:5000", &creds());

        assert_eq!(spec.env_vars().get("DOCKER_CONFIG"), Some("/work/docker"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn commands_carry_isolated_config() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("seen");
        let script = format!("echo \"$DOCKER_CONFIG $1 $2 $3\" > {}", out.display());
        // `sh -c <script> <argv0> tag src dst`
        let engine = ContainerEngine {
            binary: "sh".into(),
            env: Env::new().with("DOCKER_CONFIG", "/isolated"),
        };
        let spec = engine
            .command()
            .args(["-c", script.as_str(), "sh", "tag", "src", "dst"]);

        run_command(&spec, &CancellationToken::new()).await.unwrap();
        let seen = std::fs::read_to_string(&out).unwrap();
        assert_eq!(seen.trim(), "/isolated tag src dst");
    }
}
