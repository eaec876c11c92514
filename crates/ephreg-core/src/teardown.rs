//! Best-effort removal of everything a run created.
//!
//! Steps are independent and run concurrently. A failing step is logged and
//! recorded; it never stops the others. Objects that are already gone count
//! as removed, so teardown after a partial or crashed setup is safe.
use std::{fmt, path::PathBuf, sync::Arc};

use ephreg_model::{Labels, RunNames, constants::LABEL_PULL_SECRET};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    cluster::{ClusterHandle, ObjectKey, ObjectKind, delete_if_present},
    error::CoreError,
    installer::{ControllerInstaller, InstallError},
    metrics::{MetricsHandle, noop_metrics},
};

// Step labels, used in failures and the teardown error metric.
pub const STEP_PULL_SECRETS: &str = "pull-secrets";
pub const STEP_NAMESPACE: &str = "namespace";
pub const STEP_CONTROLLER: &str = "controller";
pub const STEP_ARTIFACTS: &str = "artifacts";

/// One teardown step that did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub step: &'static str,
    pub target: String,
    pub reason: String,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.step, self.target, self.reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    failures: Vec<TeardownFailure>,
    removed: Vec<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }

    /// Targets that existed and were removed.
    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    pub fn into_result(self) -> Result<(), CoreError> {
        if self.is_clean() {
            Ok(())
        } else {
            Err(CoreError::Teardown(self))
        }
    }

    fn merge(&mut self, other: TeardownReport) {
        self.failures.extend(other.failures);
        self.removed.extend(other.removed);
    }

    fn fail(&mut self, step: &'static str, target: impl Into<String>, reason: impl ToString) {
        let failure = TeardownFailure {
            step,
            target: target.into(),
            reason: reason.to_string(),
        };
        warn!(step, target = %failure.target, reason = %failure.reason, "teardown step failed");
        self.failures.push(failure);
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "clean ({} removed)", self.removed.len());
        }
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

/// Best-effort removal of everything a run created.
///
/// Every step runs even when another fails; [`TeardownSequencer::run`] never
/// returns early and reports each failure in the [`TeardownReport`].
pub struct TeardownSequencer {
    cluster: ClusterHandle,
    names: RunNames,
    installer: Option<Arc<dyn ControllerInstaller>>,
    artifacts: Vec<PathBuf>,
    metrics: MetricsHandle,
}

impl TeardownSequencer {
    pub fn new(cluster: ClusterHandle, names: RunNames) -> Self {
        Self {
            cluster,
            names,
            installer: None,
            artifacts: Vec::new(),
            metrics: noop_metrics(),
        }
    }

    /// Uninstall this controller as part of teardown.
    pub fn with_installer(mut self, installer: Arc<dyn ControllerInstaller>) -> Self {
        self.installer = Some(installer);
        self
    }

    /// Register a local file or directory to remove.
    pub fn with_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts.push(path.into());
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    #[instrument(level = "info", skip_all, fields(namespace = self.names.namespace()))]
    pub async fn run(&self) -> TeardownReport {
        let (secrets, namespace, controller, artifacts) = tokio::join!(
            self.delete_pull_secrets(),
            self.delete_namespace(),
            self.uninstall_controller(),
            self.remove_artifacts(),
        );

        let mut report = TeardownReport::default();
        for part in [secrets, namespace, controller, artifacts] {
            report.merge(part);
        }
        for failure in &report.failures {
            self.metrics.record_teardown_error(failure.step);
        }

        if report.is_clean() {
            info!(removed = report.removed.len(), "teardown complete");
        } else {
            warn!(failures = report.failures.len(), "teardown finished with failures");
        }
        report
    }

    async fn delete_pull_secrets(&self) -> TeardownReport {
        let mut report = TeardownReport::default();
        let mut selector = Labels::new();
        selector.insert(LABEL_PULL_SECRET, "true");

        let keys = match self.cluster.list(ObjectKind::Secret, None, &selector).await {
            Ok(keys) => keys,
            Err(e) => {
                report.fail(STEP_PULL_SECRETS, selector.to_selector(), e);
                return report;
            }
        };
        for key in keys {
            self.delete(STEP_PULL_SECRETS, &key, &mut report).await;
        }
        report
    }

    async fn delete_namespace(&self) -> TeardownReport {
        let mut report = TeardownReport::default();
        let key = ObjectKey::namespace(self.names.namespace());
        self.delete(STEP_NAMESPACE, &key, &mut report).await;
        report
    }

    async fn uninstall_controller(&self) -> TeardownReport {
        let mut report = TeardownReport::default();
        let Some(installer) = &self.installer else {
            return report;
        };
        // Teardown runs to completion once started.
        match installer.uninstall(&CancellationToken::new()).await {
            Ok(()) => report.removed.push(installer.name().to_string()),
            Err(InstallError::NotInstalled(name)) => debug!(controller = %name, "not installed"),
            Err(e) => report.fail(STEP_CONTROLLER, installer.name(), e),
        }
        report
    }

    async fn remove_artifacts(&self) -> TeardownReport {
        let mut report = TeardownReport::default();
        for path in &self.artifacts {
            let removed = match tokio::fs::metadata(path).await {
                Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
                Ok(_) => tokio::fs::remove_file(path).await,
                Err(e) => Err(e),
            };
            match removed {
                Ok(()) => report.removed.push(path.display().to_string()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "artifact already gone");
                }
                Err(e) => report.fail(STEP_ARTIFACTS, path.display().to_string(), e),
            }
        }
        report
    }

    async fn delete(&self, step: &'static str, key: &ObjectKey, report: &mut TeardownReport) {
        match delete_if_present(self.cluster.as_ref(), key).await {
            Ok(true) => report.removed.push(key.to_string()),
            Ok(false) => {}
            Err(e) => report.fail(step, key.to_string(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::Ordering;

    use ephreg_model::Credentials;
    use tokio_util::sync::CancellationToken;

    use crate::{
        cluster::{ClusterError, ClusterObject, InMemoryCluster},
        pipeline::SetupPipeline,
        stage::credentials::create_pull_secret,
        testing::FakeInstaller,
    };

    fn names() -> RunNames {
        RunNames::new("reg").unwrap()
    }

    #[tokio::test]
    async fn missing_namespace_is_success() {
        let cluster = Arc::new(InMemoryCluster::new());
        let report = TeardownSequencer::new(cluster, names()).run().await;

        assert!(report.is_clean());
        assert!(report.removed().is_empty());
        report.into_result().unwrap();
    }

    #[tokio::test]
    async fn removes_everything_setup_created() {
        let dir = tempfile::tempdir().unwrap();
        let creds_file = dir.path().join("credentials.yaml");
        let tls_dir = dir.path().join("tls");
        std::fs::create_dir_all(&tls_dir).unwrap();
        std::fs::write(tls_dir.join("ca.crt"), b"CA").unwrap();

        let cluster = Arc::new(InMemoryCluster::new());
        let installer = Arc::new(FakeInstaller::default());
        let pipeline = SetupPipeline::registry(
            cluster.clone(),
            names(),
            installer.clone(),
            &creds_file,
            "registry:2",
        );
        pipeline
            .run(&CancellationToken::new())
            .await
            .unwrap();

        cluster.insert(ClusterObject::namespace("apps")).unwrap();
        create_pull_secret(cluster.as_ref(), &names(), &Credentials::generate(), "apps")
            .await
            .unwrap();

        let report = TeardownSequencer::new(cluster.clone(), names())
            .with_installer(installer.clone())
            .with_artifact(&creds_file)
            .with_artifact(&tls_dir)
            .run()
            .await;

        assert!(report.is_clean(), "{report}");
        assert!(!creds_file.exists());
        assert!(!tls_dir.exists());
        assert_eq!(installer.uninstalls.load(Ordering::SeqCst), 1);
        // Only the unrelated namespace remains.
        assert_eq!(cluster.len(), 1);
        assert!(cluster.contains(&ObjectKey::namespace("apps")));
    }

    #[tokio::test]
    async fn failures_are_collected_without_stopping_other_steps() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("credentials.yaml");
        std::fs::write(&artifact, b"x").unwrap();

        let cluster = Arc::new(InMemoryCluster::new());
        cluster.insert(ClusterObject::namespace("reg")).unwrap();
        cluster.fail_delete(ObjectKind::Namespace, ClusterError::api("ns", "forbidden"));

        let report = TeardownSequencer::new(cluster, names())
            .with_installer(Arc::new(FakeInstaller::failing_uninstall()))
            .with_artifact(&artifact)
            .run()
            .await;

        let steps: Vec<_> = report.failures().iter().map(|f| f.step).collect();
        assert_eq!(steps, vec![STEP_NAMESPACE, STEP_CONTROLLER]);
        assert!(!artifact.exists());
        assert!(matches!(report.into_result(), Err(CoreError::Teardown(_))));
    }

    #[tokio::test]
    async fn missing_artifacts_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let report = TeardownSequencer::new(Arc::new(InMemoryCluster::new()), names())
            .with_artifact(dir.path().join("never-written"))
            .run()
            .await;
        assert!(report.is_clean());
    }
}
