//! Concurrent setup of the registry.
//!
//! [`SetupPipeline`] spawns every registered stage at once on a fresh
//! [`ValueStore`]. Stages block only on the keys they read, so ordering
//! follows from data dependencies. The first failing stage cancels the shared
//! token, which unblocks siblings still waiting on values that will never
//! arrive; their cancellations are dropped from the aggregated error.
use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use ephreg_model::{ProvisionConfig, RunNames};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    cluster::{ClusterHandle, ClusterObject, ensure_created},
    error::{CoreError, StageErrors, StageFailure},
    installer::ControllerInstaller,
    metrics::{MetricsHandle, StageOutcome, noop_metrics},
    readiness::{DeploymentStatus, ReadinessError, ReadinessPoller},
    stage::{
        CredentialStage, DeploymentStage, RegistryConfigStage, Stage, StageContext, StageError,
        TlsStage,
    },
    store::ValueStore,
};

/// Ordered set of stages run concurrently against one cluster and one run's
/// names.
///
/// Registration order only decides the order results are collected in; stages
/// still start together and wait on each other through the store.
pub struct SetupPipeline {
    cluster: ClusterHandle,
    names: RunNames,
    stages: Vec<Arc<dyn Stage>>,
    metrics: MetricsHandle,
}

impl SetupPipeline {
    /// Pipeline without stages.
    pub fn new(cluster: ClusterHandle, names: RunNames) -> Self {
        Self {
            cluster,
            names,
            stages: Vec::new(),
            metrics: noop_metrics(),
        }
    }

    /// Pipeline with the four registry stages.
    pub fn registry(
        cluster: ClusterHandle,
        names: RunNames,
        installer: Arc<dyn ControllerInstaller>,
        credentials_file: impl Into<PathBuf>,
        image: impl Into<String>,
    ) -> Self {
        let mut pipeline = Self::new(cluster, names);
        pipeline.register(Arc::new(CredentialStage::new(credentials_file)));
        pipeline.register(Arc::new(TlsStage::new(installer)));
        pipeline.register(Arc::new(RegistryConfigStage));
        pipeline.register(Arc::new(DeploymentStage::new(image)));
        pipeline
    }

    /// [`SetupPipeline::registry`] configured from `config`.
    pub fn from_config(
        config: &ProvisionConfig,
        cluster: ClusterHandle,
        installer: Arc<dyn ControllerInstaller>,
    ) -> Result<Self, CoreError> {
        let names = config.names()?;
        Ok(Self::registry(
            cluster,
            names,
            installer,
            config.credentials_file(),
            config.registry_image.clone(),
        ))
    }

    /// Add a stage. Stages sharing a name are allowed, but their failures are
    /// then indistinguishable in [`StageErrors`].
    pub fn register(&mut self, stage: Arc<dyn Stage>) {
        self.stages.push(stage);
    }

    /// Record stage starts, outcomes and durations on `metrics`.
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn names(&self) -> &RunNames {
        &self.names
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Create the namespace, then run every stage concurrently.
    ///
    /// Returns the store holding everything the stages published.
    #[instrument(level = "info", skip_all, fields(namespace = self.names.namespace()))]
    pub async fn run(&self, cancel: &CancellationToken) -> Result<Arc<ValueStore>, CoreError> {
        ensure_created(
            self.cluster.as_ref(),
            ClusterObject::namespace(self.names.namespace()),
        )
        .await?;

        let store = Arc::new(ValueStore::for_provisioning());
        let shared = cancel.child_token();
        let ctx = StageContext::new(
            Arc::clone(&store),
            Arc::clone(&self.cluster),
            self.names.clone(),
        )
        .with_cancel(shared.clone());

        let handles: Vec<(&'static str, JoinHandle<Result<(), StageError>>)> = self
            .stages
            .iter()
            .map(|stage| (stage.name(), self.spawn_stage(Arc::clone(stage), ctx.clone())))
            .collect();

        let mut failures = Vec::new();
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => failures.push(StageFailure { stage: name, error }),
                Err(join) => {
                    error!(stage = name, error = %join, "stage task aborted");
                    failures.push(StageFailure {
                        stage: name,
                        error: StageError::Aborted(join.to_string()),
                    });
                }
            }
        }

        if failures.is_empty() {
            info!(stages = self.stages.len(), "all stages completed");
            return Ok(store);
        }

        store.close();
        if failures.iter().all(|f| f.error.is_cancelled()) {
            return Err(CoreError::Cancelled);
        }
        failures.retain(|f| !f.error.is_cancelled());
        Err(CoreError::Stages(StageErrors(failures)))
    }

    /// [`SetupPipeline::run`], then wait up to `readiness_timeout` for the
    /// registry workload to report a ready replica.
    pub async fn provision(
        &self,
        readiness_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Arc<ValueStore>, CoreError> {
        let store = self.run(cancel).await?;

        let status = DeploymentStatus::new(
            Arc::clone(&self.cluster),
            self.names.namespace(),
            self.names.deployment(),
        );
        wait_ready(ReadinessPoller::new(status), readiness_timeout, cancel).await?;
        Ok(store)
    }

    fn spawn_stage(
        &self,
        stage: Arc<dyn Stage>,
        ctx: StageContext,
    ) -> JoinHandle<Result<(), StageError>> {
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            let name = stage.name();
            // Cancels siblings when this task fails or panics.
            let guard = ctx.cancel().clone().drop_guard();
            metrics.record_stage_started(name);
            debug!(stage = name, "stage started");

            let started = Instant::now();
            let result = stage.run(&ctx).await;
            let elapsed = started.elapsed().as_millis() as u64;

            match &result {
                Ok(()) => {
                    guard.disarm();
                    metrics.record_stage_completed(name, StageOutcome::Success, elapsed);
                    info!(stage = name, elapsed_ms = elapsed, "stage completed");
                }
                Err(e) if e.is_cancelled() => {
                    metrics.record_stage_completed(name, StageOutcome::Canceled, elapsed);
                    debug!(stage = name, "stage cancelled");
                }
                Err(e) => {
                    metrics.record_stage_completed(name, StageOutcome::Failure, elapsed);
                    warn!(stage = name, error = %e, "stage failed; cancelling siblings");
                }
            }
            result
        })
    }
}

/// Poll readiness until `timeout` elapses or `cancel` fires.
pub async fn wait_ready<S>(
    mut poller: ReadinessPoller<S>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), CoreError>
where
    S: crate::readiness::StatusSource,
{
    let deadline = cancel.child_token();
    let timer = {
        let deadline = deadline.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            deadline.cancel();
        })
    };

    let result = poller.poll_until_ready(&deadline).await;
    timer.abort();

    match result {
        Ok(()) => Ok(()),
        Err(ReadinessError::Cancelled { .. }) if cancel.is_cancelled() => Err(CoreError::Cancelled),
        Err(ReadinessError::Cancelled { polls }) => {
            warn!(polls, ?timeout, "registry did not become ready in time");
            Err(CoreError::ReadinessTimeout(timeout))
        }
        Err(e) => Err(e.into()),
    }
}

impl std::fmt::Debug for SetupPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetupPipeline")
            .field("namespace", &self.names.namespace())
            .field("stages", &self.stage_names())
            .finish()
    }
}
