//! Fixed-interval readiness polling of the registry workload.
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::cluster::{ClusterError, ClusterHandle};

/// Gap between status reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadinessError {
    #[error("readiness polling cancelled after {polls} polls")]
    Cancelled { polls: u32 },

    #[error("reading workload status failed: {0}")]
    Status(ClusterError),
}

/// Source of the ready replica count.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn ready_replicas(&self) -> Result<i32, ClusterError>;
}

/// Reads the ready replica count of one deployment through the cluster client.
#[derive(Clone)]
pub struct DeploymentStatus {
    cluster: ClusterHandle,
    namespace: String,
    name: String,
}

impl DeploymentStatus {
    pub fn new(
        cluster: ClusterHandle,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            cluster,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

#[async_trait]
impl StatusSource for DeploymentStatus {
    async fn ready_replicas(&self) -> Result<i32, ClusterError> {
        self.cluster
            .deployment_ready_replicas(&self.namespace, &self.name)
            .await
    }
}

#[async_trait]
impl<S: StatusSource + ?Sized> StatusSource for std::sync::Arc<S> {
    async fn ready_replicas(&self) -> Result<i32, ClusterError> {
        (**self).ready_replicas().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Polling,
    Ready,
    Cancelled,
    Error,
}

/// Polls a [`StatusSource`] until at least one replica is ready.
///
/// The first read happens immediately, then once per interval. There is no
/// retry cap: callers bound the wait through the cancellation token.
pub struct ReadinessPoller<S> {
    source: S,
    every: Duration,
    state: ReadinessState,
    polls: u32,
}

impl<S: StatusSource> ReadinessPoller<S> {
    /// Poller reading once per [`DEFAULT_POLL_INTERVAL`].
    pub fn new(source: S) -> Self {
        Self::with_interval(source, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(source: S, every: Duration) -> Self {
        Self {
            source,
            every,
            state: ReadinessState::Polling,
            polls: 0,
        }
    }

    pub fn state(&self) -> ReadinessState {
        self.state
    }

    /// Status reads performed so far.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Poll until a replica is ready, the status read fails or `cancel` fires.
    ///
    /// Cancellation also interrupts a status read in flight, so a hung API
    /// call never delays the return past the cancel.
    pub async fn poll_until_ready(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<(), ReadinessError> {
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.state = ReadinessState::Polling;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled()),
                _ = ticker.tick() => {}
            }

            self.polls += 1;
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                read = self.source.ready_replicas() => Some(read),
            };
            let Some(read) = read else {
                return Err(self.cancelled());
            };
            match read {
                Ok(ready) if ready > 0 => {
                    self.state = ReadinessState::Ready;
                    info!(ready, polls = self.polls, "workload ready");
                    return Ok(());
                }
                Ok(_) => trace!(polls = self.polls, "no ready replicas yet"),
                Err(e) => {
                    self.state = ReadinessState::Error;
                    return Err(ReadinessError::Status(e));
                }
            }
        }
    }

    fn cancelled(&mut self) -> ReadinessError {
        self.state = ReadinessState::Cancelled;
        debug!(polls = self.polls, "readiness polling cancelled");
        ReadinessError::Cancelled { polls: self.polls }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use ephreg_model::{ConfigRef, Mount, RunNames, SecretRef, TlsMounts};
    use tokio::time::Instant;

    use crate::{
        cluster::{ClusterClient, ClusterObject, InMemoryCluster},
        stage::{DeploymentStage, StageContext},
        store::{
            ValueStore,
            keys::{CREDENTIALS_MOUNT, CREDENTIALS_SECRET, REGISTRY_CONFIG, TLS_MOUNTS, TLS_SECRET},
        },
    };

    /// Reports zero ready replicas for the first `not_ready` reads.
    struct Scripted {
        not_ready: u32,
        reads: AtomicU32,
    }

    impl Scripted {
        fn new(not_ready: u32) -> Self {
            Self {
                not_ready,
                reads: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl StatusSource for Scripted {
        async fn ready_replicas(&self) -> Result<i32, ClusterError> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(if n < self.not_ready { 0 } else { 1 })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ready_after_exactly_n_plus_one_reads() {
        let source = Arc::new(Scripted::new(4));
        let mut poller = ReadinessPoller::new(source.clone());

        poller.poll_until_ready(&CancellationToken::new()).await.unwrap();

        assert_eq!(poller.state(), ReadinessState::Ready);
        assert_eq!(poller.polls(), 5);
        assert_eq!(source.reads.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_within_one_tick() {
        let mut poller = ReadinessPoller::new(Scripted::new(u32::MAX));
        let cancel = CancellationToken::new();

        let trigger = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(3500)).await;
                cancel.cancel();
            })
        };

        let started = Instant::now();
        let err = poller.poll_until_ready(&cancel).await.unwrap_err();
        let elapsed = started.elapsed();
        trigger.await.unwrap();

        assert_eq!(poller.state(), ReadinessState::Cancelled);
        assert!(matches!(err, ReadinessError::Cancelled { polls: 4 }));
        assert!(elapsed < Duration::from_millis(3500) + DEFAULT_POLL_INTERVAL);
    }

    /// Every status read hangs for 30 s.
    struct Hanging;

    #[async_trait]
    impl StatusSource for Hanging {
        async fn ready_replicas(&self) -> Result<i32, ClusterError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(1)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_hung_status_read() {
        let mut poller = ReadinessPoller::new(Hanging);
        let cancel = CancellationToken::new();

        let trigger = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                cancel.cancel();
            })
        };

        let started = Instant::now();
        let err = poller.poll_until_ready(&cancel).await.unwrap_err();
        trigger.await.unwrap();

        assert!(matches!(err, ReadinessError::Cancelled { polls: 1 }));
        assert_eq!(poller.state(), ReadinessState::Cancelled);
        assert!(started.elapsed() < DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test]
    async fn status_error_ends_polling() {
        let cluster: ClusterHandle = Arc::new(InMemoryCluster::new());
        let mut poller = ReadinessPoller::new(DeploymentStatus::new(cluster, "reg", "registry"));

        let err = poller.poll_until_ready(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ReadinessError::Status(ClusterError::NotFound(_))));
        assert_eq!(poller.state(), ReadinessState::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn deployment_status_follows_cluster() {
        let cluster = Arc::new(InMemoryCluster::new());
        let store = Arc::new(ValueStore::for_provisioning());
        let ctx = StageContext::new(store.clone(), cluster.clone(), RunNames::new("reg").unwrap());
        cluster.create(ClusterObject::namespace("reg")).await.unwrap();

        CREDENTIALS_SECRET
            .set(&store, SecretRef::new("registry-credentials"))
            .unwrap();
        CREDENTIALS_MOUNT
            .set(&store, Mount::new("/auth", "htpasswd"))
            .unwrap();
        TLS_SECRET.set(&store, SecretRef::new("registry-tls")).unwrap();
        TLS_MOUNTS.set(&store, TlsMounts::default()).unwrap();
        REGISTRY_CONFIG
            .set(&store, ConfigRef::new("registry-config"))
            .unwrap();
        DeploymentStage::new("registry:2").deploy(&ctx).await.unwrap();

        let status = DeploymentStatus::new(cluster.clone(), "reg", "registry");
        assert_eq!(status.ready_replicas().await.unwrap(), 0);

        cluster.set_ready_replicas("reg", "registry", 1).unwrap();
        let mut poller = ReadinessPoller::new(status);
        poller.poll_until_ready(&CancellationToken::new()).await.unwrap();
        assert_eq!(poller.polls(), 1);
    }
}
