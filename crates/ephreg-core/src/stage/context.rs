use std::{fmt, sync::Arc};

use ephreg_model::RunNames;
use tokio_util::sync::CancellationToken;

use crate::{cluster::ClusterHandle, store::ValueStore};

/// Shared dependencies handed to every stage of one run.
#[derive(Clone)]
pub struct StageContext {
    store: Arc<ValueStore>,
    cluster: ClusterHandle,
    names: RunNames,
    cancel: CancellationToken,
}

impl StageContext {
    pub fn new(store: Arc<ValueStore>, cluster: ClusterHandle, names: RunNames) -> Self {
        Self {
            store,
            cluster,
            names,
            cancel: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    pub fn cluster(&self) -> &ClusterHandle {
        &self.cluster
    }

    pub fn names(&self) -> &RunNames {
        &self.names
    }

    /// Token stages pass to every store read.
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Replace the cancellation token and return updated context.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl fmt::Debug for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("namespace", &self.names.namespace())
            .field("store", &self.store)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
