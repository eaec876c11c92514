use std::{fmt, time::Duration};

use ephreg_model::ModelError;
use thiserror::Error;

use crate::{
    cluster::ClusterError, readiness::ReadinessError, stage::StageError,
    teardown::TeardownReport,
};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("provisioning failed: {0}")]
    Stages(StageErrors),

    #[error("provisioning cancelled")]
    Cancelled,

    #[error("registry not ready after {0:?}")]
    ReadinessTimeout(Duration),

    #[error("readiness error: {0}")]
    Readiness(#[from] ReadinessError),

    #[error("stage error: {0}")]
    Stage(#[from] StageError),

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ModelError),

    #[error("teardown incomplete: {0}")]
    Teardown(TeardownReport),
}

/// A stage that ended with an error.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: &'static str,
    pub error: StageError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.error)
    }
}

/// Failures of concurrently run stages, in completion order.
#[derive(Debug, Default)]
pub struct StageErrors(pub Vec<StageFailure>);

impl StageErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageFailure> {
        self.0.iter()
    }

    /// Failure reported by `stage`, if any.
    pub fn get(&self, stage: &str) -> Option<&StageError> {
        self.0.iter().find(|f| f.stage == stage).map(|f| &f.error)
    }
}

impl fmt::Display for StageErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}
