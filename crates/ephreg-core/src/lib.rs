pub mod cluster;
pub mod error;
pub mod installer;
pub mod metrics;
pub mod pipeline;
pub mod readiness;
pub mod stage;
pub mod store;
pub mod teardown;

mod fsutil;

#[cfg(test)]
pub(crate) mod testing;

pub mod prelude {
    pub use crate::cluster::{
        ClusterClient, ClusterError, ClusterHandle, ClusterObject, ObjectKey, ObjectKind,
    };
    pub use crate::error::CoreError;
    pub use crate::installer::{ControllerInstaller, InstallError};
    pub use crate::pipeline::SetupPipeline;
    pub use crate::readiness::{ReadinessPoller, StatusSource};
    pub use crate::stage::{Stage, StageContext, StageError};
    pub use crate::store::{Key, StoreError, ValueStore};
    pub use crate::teardown::{TeardownReport, TeardownSequencer};
}
