//! Provisioning stages.
//!
//! Each stage creates its own cluster objects and publishes the values other
//! stages need through the [`ValueStore`](crate::store::ValueStore). Stages
//! name store keys, never each other, so they can be spawned together and
//! let the store order them.
mod error;
pub use error::StageError;

mod context;
pub use context::StageContext;

pub mod credentials;
pub mod deployment;
pub mod registry_config;
pub mod tls;

pub use credentials::CredentialStage;
pub use deployment::DeploymentStage;
pub use registry_config::RegistryConfigStage;
pub use tls::TlsStage;

use async_trait::async_trait;

/// One unit of concurrent provisioning work.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name used in logs, metrics and error reports.
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &StageContext) -> Result<(), StageError>;
}
