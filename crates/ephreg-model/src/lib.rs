mod domain;
pub use domain::constants;
pub use domain::{
    ConfigRef, Credentials, Env, KeyValue, Labels, Mount, RunNames, SecretRef, TlsMounts,
    verify_htpasswd,
};

mod config;
pub use config::{CertManagerConfig, ProvisionConfig, ToolsConfig};

mod error;
pub use error::{ModelError, ModelResult};
