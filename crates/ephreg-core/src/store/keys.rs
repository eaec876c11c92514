//! Keys exchanged by the registry provisioning stages.
use ephreg_model::{ConfigRef, Mount, SecretRef, TlsMounts};

use crate::store::Key;

/// Secret holding the registry credentials.
pub const CREDENTIALS_SECRET: Key<SecretRef> = Key::new("credentials.secret");

/// Where the credential file appears inside the registry container.
pub const CREDENTIALS_MOUNT: Key<Mount> = Key::new("credentials.mount");

/// Secret the certificate controller issues into.
pub const TLS_SECRET: Key<SecretRef> = Key::new("tls.secret");

/// CA, certificate and key paths inside the registry container.
pub const TLS_MOUNTS: Key<TlsMounts> = Key::new("tls.mounts");

/// Config object holding the rendered registry configuration.
pub const REGISTRY_CONFIG: Key<ConfigRef> = Key::new("registry.config");

pub const PROVISIONING_KEYS: [&str; 5] = [
    CREDENTIALS_SECRET.name(),
    CREDENTIALS_MOUNT.name(),
    TLS_SECRET.name(),
    TLS_MOUNTS.name(),
    REGISTRY_CONFIG.name(),
];
