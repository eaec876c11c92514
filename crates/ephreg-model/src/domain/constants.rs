//! Fixed names, ports and paths of the provisioned registry.
//!
//! Everything teardown needs to find is derived from these values and the run
//! namespace, never from in-memory state of a previous process.

/// Port the registry listens on inside the pod and exposes through its service.
pub const REGISTRY_PORT: u16 = 5000;

/// Name shared by the registry service, deployment and pod label.
pub const REGISTRY_NAME: &str = "registry";

/// Default registry image.
pub const REGISTRY_IMAGE: &str = "registry:2";

/// Secret holding the generated registry credentials.
pub const CREDENTIALS_SECRET: &str = "registry-credentials";

/// Secret written by the certificate controller.
pub const TLS_SECRET: &str = "registry-tls";

/// Config object holding the rendered registry configuration.
pub const CONFIG_OBJECT: &str = "registry-config";

/// Key of the rendered configuration inside [`CONFIG_OBJECT`].
pub const CONFIG_FILE: &str = "config.yml";

/// Self-signed issuer scoped to the run namespace.
pub const ISSUER_NAME: &str = "registry-selfsigned";

/// Certificate object requesting [`TLS_SECRET`].
pub const CERTIFICATE_NAME: &str = "registry-cert";

/// Name of the image-pull secret created in consumer namespaces.
pub const PULL_SECRET_NAME: &str = "ephreg-registry-pull";

pub const CREDENTIALS_MOUNT_DIR: &str = "/auth";

/// Local credential file: the two-key `username` / `password` YAML.
pub const CREDENTIALS_FILE: &str = "credentials.yaml";

/// Secret key and mounted file name of the registry's bcrypt htpasswd.
pub const HTPASSWD_FILE: &str = "htpasswd";

pub const TLS_MOUNT_DIR: &str = "/certs";
pub const CA_FILE: &str = "ca.crt";
pub const CERT_FILE: &str = "tls.crt";
pub const KEY_FILE: &str = "tls.key";

pub const CONFIG_MOUNT_DIR: &str = "/etc/docker/registry";
pub const STORAGE_ROOT: &str = "/var/lib/registry";

/// Label marking every object this tool creates.
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "ephreg";

/// Label used to enumerate image-pull secrets at teardown.
pub const LABEL_PULL_SECRET: &str = "ephreg.dev/pull-secret";

/// Pod selector label.
pub const LABEL_APP: &str = "app";

/// Length of generated usernames and passwords.
pub const CREDENTIAL_LEN: usize = 32;

/// bcrypt cost of the htpasswd entry; the registry's own tooling uses 10.
pub const HTPASSWD_COST: u32 = 10;
