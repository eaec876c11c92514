use crate::{
    domain::constants::{
        CERTIFICATE_NAME, CONFIG_OBJECT, CREDENTIALS_SECRET, ISSUER_NAME, REGISTRY_NAME,
        REGISTRY_PORT, TLS_SECRET,
    },
    error::{ModelError, ModelResult},
};

/// Deterministic naming scheme of one provisioning run.
///
/// Every object name is a function of the namespace alone, so a later teardown
/// can find what an earlier (possibly crashed) setup created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunNames {
    namespace: String,
}

impl RunNames {
    /// Validates `namespace` as an RFC 1123 label.
    ///
    /// # Examples
    /// ```
    /// use ephreg_model::RunNames;
    ///
    /// let names = RunNames::new("ci").unwrap();
    /// assert_eq!(names.fqdn(), "registry.ci.svc.cluster.local");
    /// assert_eq!(names.registry_host(), "registry.ci.svc.cluster.local:5000");
    ///
    /// assert!(RunNames::new("Not_A_Label").is_err());
    /// ```
    pub fn new(namespace: impl Into<String>) -> ModelResult<Self> {
        let namespace = namespace.into();
        validate_dns_label(&namespace)?;
        Ok(Self { namespace })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn service(&self) -> &'static str {
        REGISTRY_NAME
    }

    pub fn deployment(&self) -> &'static str {
        REGISTRY_NAME
    }

    pub fn credentials_secret(&self) -> &'static str {
        CREDENTIALS_SECRET
    }

    pub fn tls_secret(&self) -> &'static str {
        TLS_SECRET
    }

    pub fn config_object(&self) -> &'static str {
        CONFIG_OBJECT
    }

    pub fn issuer(&self) -> &'static str {
        ISSUER_NAME
    }

    pub fn certificate(&self) -> &'static str {
        CERTIFICATE_NAME
    }

    /// In-cluster service name, also used as the external hostname.
    pub fn fqdn(&self) -> String {
        format!("{}.{}.svc.cluster.local", REGISTRY_NAME, self.namespace)
    }

    /// `fqdn:port`, the prefix of every image reference pushed to the registry.
    pub fn registry_host(&self) -> String {
        format!("{}:{}", self.fqdn(), REGISTRY_PORT)
    }
}

fn validate_dns_label(name: &str) -> ModelResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-');
    if valid {
        Ok(())
    } else {
        Err(ModelError::InvalidName(format!(
            "'{name}' is not a valid namespace name"
        )))
    }
}
