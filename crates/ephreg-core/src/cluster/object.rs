use std::fmt;

use k8s_openapi::{
    api::{
        apps::v1::Deployment,
        core::v1::{ConfigMap, Namespace, Secret, Service},
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::api::{ApiResource, DynamicObject};

use ephreg_model::Labels;

use crate::cluster::{ClusterError, ClusterResult};

/// Kinds of object a run creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Namespace,
    Secret,
    ConfigMap,
    Service,
    Deployment,
    Issuer,
    Certificate,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Namespace => "Namespace",
            ObjectKind::Secret => "Secret",
            ObjectKind::ConfigMap => "ConfigMap",
            ObjectKind::Service => "Service",
            ObjectKind::Deployment => "Deployment",
            ObjectKind::Issuer => "Issuer",
            ObjectKind::Certificate => "Certificate",
        }
    }

    pub fn is_namespaced(&self) -> bool {
        !matches!(self, ObjectKind::Namespace)
    }

    /// API resource of the cert-manager kinds; `None` for built-in kinds.
    pub fn custom_resource(&self) -> Option<ApiResource> {
        let (kind, plural) = match self {
            ObjectKind::Issuer => ("Issuer", "issuers"),
            ObjectKind::Certificate => ("Certificate", "certificates"),
            _ => return None,
        };
        Some(ApiResource {
            group: "cert-manager.io".into(),
            version: "v1".into(),
            api_version: "cert-manager.io/v1".into(),
            kind: kind.into(),
            plural: plural.into(),
        })
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of an object: kind, optional namespace and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub kind: ObjectKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(
        kind: ObjectKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn namespace(name: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Namespace,
            namespace: None,
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Any object the cluster client can create, read or delete.
#[derive(Debug, Clone)]
pub enum ClusterObject {
    Namespace(Namespace),
    Secret(Secret),
    ConfigMap(ConfigMap),
    Service(Service),
    Deployment(Deployment),
    Issuer(DynamicObject),
    Certificate(DynamicObject),
}

impl ClusterObject {
    /// Namespace carrying the managed-by label.
    pub fn namespace(name: &str) -> Self {
        ClusterObject::Namespace(Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(Labels::managed().into_inner()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            ClusterObject::Namespace(_) => ObjectKind::Namespace,
            ClusterObject::Secret(_) => ObjectKind::Secret,
            ClusterObject::ConfigMap(_) => ObjectKind::ConfigMap,
            ClusterObject::Service(_) => ObjectKind::Service,
            ClusterObject::Deployment(_) => ObjectKind::Deployment,
            ClusterObject::Issuer(_) => ObjectKind::Issuer,
            ClusterObject::Certificate(_) => ObjectKind::Certificate,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            ClusterObject::Namespace(o) => &o.metadata,
            ClusterObject::Secret(o) => &o.metadata,
            ClusterObject::ConfigMap(o) => &o.metadata,
            ClusterObject::Service(o) => &o.metadata,
            ClusterObject::Deployment(o) => &o.metadata,
            ClusterObject::Issuer(o) | ClusterObject::Certificate(o) => &o.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            ClusterObject::Namespace(o) => &mut o.metadata,
            ClusterObject::Secret(o) => &mut o.metadata,
            ClusterObject::ConfigMap(o) => &mut o.metadata,
            ClusterObject::Service(o) => &mut o.metadata,
            ClusterObject::Deployment(o) => &mut o.metadata,
            ClusterObject::Issuer(o) | ClusterObject::Certificate(o) => &mut o.metadata,
        }
    }

    pub fn labels(&self) -> Labels {
        self.metadata().labels.clone().unwrap_or_default().into()
    }

    /// Key of this object; fails when a required name or namespace is missing.
    pub fn key(&self) -> ClusterResult<ObjectKey> {
        let kind = self.kind();
        let meta = self.metadata();
        let name = meta
            .name
            .clone()
            .ok_or_else(|| ClusterError::Invalid(format!("{kind} without a name")))?;

        if !kind.is_namespaced() {
            return Ok(ObjectKey::namespace(name));
        }
        let namespace = meta
            .namespace
            .clone()
            .ok_or_else(|| ClusterError::Invalid(format!("{kind} '{name}' without a namespace")))?;
        Ok(ObjectKey::namespaced(kind, namespace, name))
    }

    pub fn as_secret(&self) -> Option<&Secret> {
        match self {
            ClusterObject::Secret(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_config_map(&self) -> Option<&ConfigMap> {
        match self {
            ClusterObject::ConfigMap(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_deployment(&self) -> Option<&Deployment> {
        match self {
            ClusterObject::Deployment(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dynamic(&self) -> Option<&DynamicObject> {
        match self {
            ClusterObject::Issuer(o) | ClusterObject::Certificate(o) => Some(o),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_key_has_no_namespace() {
        let ns = ClusterObject::namespace("ephreg");
        let key = ns.key().unwrap();
        assert_eq!(key, ObjectKey::namespace("ephreg"));
        assert_eq!(key.to_string(), "Namespace/ephreg");
    }

    #[test]
    fn namespaced_object_requires_namespace() {
        let secret = ClusterObject::Secret(Secret {
            metadata: ObjectMeta {
                name: Some("s".into()),
                ..Default::default()
            },
            ..Default::default()
        });
        assert!(matches!(secret.key(), Err(ClusterError::Invalid(_))));
    }

    #[test]
    fn cert_manager_kinds_have_api_resources() {
        let ar = ObjectKind::Certificate.custom_resource().unwrap();
        assert_eq!(ar.api_version, "cert-manager.io/v1");
        assert_eq!(ar.plural, "certificates");
        assert!(ObjectKind::Secret.custom_resource().is_none());
    }
}
