use std::fmt::Debug;

use async_trait::async_trait;
use ephreg_core::cluster::{
    ClusterClient, ClusterError, ClusterObject, ClusterResult, ObjectKey, ObjectKind,
};
use ephreg_model::Labels;
use k8s_openapi::{
    NamespaceResourceScope,
    api::{
        apps::v1::Deployment,
        core::v1::{ConfigMap, Namespace, Secret, Service},
    },
};
use kube::{
    Api, Client, Resource, ResourceExt,
    api::{ApiResource, DeleteParams, DynamicObject, ListParams, PostParams},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, trace};

/// Map API status codes onto the cluster error taxonomy.
pub fn map_kube_error(target: &ObjectKey, err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => ClusterError::NotFound(target.to_string()),
        kube::Error::Api(ae) if ae.code == 409 => ClusterError::AlreadyExists(target.to_string()),
        kube::Error::Api(ae) => ClusterError::api(target, format!("{} ({})", ae.message, ae.code)),
        other => ClusterError::api(target, other.to_string()),
    }
}

/// Cluster client talking to a live API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn namespaced<K>(&self, key: &ObjectKey) -> ClusterResult<Api<K>>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        let ns = key
            .namespace
            .as_deref()
            .ok_or_else(|| ClusterError::Invalid(format!("{key} needs a namespace")))?;
        Ok(Api::namespaced(self.client.clone(), ns))
    }

    fn dynamic(&self, key: &ObjectKey) -> ClusterResult<(Api<DynamicObject>, ApiResource)> {
        let ar = key
            .kind
            .custom_resource()
            .ok_or_else(|| {
                ClusterError::Invalid(format!("{} is not a custom resource", key.kind))
            })?;
        let api = match key.namespace.as_deref() {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        };
        Ok((api, ar))
    }

    async fn create_in<K>(&self, key: &ObjectKey, obj: &K) -> ClusterResult<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + Serialize
            + DeserializeOwned,
    {
        self.namespaced::<K>(key)?
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| map_kube_error(key, e))
    }

    async fn get_in<K>(&self, key: &ObjectKey) -> ClusterResult<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        self.namespaced::<K>(key)?
            .get(&key.name)
            .await
            .map_err(|e| map_kube_error(key, e))
    }

    async fn delete_in<K>(&self, key: &ObjectKey) -> ClusterResult<()>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        self.namespaced::<K>(key)?
            .delete(&key.name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error(key, e))
    }

    async fn list_in<K>(
        &self,
        kind: ObjectKind,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> ClusterResult<Vec<ObjectKey>>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        let api: Api<K> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let target = ObjectKey {
            kind,
            namespace: namespace.map(str::to_string),
            name: "*".to_string(),
        };
        let list = api
            .list(params)
            .await
            .map_err(|e| map_kube_error(&target, e))?;
        Ok(list
            .items
            .iter()
            .map(|item| ObjectKey {
                kind,
                namespace: item.namespace(),
                name: item.name_any(),
            })
            .collect())
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn create(&self, obj: ClusterObject) -> ClusterResult<ClusterObject> {
        let key = obj.key()?;
        trace!(object = %key, "create");
        let created = match obj {
            ClusterObject::Namespace(ns) => {
                let api: Api<Namespace> = Api::all(self.client.clone());
                api.create(&PostParams::default(), &ns)
                    .await
                    .map(ClusterObject::Namespace)
                    .map_err(|e| map_kube_error(&key, e))?
            }
            ClusterObject::Secret(o) => ClusterObject::Secret(self.create_in(&key, &o).await?),
            ClusterObject::ConfigMap(o) => {
                ClusterObject::ConfigMap(self.create_in(&key, &o).await?)
            }
            ClusterObject::Service(o) => ClusterObject::Service(self.create_in(&key, &o).await?),
            ClusterObject::Deployment(o) => {
                ClusterObject::Deployment(self.create_in(&key, &o).await?)
            }
            ClusterObject::Issuer(o) | ClusterObject::Certificate(o) => {
                let (api, _) = self.dynamic(&key)?;
                let created = api
                    .create(&PostParams::default(), &o)
                    .await
                    .map_err(|e| map_kube_error(&key, e))?;
                if key.kind == ObjectKind::Issuer {
                    ClusterObject::Issuer(created)
                } else {
                    ClusterObject::Certificate(created)
                }
            }
        };
        debug!(object = %key, "created");
        Ok(created)
    }

    async fn get(&self, key: &ObjectKey) -> ClusterResult<ClusterObject> {
        Ok(match key.kind {
            ObjectKind::Namespace => {
                let api: Api<Namespace> = Api::all(self.client.clone());
                let ns = api
                    .get(&key.name)
                    .await
                    .map_err(|e| map_kube_error(key, e))?;
                ClusterObject::Namespace(ns)
            }
            ObjectKind::Secret => ClusterObject::Secret(self.get_in::<Secret>(key).await?),
            ObjectKind::ConfigMap => ClusterObject::ConfigMap(self.get_in::<ConfigMap>(key).await?),
            ObjectKind::Service => ClusterObject::Service(self.get_in::<Service>(key).await?),
            ObjectKind::Deployment => {
                ClusterObject::Deployment(self.get_in::<Deployment>(key).await?)
            }
            ObjectKind::Issuer | ObjectKind::Certificate => {
                let (api, _) = self.dynamic(key)?;
                let obj = api.get(&key.name).await.map_err(|e| map_kube_error(key, e))?;
                if key.kind == ObjectKind::Issuer {
                    ClusterObject::Issuer(obj)
                } else {
                    ClusterObject::Certificate(obj)
                }
            }
        })
    }

    async fn delete(&self, key: &ObjectKey) -> ClusterResult<()> {
        trace!(object = %key, "delete");
        match key.kind {
            ObjectKind::Namespace => {
                let api: Api<Namespace> = Api::all(self.client.clone());
                api.delete(&key.name, &DeleteParams::background())
                    .await
                    .map(|_| ())
                    .map_err(|e| map_kube_error(key, e))
            }
            ObjectKind::Secret => self.delete_in::<Secret>(key).await,
            ObjectKind::ConfigMap => self.delete_in::<ConfigMap>(key).await,
            ObjectKind::Service => self.delete_in::<Service>(key).await,
            ObjectKind::Deployment => self.delete_in::<Deployment>(key).await,
            ObjectKind::Issuer | ObjectKind::Certificate => {
                let (api, _) = self.dynamic(key)?;
                api.delete(&key.name, &DeleteParams::default())
                    .await
                    .map(|_| ())
                    .map_err(|e| map_kube_error(key, e))
            }
        }
    }

    async fn list(
        &self,
        kind: ObjectKind,
        namespace: Option<&str>,
        selector: &Labels,
    ) -> ClusterResult<Vec<ObjectKey>> {
        let params = ListParams::default().labels(&selector.to_selector());
        match kind {
            ObjectKind::Secret => self.list_in::<Secret>(kind, namespace, &params).await,
            ObjectKind::ConfigMap => self.list_in::<ConfigMap>(kind, namespace, &params).await,
            ObjectKind::Service => self.list_in::<Service>(kind, namespace, &params).await,
            ObjectKind::Deployment => self.list_in::<Deployment>(kind, namespace, &params).await,
            ObjectKind::Namespace => {
                let api: Api<Namespace> = Api::all(self.client.clone());
                let target = ObjectKey::namespace("*");
                let list = api.list(&params).await.map_err(|e| map_kube_error(&target, e))?;
                Ok(list.items.iter().map(|ns| ObjectKey::namespace(ns.name_any())).collect())
            }
            ObjectKind::Issuer | ObjectKind::Certificate => {
                let target = ObjectKey {
                    kind,
                    namespace: namespace.map(str::to_string),
                    name: "*".to_string(),
                };
                let (api, _) = self.dynamic(&target)?;
                let list = api.list(&params).await.map_err(|e| map_kube_error(&target, e))?;
                Ok(list
                    .items
                    .iter()
                    .map(|o| ObjectKey {
                        kind,
                        namespace: o.namespace(),
                        name: o.name_any(),
                    })
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kube::error::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: format!("status {code}"),
            reason: "Test".into(),
            code,
        })
    }

    #[test]
    fn status_codes_map_to_cluster_errors() {
        let key = ObjectKey::namespaced(ObjectKind::Secret, "reg", "registry-tls");

        assert!(map_kube_error(&key, api_error(404)).is_not_found());
        assert!(map_kube_error(&key, api_error(409)).is_already_exists());
        match map_kube_error(&key, api_error(403)) {
            ClusterError::Api { target, message } => {
                assert_eq!(target, "Secret/reg/registry-tls");
                assert!(message.contains("403"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }
}
