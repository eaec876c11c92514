use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use ephreg_model::Labels;
use k8s_openapi::api::apps::v1::DeploymentStatus;

use crate::cluster::{
    ClusterClient, ClusterError, ClusterObject, ClusterResult, ObjectKey, ObjectKind,
};

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, ClusterObject>,
    created: Vec<ObjectKey>,
    create_failures: HashMap<ObjectKind, ClusterError>,
    delete_failures: HashMap<ObjectKind, ClusterError>,
}

/// In-process cluster used by tests and dry runs.
///
/// Mirrors the API server rules stages rely on: namespaced objects need their
/// namespace, duplicate creates fail with `AlreadyExists`, deleting a
/// namespace removes everything inside it.
#[derive(Default)]
pub struct InMemoryCluster {
    state: Mutex<State>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every create of `kind` fail with `err`.
    pub fn fail_create(&self, kind: ObjectKind, err: ClusterError) {
        self.lock().create_failures.insert(kind, err);
    }

    /// Make every delete of `kind` fail with `err`.
    pub fn fail_delete(&self, kind: ObjectKind, err: ClusterError) {
        self.lock().delete_failures.insert(kind, err);
    }

    /// Overwrite the ready replica count of a stored deployment.
    pub fn set_ready_replicas(&self, namespace: &str, name: &str, ready: i32) -> ClusterResult<()> {
        let key = ObjectKey::namespaced(ObjectKind::Deployment, namespace, name);
        let mut state = self.lock();
        match state.objects.get_mut(&key) {
            Some(ClusterObject::Deployment(d)) => {
                d.status
                    .get_or_insert_with(DeploymentStatus::default)
                    .ready_replicas = Some(ready);
                Ok(())
            }
            _ => Err(ClusterError::NotFound(key.to_string())),
        }
    }

    /// Insert an object bypassing namespace checks and failure injection.
    pub fn insert(&self, obj: ClusterObject) -> ClusterResult<()> {
        let key = obj.key()?;
        let mut state = self.lock();
        state.created.push(key.clone());
        state.objects.insert(key, obj);
        Ok(())
    }

    /// True when an object is stored under `key`.
    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.lock().objects.contains_key(key)
    }

    /// Snapshot of the stored object.
    pub fn object(&self, key: &ObjectKey) -> Option<ClusterObject> {
        self.lock().objects.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().objects.is_empty()
    }

    /// Keys in the order they were successfully created.
    pub fn creation_order(&self) -> Vec<ObjectKey> {
        self.lock().created.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn create(&self, obj: ClusterObject) -> ClusterResult<ClusterObject> {
        let key = obj.key()?;
        let mut state = self.lock();

        if let Some(err) = state.create_failures.get(&key.kind) {
            return Err(err.clone());
        }
        if let Some(ns) = &key.namespace {
            if !state.objects.contains_key(&ObjectKey::namespace(ns.as_str())) {
                return Err(ClusterError::NotFound(format!("Namespace/{ns}")));
            }
        }
        if state.objects.contains_key(&key) {
            return Err(ClusterError::AlreadyExists(key.to_string()));
        }

        state.created.push(key.clone());
        state.objects.insert(key, obj.clone());
        Ok(obj)
    }

    async fn get(&self, key: &ObjectKey) -> ClusterResult<ClusterObject> {
        self.lock()
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &ObjectKey) -> ClusterResult<()> {
        let mut state = self.lock();

        if let Some(err) = state.delete_failures.get(&key.kind) {
            return Err(err.clone());
        }
        if state.objects.remove(key).is_none() {
            return Err(ClusterError::NotFound(key.to_string()));
        }
        if key.kind == ObjectKind::Namespace {
            state
                .objects
                .retain(|k, _| k.namespace.as_deref() != Some(key.name.as_str()));
        }
        Ok(())
    }

    async fn list(
        &self,
        kind: ObjectKind,
        namespace: Option<&str>,
        selector: &Labels,
    ) -> ClusterResult<Vec<ObjectKey>> {
        Ok(self
            .lock()
            .objects
            .iter()
            .filter(|(k, _)| k.kind == kind)
            .filter(|(k, _)| namespace.is_none() || k.namespace.as_deref() == namespace)
            .filter(|(_, obj)| obj.labels().matches(selector))
            .map(|(k, _)| k.clone())
            .collect())
    }
}
