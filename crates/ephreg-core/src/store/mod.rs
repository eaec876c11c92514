//! Write-once, read-many value slots shared by concurrent provisioning stages.
//!
//! Each declared key owns a `watch` channel whose value moves from `Pending`
//! to `Ready` exactly once. Readers subscribe and wait for the transition, so
//! a value published before or after a reader arrives is observed the same way
//! and no background task is needed to keep re-sending it.
mod error;
pub use error::StoreError;

mod key;
pub use key::Key;

pub mod keys;

use std::{
    any::{Any, type_name},
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

#[derive(Clone)]
struct Published {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

#[derive(Clone)]
enum SlotState {
    Pending,
    Ready(Published),
    Closed,
}

impl SlotState {
    fn is_pending(&self) -> bool {
        matches!(self, SlotState::Pending)
    }
}

/// Store of eventually available values keyed by a fixed set of names.
///
/// The key set is fixed at construction. The map is only written there, so
/// every later access takes the read side of the lock.
pub struct ValueStore {
    slots: RwLock<HashMap<String, watch::Sender<SlotState>>>,
}

impl ValueStore {
    /// Declare the exhaustive set of keys valid for this store.
    ///
    /// # Examples
    /// ```
    /// use ephreg_core::store::ValueStore;
    ///
    /// let store = ValueStore::new(["credentials.secret"]);
    /// assert!(store.is_declared("credentials.secret"));
    /// assert!(!store.is_declared("anything.else"));
    ///
    /// store.set("credentials.secret", "registry-credentials".to_string()).unwrap();
    /// assert!(store.is_set("credentials.secret"));
    /// ```
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let slots = keys
            .into_iter()
            .map(|k| (k.into(), watch::Sender::new(SlotState::Pending)))
            .collect();
        Self {
            slots: RwLock::new(slots),
        }
    }

    /// Store declaring every key the registry stages exchange.
    pub fn for_provisioning() -> Self {
        Self::new(keys::PROVISIONING_KEYS)
    }

    /// True when `key` was declared at construction. Every other key is
    /// rejected by `set` and `get` with [`StoreError::UndeclaredKey`].
    pub fn is_declared(&self, key: &str) -> bool {
        self.read_slots().contains_key(key)
    }

    /// True once a value has been published for `key`.
    pub fn is_set(&self, key: &str) -> bool {
        self.read_slots()
            .get(key)
            .is_some_and(|tx| matches!(*tx.borrow(), SlotState::Ready(_)))
    }

    /// Publish `value` for `key`.
    ///
    /// The first published value wins: later calls are accepted but ignored, so
    /// every reader observes the same logical value. Publishing to a closed slot
    /// fails with [`StoreError::ClosedSource`].
    pub fn set<T>(&self, key: &str, value: T) -> Result<(), StoreError>
    where
        T: Any + Send + Sync,
    {
        let slots = self.read_slots();
        let tx = slots
            .get(key)
            .ok_or_else(|| StoreError::UndeclaredKey(key.to_string()))?;

        let mut value = Some(value);
        let mut outcome = Ok(());
        tx.send_if_modified(|state| match state {
            SlotState::Pending => {
                if let Some(v) = value.take() {
                    *state = SlotState::Ready(Published {
                        value: Arc::new(v),
                        type_name: type_name::<T>(),
                    });
                }
                true
            }
            SlotState::Ready(_) => {
                warn!(key, "value already published; ignoring repeated set");
                false
            }
            SlotState::Closed => {
                outcome = Err(StoreError::ClosedSource(key.to_string()));
                false
            }
        });

        if outcome.is_ok() {
            debug!(key, "value published");
        }
        outcome
    }

    /// Wait until a value is published for `key` and return a clone of it.
    ///
    /// Fails immediately for undeclared keys. Without a cancellation source
    /// this waits as long as the slot stays pending; stages use
    /// [`ValueStore::get_with_cancel`] instead.
    pub async fn get<T>(&self, key: &str) -> Result<T, StoreError>
    where
        T: Any + Clone + Send + Sync,
    {
        let mut rx = self.subscribe(key)?;
        trace!(key, "waiting for value");

        let state = rx
            .wait_for(|state| !state.is_pending())
            .await
            .map_err(|_| StoreError::ClosedSource(key.to_string()))?
            .clone();

        resolve(key, state)
    }

    /// [`ValueStore::get`] that returns [`StoreError::Cancelled`] once `cancel` fires.
    pub async fn get_with_cancel<T>(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<T, StoreError>
    where
        T: Any + Clone + Send + Sync,
    {
        tokio::select! {
            biased;
            res = self.get::<T>(key) => res,
            _ = cancel.cancelled() => Err(StoreError::Cancelled(key.to_string())),
        }
    }

    /// [`ValueStore::get`] bounded by `timeout`.
    pub async fn get_with_timeout<T>(&self, key: &str, timeout: Duration) -> Result<T, StoreError>
    where
        T: Any + Clone + Send + Sync,
    {
        match tokio::time::timeout(timeout, self.get::<T>(key)).await {
            Ok(res) => res,
            Err(_) => Err(StoreError::Timeout {
                key: key.to_string(),
                after: timeout,
            }),
        }
    }

    /// Close every slot that has no value yet.
    ///
    /// Pending and future readers of those slots get [`StoreError::ClosedSource`];
    /// published values stay readable.
    pub fn close(&self) {
        for (key, tx) in self.read_slots().iter() {
            let closed = tx.send_if_modified(|state| {
                if state.is_pending() {
                    *state = SlotState::Closed;
                    true
                } else {
                    false
                }
            });
            if closed {
                debug!(key = %key, "slot closed without a value");
            }
        }
    }

    fn subscribe(&self, key: &str) -> Result<watch::Receiver<SlotState>, StoreError> {
        self.read_slots()
            .get(key)
            .map(|tx| tx.subscribe())
            .ok_or_else(|| StoreError::UndeclaredKey(key.to_string()))
    }

    fn read_slots(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, watch::Sender<SlotState>>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn resolve<T>(key: &str, state: SlotState) -> Result<T, StoreError>
where
    T: Any + Clone + Send + Sync,
{
    match state {
        SlotState::Ready(published) => {
            let any: &(dyn Any + Send + Sync) = &*published.value;
            any.downcast_ref::<T>()
                .cloned()
                .ok_or_else(|| StoreError::TypeMismatch {
                    key: key.to_string(),
                    expected: type_name::<T>(),
                    found: published.type_name,
                })
        }
        SlotState::Closed | SlotState::Pending => Err(StoreError::ClosedSource(key.to_string())),
    }
}

impl std::fmt::Debug for ValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.read_slots();
        let ready = slots
            .values()
            .filter(|tx| matches!(*tx.borrow(), SlotState::Ready(_)))
            .count();
        f.debug_struct("ValueStore")
            .field("declared", &slots.len())
            .field("ready", &ready)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::time::sleep;

    #[tokio::test]
    async fn undeclared_key_fails_without_blocking() {
        let store = ValueStore::new(["a"]);

        let err = store.get::<String>("b").await.unwrap_err();
        assert_eq!(err, StoreError::UndeclaredKey("b".into()));

        let err = store.set("b", 1u32).unwrap_err();
        assert_eq!(err, StoreError::UndeclaredKey("b".into()));
    }

    #[tokio::test]
    async fn value_set_before_get_is_returned() {
        let store = ValueStore::new(["secretName"]);
        store.set("secretName", "cred-1".to_string()).unwrap();

        let v: String = store.get("secretName").await.unwrap();
        assert_eq!(v, "cred-1");
        assert!(store.is_set("secretName"));
    }

    #[tokio::test]
    async fn type_mismatch_is_reported() {
        let store = ValueStore::new(["port"]);
        store.set("port", 5000u16).unwrap();

        let err = store.get::<String>("port").await.unwrap_err();
        match err {
            StoreError::TypeMismatch { key, found, .. } => {
                assert_eq!(key, "port");
                assert_eq!(found, "u16");
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ten_concurrent_readers_observe_same_value() {
        let store = Arc::new(ValueStore::new(["k"]));

        let mut readers = Vec::new();
        for _ in 0..10 {
            let store = Arc::clone(&store);
            readers.push(tokio::spawn(async move {
                store.get_with_timeout::<u64>("k", Duration::from_secs(5)).await
            }));
        }

        sleep(Duration::from_millis(20)).await;
        store.set("k", 42u64).unwrap();

        for r in readers {
            assert_eq!(r.await.unwrap().unwrap(), 42);
        }
        // Late reader after the set.
        assert_eq!(store.get::<u64>("k").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn first_set_wins() {
        let store = ValueStore::new(["k"]);
        store.set("k", "first".to_string()).unwrap();
        store.set("k", "second".to_string()).unwrap();

        assert_eq!(store.get::<String>("k").await.unwrap(), "first");
    }

    #[tokio::test]
    async fn close_wakes_pending_readers() {
        let store = Arc::new(ValueStore::new(["pending", "ready"]));
        store.set("ready", 1u8).unwrap();

        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get::<u8>("pending").await })
        };
        sleep(Duration::from_millis(10)).await;
        store.close();

        assert_eq!(
            waiter.await.unwrap().unwrap_err(),
            StoreError::ClosedSource("pending".into())
        );
        assert_eq!(store.get::<u8>("ready").await.unwrap(), 1);
        assert_eq!(
            store.set("pending", 2u8).unwrap_err(),
            StoreError::ClosedSource("pending".into())
        );
    }

    #[tokio::test]
    async fn cancel_unblocks_reader() {
        let store = ValueStore::new(["never"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = store
            .get_with_cancel::<String>("never", &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Cancelled("never".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_unblocks_reader() {
        let store = ValueStore::new(["never"]);

        let err = store
            .get_with_timeout::<String>("never", Duration::from_secs(3))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout { ref key, .. } if key == "never"));
    }

    #[tokio::test]
    async fn producer_and_two_consumers_agree() {
        let store = Arc::new(ValueStore::new(["secretName", "mountA"]));

        let producer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                sleep(Duration::from_millis(50)).await;
                store.set("secretName", "cred-1".to_string())
            })
        };
        let consumers: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.get::<String>("secretName").await })
            })
            .collect();

        producer.await.unwrap().unwrap();
        for c in consumers {
            assert_eq!(c.await.unwrap().unwrap(), "cred-1");
        }
        assert!(!store.is_set("mountA"));
    }
}
