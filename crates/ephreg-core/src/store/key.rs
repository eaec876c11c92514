use std::{any::Any, fmt, marker::PhantomData};

use tokio_util::sync::CancellationToken;

use crate::store::{StoreError, ValueStore};

/// Slot name bound to the payload type stored under it.
///
/// Producers and consumers share one `const` key, so the payload type is
/// checked at compile time and the store's runtime downcast never fails for
/// keyed access.
pub struct Key<T> {
    name: &'static str,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Key<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _payload: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Key<T>
where
    T: Any + Clone + Send + Sync,
{
    /// Publish `value` under this key.
    pub fn set(&self, store: &ValueStore, value: T) -> Result<(), StoreError> {
        store.set(self.name, value)
    }

    /// Wait for the value, giving up when `cancel` fires.
    pub async fn wait(
        &self,
        store: &ValueStore,
        cancel: &CancellationToken,
    ) -> Result<T, StoreError> {
        store.get_with_cancel::<T>(self.name, cancel).await
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Key<T> {}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.name)
    }
}
