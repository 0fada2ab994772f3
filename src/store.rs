//! Entity persistence boundary.
//!
//! Generic handlers never talk to a database directly: they resolve the entity's
//! [`EntityStore`] from the container. [`MemoryStore`] is a process-local implementation
//! used by tests and the demo consumer.

use crate::error::StoreError;
use crate::types::{Entity, TypeKey};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;

#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
    async fn get(&self, key: &E::Key) -> Result<Option<E>, StoreError>;

    /// Insert a new entity and return it as stored.
    async fn insert(&self, entity: E) -> Result<E, StoreError>;

    /// Replace the entity stored under `key`. `None` when nothing is stored there.
    async fn replace(&self, key: &E::Key, entity: E) -> Result<Option<E>, StoreError>;

    /// Returns whether something was deleted.
    async fn delete(&self, key: &E::Key) -> Result<bool, StoreError>;

    async fn all(&self) -> Result<Vec<E>, StoreError>;

    /// Apply `change` to the entity stored under `key` and store the result. `None` when
    /// nothing is stored there. The change must not alter the key.
    ///
    /// The default reads then replaces, so concurrent modifications of one key are
    /// last-writer-wins. Stores that can lock or transact override it.
    async fn modify(&self, key: &E::Key, change: Modify<E>) -> Result<Option<E>, StoreError> {
        let Some(current) = self.get(key).await? else {
            return Ok(None);
        };
        let changed = change(current)?;
        ensure_same_key(key, &changed)?;
        self.replace(key, changed).await
    }
}

/// A change applied to one stored entity by [`EntityStore::modify`].
pub type Modify<E> = Box<dyn FnOnce(E) -> Result<E, StoreError> + Send>;

fn ensure_same_key<E: Entity>(key: &E::Key, entity: &E) -> Result<(), StoreError> {
    if entity.key() == *key {
        Ok(())
    } else {
        Err(StoreError::Conflict(format!(
            "the key of {} cannot change",
            std::any::type_name::<E>()
        )))
    }
}

/// A value whose concrete type is only known at runtime, tagged with its type for diagnostics.
pub struct AnyValue {
    ty: TypeKey,
    value: Box<dyn Any + Send>,
}

impl AnyValue {
    pub fn new<T: Send + 'static>(value: T) -> Self {
        AnyValue {
            ty: TypeKey::of::<T>(),
            value: Box::new(value),
        }
    }

    pub fn type_key(&self) -> TypeKey {
        self.ty
    }

    pub fn downcast<T: 'static>(self) -> Result<T, StoreError> {
        let actual = self.ty.name();
        self.value
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| StoreError::ValueMismatch {
                expected: std::any::type_name::<T>(),
                actual,
            })
    }
}

/// Merges an update payload into an entity, both type-erased.
pub type MergeFn = Arc<dyn Fn(AnyValue, &mut AnyValue) -> Result<(), StoreError> + Send + Sync>;

/// Object-safe view over an `EntityStore<E>` for code that only knows the entity at runtime.
#[async_trait]
pub(crate) trait ErasedStore: Send + Sync {
    async fn get(&self, key: AnyValue) -> Result<Option<AnyValue>, StoreError>;
    async fn insert(&self, entity: AnyValue) -> Result<AnyValue, StoreError>;
    async fn update(&self, key: AnyValue, payload: AnyValue, merge: MergeFn) -> Result<Option<AnyValue>, StoreError>;
    async fn delete(&self, key: AnyValue) -> Result<bool, StoreError>;
    async fn all(&self) -> Result<Vec<AnyValue>, StoreError>;
}

pub(crate) struct StoreAdapter<E: Entity> {
    inner: Arc<dyn EntityStore<E>>,
}

impl<E: Entity> StoreAdapter<E> {
    pub(crate) fn new(inner: Arc<dyn EntityStore<E>>) -> Self {
        StoreAdapter { inner }
    }

    fn key(key: AnyValue) -> Result<E::Key, StoreError> {
        let actual = key.type_key().name();
        key.downcast::<E::Key>().map_err(|_| StoreError::KeyMismatch {
            expected: std::any::type_name::<E::Key>(),
            actual,
        })
    }
}

#[async_trait]
impl<E: Entity> ErasedStore for StoreAdapter<E> {
    async fn get(&self, key: AnyValue) -> Result<Option<AnyValue>, StoreError> {
        let key = Self::key(key)?;
        Ok(self.inner.get(&key).await?.map(AnyValue::new))
    }

    async fn insert(&self, entity: AnyValue) -> Result<AnyValue, StoreError> {
        let entity = entity.downcast::<E>()?;
        Ok(AnyValue::new(self.inner.insert(entity).await?))
    }

    async fn update(&self, key: AnyValue, payload: AnyValue, merge: MergeFn) -> Result<Option<AnyValue>, StoreError> {
        let key = Self::key(key)?;
        let change: Modify<E> = Box::new(move |current: E| {
            let mut erased = AnyValue::new(current);
            merge(payload, &mut erased)?;
            erased.downcast::<E>()
        });
        Ok(self.inner.modify(&key, change).await?.map(AnyValue::new))
    }

    async fn delete(&self, key: AnyValue) -> Result<bool, StoreError> {
        let key = Self::key(key)?;
        self.inner.delete(&key).await
    }

    async fn all(&self) -> Result<Vec<AnyValue>, StoreError> {
        Ok(self.inner.all().await?.into_iter().map(AnyValue::new).collect())
    }
}

/// Process-local store keeping entities in insertion order.
pub struct MemoryStore<E> {
    rows: RwLock<Vec<E>>,
}

impl<E> Default for MemoryStore<E> {
    fn default() -> Self {
        MemoryStore {
            rows: RwLock::new(Vec::new()),
        }
    }
}

impl<E> MemoryStore<E>
where
    E: Entity + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: impl IntoIterator<Item = E>) -> Self {
        MemoryStore {
            rows: RwLock::new(rows.into_iter().collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl<E> EntityStore<E> for MemoryStore<E>
where
    E: Entity + Clone,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, StoreError> {
        Ok(self.rows.read().iter().find(|row| row.key() == *key).cloned())
    }

    async fn insert(&self, entity: E) -> Result<E, StoreError> {
        let mut rows = self.rows.write();
        let key = entity.key();
        if rows.iter().any(|row| row.key() == key) {
            return Err(StoreError::Conflict(format!(
                "{} with this key already exists",
                std::any::type_name::<E>()
            )));
        }
        rows.push(entity.clone());
        Ok(entity)
    }

    async fn replace(&self, key: &E::Key, entity: E) -> Result<Option<E>, StoreError> {
        ensure_same_key(key, &entity)?;
        let mut rows = self.rows.write();
        match rows.iter_mut().find(|row| row.key() == *key) {
            Some(slot) => {
                *slot = entity.clone();
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &E::Key) -> Result<bool, StoreError> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|row| row.key() != *key);
        Ok(rows.len() != before)
    }

    async fn all(&self) -> Result<Vec<E>, StoreError> {
        Ok(self.rows.read().clone())
    }

    /// Holds the write lock across the change.
    async fn modify(&self, key: &E::Key, change: Modify<E>) -> Result<Option<E>, StoreError> {
        let mut rows = self.rows.write();
        let Some(slot) = rows.iter_mut().find(|row| row.key() == *key) else {
            return Ok(None);
        };
        let changed = change(slot.clone())?;
        ensure_same_key(key, &changed)?;
        *slot = changed.clone();
        Ok(Some(changed))
    }
}
