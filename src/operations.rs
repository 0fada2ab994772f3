//! Request shapes understood by the wiring pass.
//!
//! A route declares its dependency as `dyn ValidatedHandler<Req, Res>`. When `Req` is one of the
//! conventional shapes below, [`HandlerRequest`] reports the shape's type arguments and supplies
//! a constructor for the generic handler that serves it, so registrars can match on plain data.

use crate::error::ServiceError;
use crate::handlers::{
    ByKeyValidatedHandler, DeleteValidatedHandler, HandlerBinding, InsertValidatedHandler,
    NoFilterQueryableValidatedHandler, UpdateValidatedHandler,
};
use crate::services::ServiceProvider;
use crate::types::TypeKey;
use crate::validated::ValidatedHandler;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

/// Fetch one item by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByKey<K> {
    pub key: K,
}

impl<K> ByKey<K> {
    pub fn new(key: K) -> Self {
        ByKey { key }
    }
}

/// Create an item from a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert<P> {
    pub payload: P,
}

impl<P> Insert<P> {
    pub fn new(payload: P) -> Self {
        Insert { payload }
    }
}

/// Apply a payload to the item stored under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update<K, P> {
    pub key: K,
    pub payload: P,
}

impl<K, P> Update<K, P> {
    pub fn new(key: K, payload: P) -> Self {
        Update { key, payload }
    }
}

/// Delete the `T` stored under a key. `T` only selects the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete<K, T> {
    pub key: K,
    target: PhantomData<fn() -> T>,
}

impl<K, T> Delete<K, T> {
    pub fn new(key: K) -> Self {
        Delete {
            key,
            target: PhantomData,
        }
    }
}

/// Unfiltered listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoFilter;

/// Homogeneous list result of an unfiltered query. Serialises as a plain JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Queryable<T>(pub Vec<T>);

impl<T> Queryable<T> {
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }
}

impl<T> FromIterator<T> for Queryable<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Queryable(iter.into_iter().collect())
    }
}

impl<T> IntoIterator for Queryable<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Request side of a handler interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestShape {
    ByKey { key: TypeKey },
    Insert { payload: TypeKey },
    Update { key: TypeKey, payload: TypeKey },
    Delete { key: TypeKey, target: TypeKey },
    NoFilter,
    /// Any request type without a conventional shape.
    Custom(TypeKey),
}

/// Result side of a handler interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultShape {
    Unit,
    Single(TypeKey),
    Queryable(TypeKey),
}

impl ResultShape {
    pub fn of<T: ?Sized + 'static>() -> Self {
        let key = TypeKey::of::<T>();
        if key.is::<()>() {
            ResultShape::Unit
        } else {
            ResultShape::Single(key)
        }
    }
}

/// Constructs the generic handler for a request shape once the entity is known.
pub type GenericHandlerFactory<Req, Res> =
    fn(&HandlerBinding, &ServiceProvider) -> Result<Arc<dyn ValidatedHandler<Req, Res>>, ServiceError>;

/// Implemented by every request type a route can depend on.
///
/// Custom requests only need an empty impl: they report [`RequestShape::Custom`] and have no
/// generic handler, so their handler must be registered by the application.
pub trait HandlerRequest<Res>: Send + Sized + 'static
where
    Res: Send + 'static,
{
    fn shape() -> RequestShape {
        RequestShape::Custom(TypeKey::of::<Self>())
    }

    fn result_shape() -> ResultShape {
        ResultShape::of::<Res>()
    }

    fn generic_handler() -> Option<GenericHandlerFactory<Self, Res>> {
        None
    }
}

impl<K, D> HandlerRequest<D> for ByKey<K>
where
    K: Send + Sync + 'static,
    D: Send + 'static,
{
    fn shape() -> RequestShape {
        RequestShape::ByKey {
            key: TypeKey::of::<K>(),
        }
    }

    fn generic_handler() -> Option<GenericHandlerFactory<Self, D>> {
        Some(ByKeyValidatedHandler::<K, D>::create as GenericHandlerFactory<Self, D>)
    }
}

impl<P, D> HandlerRequest<D> for Insert<P>
where
    P: Send + Sync + 'static,
    D: Send + 'static,
{
    fn shape() -> RequestShape {
        RequestShape::Insert {
            payload: TypeKey::of::<P>(),
        }
    }

    fn generic_handler() -> Option<GenericHandlerFactory<Self, D>> {
        Some(InsertValidatedHandler::<P, D>::create as GenericHandlerFactory<Self, D>)
    }
}

impl<K, P, D> HandlerRequest<D> for Update<K, P>
where
    K: Send + Sync + 'static,
    P: Send + Sync + 'static,
    D: Send + 'static,
{
    fn shape() -> RequestShape {
        RequestShape::Update {
            key: TypeKey::of::<K>(),
            payload: TypeKey::of::<P>(),
        }
    }

    fn generic_handler() -> Option<GenericHandlerFactory<Self, D>> {
        Some(UpdateValidatedHandler::<K, P, D>::create as GenericHandlerFactory<Self, D>)
    }
}

impl<K, T> HandlerRequest<()> for Delete<K, T>
where
    K: Send + Sync + 'static,
    T: 'static,
{
    fn shape() -> RequestShape {
        RequestShape::Delete {
            key: TypeKey::of::<K>(),
            target: TypeKey::of::<T>(),
        }
    }

    fn generic_handler() -> Option<GenericHandlerFactory<Self, ()>> {
        Some(DeleteValidatedHandler::<K, T>::create as GenericHandlerFactory<Self, ()>)
    }
}

impl<D> HandlerRequest<Queryable<D>> for NoFilter
where
    D: Send + 'static,
{
    fn shape() -> RequestShape {
        RequestShape::NoFilter
    }

    fn result_shape() -> ResultShape {
        ResultShape::Queryable(TypeKey::of::<D>())
    }

    fn generic_handler() -> Option<GenericHandlerFactory<Self, Queryable<D>>> {
        Some(NoFilterQueryableValidatedHandler::<D>::create as GenericHandlerFactory<Self, Queryable<D>>)
    }
}
