//! Type-erased conversions between payload, entity and domain types.
//!
//! Generic handlers only know the entity at runtime, so the conversions they need are looked
//! up here by `(from, to)` type pair. Conversions between a type and itself are implicit.

use crate::error::{ServiceError, StoreError};
use crate::store::{AnyValue, MergeFn};
use crate::types::TypeKey;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Applies an update payload onto an existing value in place.
pub trait MergeInto<T> {
    fn merge_into(self, target: &mut T);
}

pub(crate) type ConvertFn = Arc<dyn Fn(AnyValue) -> Result<AnyValue, StoreError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct TypeMappers {
    converters: HashMap<(TypeKey, TypeKey), ConvertFn>,
    merges: HashMap<(TypeKey, TypeKey), MergeFn>,
}

impl TypeMappers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `A -> B` through `Into`.
    pub fn add<A, B>(&mut self) -> &mut Self
    where
        A: Into<B> + Send + 'static,
        B: Send + 'static,
    {
        self.add_with(|a: A| a.into())
    }

    /// Register `A -> B` with an explicit function. Replaces an earlier registration.
    pub fn add_with<A, B, F>(&mut self, f: F) -> &mut Self
    where
        A: Send + 'static,
        B: Send + 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        let pair = (TypeKey::of::<A>(), TypeKey::of::<B>());
        tracing::debug!(from = %pair.0, to = %pair.1, "type mapping added");
        self.converters.insert(
            pair,
            Arc::new(move |value: AnyValue| Ok(AnyValue::new(f(value.downcast::<A>()?)))),
        );
        self
    }

    /// Register how payload `P` updates an existing `T`.
    pub fn add_merge<P, T>(&mut self) -> &mut Self
    where
        P: MergeInto<T> + Send + 'static,
        T: Send + 'static,
    {
        let pair = (TypeKey::of::<P>(), TypeKey::of::<T>());
        tracing::debug!(from = %pair.0, to = %pair.1, "merge mapping added");
        self.merges.insert(
            pair,
            Arc::new(|payload: AnyValue, target: &mut AnyValue| {
                let payload = payload.downcast::<P>()?;
                let mut current = take(target).downcast::<T>()?;
                payload.merge_into(&mut current);
                *target = AnyValue::new(current);
                Ok(())
            }),
        );
        self
    }

    /// Whether a value of type `from` can be turned into `to`.
    pub fn contains(&self, from: TypeKey, to: TypeKey) -> bool {
        from == to || self.converters.contains_key(&(from, to))
    }

    /// Whether payload `from` can update a `to`, by merge, replacement or conversion.
    pub fn contains_merge(&self, from: TypeKey, to: TypeKey) -> bool {
        self.merges.contains_key(&(from, to)) || self.contains(from, to)
    }

    /// Convert a value with a registered mapping.
    pub fn map<A, B>(&self, value: A) -> Result<B, ServiceError>
    where
        A: Send + 'static,
        B: Send + 'static,
    {
        let convert = self.converter(TypeKey::of::<A>(), TypeKey::of::<B>())?;
        convert(AnyValue::new(value))
            .and_then(AnyValue::downcast::<B>)
            .map_err(|_| ServiceError::TypeMismatch(std::any::type_name::<B>()))
    }

    pub(crate) fn converter(&self, from: TypeKey, to: TypeKey) -> Result<ConvertFn, ServiceError> {
        if from == to {
            return Ok(Arc::new(Ok::<AnyValue, StoreError>));
        }
        self.converters
            .get(&(from, to))
            .cloned()
            .ok_or(ServiceError::MissingMapping {
                from: from.name(),
                to: to.name(),
            })
    }

    /// Merge function for `from` onto `to`. Falls back to replacing the target with the
    /// payload (converted when the types differ).
    pub(crate) fn merger(&self, from: TypeKey, to: TypeKey) -> Result<MergeFn, ServiceError> {
        if let Some(merge) = self.merges.get(&(from, to)) {
            return Ok(merge.clone());
        }
        let convert = self.converter(from, to)?;
        Ok(Arc::new(move |payload: AnyValue, target: &mut AnyValue| {
            *target = convert(payload)?;
            Ok(())
        }))
    }
}

fn take(slot: &mut AnyValue) -> AnyValue {
    std::mem::replace(slot, AnyValue::new(()))
}

impl fmt::Debug for TypeMappers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMappers")
            .field("converters", &self.converters.len())
            .field("merges", &self.merges.len())
            .finish()
    }
}
