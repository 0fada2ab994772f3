//! Generic handler implementations for the conventional request shapes.
//!
//! Each handler is built per resolution from a [`HandlerBinding`]: the entity the request
//! resolved to, plus the domain type when the route works with a projection. Conversions
//! between payload, entity and result types come from the registered [`TypeMappers`].

use crate::error::ServiceError;
use crate::mapping::{ConvertFn, TypeMappers};
use crate::operations::{ByKey, Delete, Insert, NoFilter, Queryable, Update};
use crate::services::ServiceProvider;
use crate::store::{AnyValue, ErasedStore, MergeFn};
use crate::types::{EntityDefinition, TypeKey};
use crate::validated::{HandlerResult, ValidatedHandler, ValidatedResult};
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;

/// What a registrar resolved for one handler interface.
#[derive(Clone, Debug)]
pub struct HandlerBinding {
    pub entity: EntityDefinition,
    pub domain: Option<TypeKey>,
}

impl HandlerBinding {
    pub fn new(entity: EntityDefinition, domain: Option<TypeKey>) -> Self {
        HandlerBinding { entity, domain }
    }
}

fn mappers(provider: &ServiceProvider) -> Result<Arc<TypeMappers>, ServiceError> {
    provider.get::<TypeMappers>()
}

fn to_result<R: 'static>(convert: &ConvertFn, entity: AnyValue) -> Result<R, crate::error::StoreError> {
    convert(entity)?.downcast::<R>()
}

pub struct ByKeyValidatedHandler<K, R> {
    store: Arc<dyn ErasedStore>,
    to_result: ConvertFn,
    _types: PhantomData<fn(K) -> R>,
}

impl<K, R> ByKeyValidatedHandler<K, R>
where
    K: Send + Sync + 'static,
    R: Send + 'static,
{
    pub(crate) fn create(
        binding: &HandlerBinding,
        provider: &ServiceProvider,
    ) -> Result<Arc<dyn ValidatedHandler<ByKey<K>, R>>, ServiceError> {
        let to_result = mappers(provider)?.converter(binding.entity.entity_type, TypeKey::of::<R>())?;
        Ok(Arc::new(ByKeyValidatedHandler {
            store: binding.entity.store(provider)?,
            to_result,
            _types: PhantomData,
        }))
    }
}

#[async_trait]
impl<K, R> ValidatedHandler<ByKey<K>, R> for ByKeyValidatedHandler<K, R>
where
    K: Send + Sync + 'static,
    R: Send + 'static,
{
    async fn handle(&self, request: ByKey<K>) -> HandlerResult<R> {
        match self.store.get(AnyValue::new(request.key)).await? {
            Some(entity) => Ok(ValidatedResult::ok(to_result(&self.to_result, entity)?)),
            None => Ok(ValidatedResult::not_found()),
        }
    }
}

pub struct InsertValidatedHandler<P, R> {
    store: Arc<dyn ErasedStore>,
    to_entity: ConvertFn,
    to_result: ConvertFn,
    _types: PhantomData<fn(P) -> R>,
}

impl<P, R> InsertValidatedHandler<P, R>
where
    P: Send + Sync + 'static,
    R: Send + 'static,
{
    pub(crate) fn create(
        binding: &HandlerBinding,
        provider: &ServiceProvider,
    ) -> Result<Arc<dyn ValidatedHandler<Insert<P>, R>>, ServiceError> {
        let mappers = mappers(provider)?;
        let entity = binding.entity.entity_type;
        Ok(Arc::new(InsertValidatedHandler {
            store: binding.entity.store(provider)?,
            to_entity: mappers.converter(TypeKey::of::<P>(), entity)?,
            to_result: mappers.converter(entity, TypeKey::of::<R>())?,
            _types: PhantomData,
        }))
    }
}

#[async_trait]
impl<P, R> ValidatedHandler<Insert<P>, R> for InsertValidatedHandler<P, R>
where
    P: Send + Sync + 'static,
    R: Send + 'static,
{
    async fn handle(&self, request: Insert<P>) -> HandlerResult<R> {
        let entity = (self.to_entity)(AnyValue::new(request.payload))?;
        let stored = self.store.insert(entity).await?;
        Ok(ValidatedResult::ok(to_result(&self.to_result, stored)?))
    }
}

pub struct UpdateValidatedHandler<K, P, R> {
    store: Arc<dyn ErasedStore>,
    merge: MergeFn,
    to_result: ConvertFn,
    _types: PhantomData<fn(K, P) -> R>,
}

impl<K, P, R> UpdateValidatedHandler<K, P, R>
where
    K: Send + Sync + 'static,
    P: Send + Sync + 'static,
    R: Send + 'static,
{
    pub(crate) fn create(
        binding: &HandlerBinding,
        provider: &ServiceProvider,
    ) -> Result<Arc<dyn ValidatedHandler<Update<K, P>, R>>, ServiceError> {
        let mappers = mappers(provider)?;
        let entity = binding.entity.entity_type;
        Ok(Arc::new(UpdateValidatedHandler {
            store: binding.entity.store(provider)?,
            merge: mappers.merger(TypeKey::of::<P>(), entity)?,
            to_result: mappers.converter(entity, TypeKey::of::<R>())?,
            _types: PhantomData,
        }))
    }
}

#[async_trait]
impl<K, P, R> ValidatedHandler<Update<K, P>, R> for UpdateValidatedHandler<K, P, R>
where
    K: Send + Sync + 'static,
    P: Send + Sync + 'static,
    R: Send + 'static,
{
    async fn handle(&self, request: Update<K, P>) -> HandlerResult<R> {
        let updated = self
            .store
            .update(
                AnyValue::new(request.key),
                AnyValue::new(request.payload),
                self.merge.clone(),
            )
            .await?;
        match updated {
            Some(entity) => Ok(ValidatedResult::ok(to_result(&self.to_result, entity)?)),
            None => Ok(ValidatedResult::not_found()),
        }
    }
}

pub struct DeleteValidatedHandler<K, T> {
    store: Arc<dyn ErasedStore>,
    _types: PhantomData<fn(K) -> T>,
}

impl<K, T> DeleteValidatedHandler<K, T>
where
    K: Send + Sync + 'static,
    T: 'static,
{
    pub(crate) fn create(
        binding: &HandlerBinding,
        provider: &ServiceProvider,
    ) -> Result<Arc<dyn ValidatedHandler<Delete<K, T>, ()>>, ServiceError> {
        Ok(Arc::new(DeleteValidatedHandler {
            store: binding.entity.store(provider)?,
            _types: PhantomData,
        }))
    }
}

#[async_trait]
impl<K, T> ValidatedHandler<Delete<K, T>, ()> for DeleteValidatedHandler<K, T>
where
    K: Send + Sync + 'static,
    T: 'static,
{
    async fn handle(&self, request: Delete<K, T>) -> HandlerResult<()> {
        if self.store.delete(AnyValue::new(request.key)).await? {
            Ok(ValidatedResult::success())
        } else {
            Ok(ValidatedResult::not_found())
        }
    }
}

pub struct NoFilterQueryableValidatedHandler<R> {
    store: Arc<dyn ErasedStore>,
    to_result: ConvertFn,
    _types: PhantomData<fn() -> R>,
}

impl<R> NoFilterQueryableValidatedHandler<R>
where
    R: Send + 'static,
{
    pub(crate) fn create(
        binding: &HandlerBinding,
        provider: &ServiceProvider,
    ) -> Result<Arc<dyn ValidatedHandler<NoFilter, Queryable<R>>>, ServiceError> {
        let to_result = mappers(provider)?.converter(binding.entity.entity_type, TypeKey::of::<R>())?;
        Ok(Arc::new(NoFilterQueryableValidatedHandler {
            store: binding.entity.store(provider)?,
            to_result,
            _types: PhantomData,
        }))
    }
}

#[async_trait]
impl<R> ValidatedHandler<NoFilter, Queryable<R>> for NoFilterQueryableValidatedHandler<R>
where
    R: Send + 'static,
{
    async fn handle(&self, _request: NoFilter) -> HandlerResult<Queryable<R>> {
        let rows = self.store.all().await?;
        let items = rows
            .into_iter()
            .map(|row| to_result::<R>(&self.to_result, row))
            .collect::<Result<Queryable<R>, _>>()?;
        Ok(ValidatedResult::ok(items))
    }
}
