//! Typed route groups for one entity.
//!
//! `EntityRouteGroupBuilder<E, K, D>` maps the five conventional endpoints for entity `E`
//! with key `K`, answering with `D` (defaults to `E`). The `*_as` variants answer with another
//! type for a single endpoint. Keyed endpoints use [`KEY_PATTERN`] unless the group sets its
//! own with `with_key_pattern`. Key-selector groups read the key from named path parameters
//! into `K` and project it to the entity key `P`.

use crate::operations::Queryable;
use crate::result::ResultPayload;
use crate::routes::group::{RouteGroup, Selector};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Default path pattern for keyed endpoints.
pub const KEY_PATTERN: &str = "/:id";

pub struct EntityRouteGroupBuilder<'a, E, K, D = E> {
    group: RouteGroup<'a>,
    key_pattern: String,
    _types: PhantomData<fn() -> (E, K, D)>,
}

impl<'a, E, K, D> EntityRouteGroupBuilder<'a, E, K, D> {
    pub(crate) fn new(group: RouteGroup<'a>) -> Self {
        EntityRouteGroupBuilder {
            group,
            key_pattern: KEY_PATTERN.to_string(),
            _types: PhantomData,
        }
    }

    /// Path pattern for the keyed endpoints mapped after this call, e.g. `"/:widget_id"`.
    /// The single path parameter deserialises into `K`.
    pub fn with_key_pattern(&mut self, pattern: &str) -> &mut Self {
        self.key_pattern = pattern.to_string();
        self
    }

    pub fn key_pattern(&self) -> &str {
        &self.key_pattern
    }

    pub fn group(&self) -> &RouteGroup<'a> {
        &self.group
    }

    pub fn group_mut(&mut self) -> &mut RouteGroup<'a> {
        &mut self.group
    }

    pub fn into_group(self) -> RouteGroup<'a> {
        self.group
    }
}

impl<'a, E, K, D> EntityRouteGroupBuilder<'a, E, K, D>
where
    E: 'static,
    K: DeserializeOwned + Send + Sync + 'static,
    D: Serialize + Send + 'static,
{
    /// `GET {group}`: `dyn ValidatedHandler<NoFilter, Queryable<D>>`.
    pub fn map_get_as_no_filter_queryable(&mut self) -> &mut Self {
        self.map_get_as_no_filter_queryable_as::<D>()
    }

    pub fn map_get_as_no_filter_queryable_as<D2>(&mut self) -> &mut Self
    where
        D2: Send + 'static,
        Queryable<D2>: ResultPayload,
    {
        self.group.map_get_as_no_filter_queryable::<D2>("");
        self
    }

    /// `GET {group}{key_pattern}`: `dyn ValidatedHandler<ByKey<K>, D>`.
    pub fn map_get_as_by_key(&mut self) -> &mut Self {
        self.map_get_as_by_key_as::<D>()
    }

    pub fn map_get_as_by_key_as<D2>(&mut self) -> &mut Self
    where
        D2: ResultPayload + Send + 'static,
    {
        self.group.map_get_as_by_key::<K, D2>(&self.key_pattern);
        self
    }

    /// `POST {group}`: `dyn ValidatedHandler<Insert<P>, D>`.
    pub fn map_post_as_insert<P>(&mut self) -> &mut Self
    where
        P: DeserializeOwned + Send + Sync + 'static,
    {
        self.map_post_as_insert_as::<P, D>()
    }

    pub fn map_post_as_insert_as<P, D2>(&mut self) -> &mut Self
    where
        P: DeserializeOwned + Send + Sync + 'static,
        D2: ResultPayload + Send + 'static,
    {
        self.group.map_post_as_insert::<P, D2>("");
        self
    }

    /// `PUT {group}{key_pattern}`: `dyn ValidatedHandler<Update<K, P>, D>`.
    pub fn map_put_as_update_by_key<P>(&mut self) -> &mut Self
    where
        P: DeserializeOwned + Send + Sync + 'static,
    {
        self.map_put_as_update_by_key_as::<P, D>()
    }

    pub fn map_put_as_update_by_key_as<P, D2>(&mut self) -> &mut Self
    where
        P: DeserializeOwned + Send + Sync + 'static,
        D2: ResultPayload + Send + 'static,
    {
        self.group.map_put_as_update_by_key::<K, P, D2>(&self.key_pattern);
        self
    }

    /// `DELETE {group}{key_pattern}`: `dyn ValidatedHandler<Delete<K, D>, ()>`.
    pub fn map_delete_as_by_key(&mut self) -> &mut Self {
        self.map_delete_as_by_key_as::<D>()
    }

    pub fn map_delete_as_by_key_as<T: 'static>(&mut self) -> &mut Self {
        self.group.map_delete_as_by_key::<K, T>(&self.key_pattern);
        self
    }
}

pub struct EntityKeySelectorRouteGroupBuilder<'a, E, K, P, D = E> {
    group: RouteGroup<'a>,
    selector: Selector<K, P>,
    _types: PhantomData<fn() -> (E, D)>,
}

impl<'a, E, K, P, D> EntityKeySelectorRouteGroupBuilder<'a, E, K, P, D> {
    pub(crate) fn new(group: RouteGroup<'a>, selector: Selector<K, P>) -> Self {
        EntityKeySelectorRouteGroupBuilder {
            group,
            selector,
            _types: PhantomData,
        }
    }

    pub fn group(&self) -> &RouteGroup<'a> {
        &self.group
    }

    pub fn group_mut(&mut self) -> &mut RouteGroup<'a> {
        &mut self.group
    }

    pub fn into_group(self) -> RouteGroup<'a> {
        self.group
    }
}

impl<'a, E, K, P, D> EntityKeySelectorRouteGroupBuilder<'a, E, K, P, D>
where
    E: 'static,
    K: DeserializeOwned + Send + 'static,
    P: Send + Sync + 'static,
    D: Serialize + Send + 'static,
{
    pub fn map_get_as_no_filter_queryable(&mut self) -> &mut Self {
        self.group.map_get_as_no_filter_queryable::<D>("");
        self
    }

    /// `GET {group}{pattern}`: `dyn ValidatedHandler<ByKey<P>, D>`. The pattern names the
    /// path parameters `K` deserialises from, e.g. `"/:widget_id"`.
    pub fn map_get_as_by_key(&mut self, pattern: &str) -> &mut Self {
        self.map_get_as_by_key_as::<D>(pattern)
    }

    pub fn map_get_as_by_key_as<D2>(&mut self, pattern: &str) -> &mut Self
    where
        D2: ResultPayload + Send + 'static,
    {
        self.group
            .map_get_as_by_key_selected::<K, P, D2>(pattern, self.selector.clone());
        self
    }

    pub fn map_post_as_insert<U>(&mut self) -> &mut Self
    where
        U: DeserializeOwned + Send + Sync + 'static,
    {
        self.group.map_post_as_insert::<U, D>("");
        self
    }

    /// `PUT {group}{pattern}`: `dyn ValidatedHandler<Update<P, U>, D>`.
    pub fn map_put_as_update_by_key<U>(&mut self, pattern: &str) -> &mut Self
    where
        U: DeserializeOwned + Send + Sync + 'static,
    {
        self.map_put_as_update_by_key_as::<U, D>(pattern)
    }

    pub fn map_put_as_update_by_key_as<U, D2>(&mut self, pattern: &str) -> &mut Self
    where
        U: DeserializeOwned + Send + Sync + 'static,
        D2: ResultPayload + Send + 'static,
    {
        self.group
            .map_put_as_update_by_key_selected::<K, P, U, D2>(pattern, self.selector.clone());
        self
    }

    /// `DELETE {group}{pattern}`: `dyn ValidatedHandler<Delete<P, D>, ()>`.
    pub fn map_delete_as_by_key(&mut self, pattern: &str) -> &mut Self {
        self.map_delete_as_by_key_as::<D>(pattern)
    }

    pub fn map_delete_as_by_key_as<T: 'static>(&mut self, pattern: &str) -> &mut Self {
        self.group
            .map_delete_as_by_key_selected::<K, P, T>(pattern, self.selector.clone());
        self
    }
}
