//! A route group and the mappings available on any group.

use crate::dependencies::{Endpoint, HandlerInterface};
use crate::error::AppError;
use crate::file::FileResponse;
use crate::operations::{ByKey, Delete, HandlerRequest, Insert, NoFilter, Queryable, Update};
use crate::result::{validated_result_filter, ResultPayload};
use crate::routes::builder::EndpointRouteBuilder;
use crate::state::AppState;
use crate::types::TypeKey;
use crate::validated::{ValidatedHandler, ValidatedResult};
use axum::{
    extract::{Path, Query, State},
    handler::Handler,
    http::Method,
    middleware::map_response,
    routing::{delete, get, post, put, MethodRouter},
    Json, Router,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub(crate) type Selector<K, P> = Arc<dyn Fn(K) -> P + Send + Sync>;

#[derive(Clone, Copy, Debug)]
enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Put => Method::PUT,
            Verb::Delete => Method::DELETE,
        }
    }

    fn route<H, T>(self, handler: H) -> MethodRouter<AppState>
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        match self {
            Verb::Get => get(handler),
            Verb::Post => post(handler),
            Verb::Put => put(handler),
            Verb::Delete => delete(handler),
        }
    }
}

/// Resolve the route's handler from the container and run it.
async fn dispatch<Req, Res>(state: &AppState, request: Req) -> Result<ValidatedResult<Res>, AppError>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    let handler = state.services.get::<dyn ValidatedHandler<Req, Res>>()?;
    handler.handle(request).await
}

/// Endpoints sharing a path prefix, tag and (for entity groups) entity metadata.
///
/// While binding, the group's routes are collected into their own router, which is merged
/// into the root router when the group is dropped. Filtered groups get the
/// [`validated_result_filter`] layer once.
pub struct RouteGroup<'a> {
    routes: &'a mut EndpointRouteBuilder,
    path: String,
    tag: Option<String>,
    entity: Option<TypeKey>,
    filtered: bool,
    router: Router<AppState>,
}

impl<'a> RouteGroup<'a> {
    pub(crate) fn new(routes: &'a mut EndpointRouteBuilder, path: String, tag: Option<String>) -> Self {
        RouteGroup {
            routes,
            path,
            tag,
            entity: None,
            filtered: false,
            router: Router::new(),
        }
    }

    /// Attach entity metadata to every endpoint mapped from now on.
    pub fn with_entity<E: 'static>(mut self) -> Self {
        self.entity = Some(TypeKey::of::<E>());
        self
    }

    /// Attach the response filter to this group.
    pub fn with_result_filter(mut self) -> Self {
        self.filtered = true;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn entity(&self) -> Option<TypeKey> {
        self.entity
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    fn endpoint_path(&self, pattern: &str) -> String {
        let pattern = pattern.trim_end_matches('/');
        if pattern.is_empty() {
            self.path.clone()
        } else if pattern.starts_with('/') {
            format!("{}{}", self.path, pattern)
        } else {
            format!("{}/{}", self.path, pattern)
        }
    }

    fn map_endpoint<Req, Res, H, T>(
        &mut self,
        verb: Verb,
        pattern: &str,
        produces: Option<&'static str>,
        handler: H,
    ) -> &mut Self
    where
        Req: HandlerRequest<Res>,
        Res: Send + 'static,
        H: Handler<T, AppState>,
        T: 'static,
    {
        let endpoint = Endpoint {
            method: verb.method(),
            path: self.endpoint_path(pattern),
            tags: self.tag.iter().cloned().collect(),
            entity: self.entity,
            produces,
        };
        let interface = HandlerInterface::of::<Req, Res>();
        tracing::debug!(endpoint = %endpoint, handler = %interface, "endpoint mapped");
        if self.routes.is_describing() {
            self.routes.declare(interface);
            self.routes.finish_endpoint(endpoint);
        } else {
            let router = std::mem::take(&mut self.router);
            self.router = router.route(&endpoint.path, verb.route(handler));
        }
        self
    }

    /// `GET` listing every `D`; depends on `dyn ValidatedHandler<NoFilter, Queryable<D>>`.
    pub fn map_get_as_no_filter_queryable<D>(&mut self, pattern: &str) -> &mut Self
    where
        D: Send + 'static,
        Queryable<D>: ResultPayload,
    {
        self.map_endpoint::<NoFilter, Queryable<D>, _, _>(
            Verb::Get,
            pattern,
            None,
            |State(state): State<AppState>| async move {
                dispatch::<NoFilter, Queryable<D>>(&state, NoFilter).await
            },
        )
    }

    /// `GET` one `D` by the key in the path.
    pub fn map_get_as_by_key<K, D>(&mut self, pattern: &str) -> &mut Self
    where
        K: DeserializeOwned + Send + Sync + 'static,
        D: ResultPayload + Send + 'static,
    {
        self.map_get_as_by_key_selected::<K, K, D>(pattern, Arc::new(|key: K| key))
    }

    pub(crate) fn map_get_as_by_key_selected<K, P, D>(&mut self, pattern: &str, select: Selector<K, P>) -> &mut Self
    where
        K: DeserializeOwned + Send + 'static,
        P: Send + Sync + 'static,
        D: ResultPayload + Send + 'static,
    {
        self.map_endpoint::<ByKey<P>, D, _, _>(
            Verb::Get,
            pattern,
            None,
            move |State(state): State<AppState>, Path(key): Path<K>| {
                let request = ByKey::new(select(key));
                async move { dispatch::<ByKey<P>, D>(&state, request).await }
            },
        )
    }

    /// `GET` with a custom request read from the query string.
    pub fn map_get<Req, Res>(&mut self, pattern: &str) -> &mut Self
    where
        Req: HandlerRequest<Res> + DeserializeOwned,
        Res: ResultPayload + Send + 'static,
    {
        self.map_endpoint::<Req, Res, _, _>(
            Verb::Get,
            pattern,
            None,
            |State(state): State<AppState>, Query(request): Query<Req>| async move {
                dispatch::<Req, Res>(&state, request).await
            },
        )
    }

    /// `GET` returning a file download.
    pub fn map_get_file<Req>(&mut self, pattern: &str) -> &mut Self
    where
        Req: HandlerRequest<FileResponse> + DeserializeOwned,
    {
        self.map_endpoint::<Req, FileResponse, _, _>(
            Verb::Get,
            pattern,
            Some("application/octet-stream"),
            |State(state): State<AppState>, Query(request): Query<Req>| async move {
                dispatch::<Req, FileResponse>(&state, request).await
            },
        )
    }

    /// `POST` creating from a JSON `P`, answering with `D`.
    pub fn map_post_as_insert<P, D>(&mut self, pattern: &str) -> &mut Self
    where
        P: DeserializeOwned + Send + Sync + 'static,
        D: ResultPayload + Send + 'static,
    {
        self.map_endpoint::<Insert<P>, D, _, _>(
            Verb::Post,
            pattern,
            None,
            |State(state): State<AppState>, Json(payload): Json<P>| async move {
                dispatch::<Insert<P>, D>(&state, Insert::new(payload)).await
            },
        )
    }

    /// `POST` with a custom request read from the JSON body.
    pub fn map_post<Req, Res>(&mut self, pattern: &str) -> &mut Self
    where
        Req: HandlerRequest<Res> + DeserializeOwned,
        Res: ResultPayload + Send + 'static,
    {
        self.map_endpoint::<Req, Res, _, _>(
            Verb::Post,
            pattern,
            None,
            |State(state): State<AppState>, Json(request): Json<Req>| async move {
                dispatch::<Req, Res>(&state, request).await
            },
        )
    }

    /// `POST` whose handler returns no payload.
    pub fn map_post_no_result<Req>(&mut self, pattern: &str) -> &mut Self
    where
        Req: HandlerRequest<()> + DeserializeOwned,
    {
        self.map_post::<Req, ()>(pattern)
    }

    /// `PUT` applying a JSON `P` to the item under the path key.
    pub fn map_put_as_update_by_key<K, P, D>(&mut self, pattern: &str) -> &mut Self
    where
        K: DeserializeOwned + Send + Sync + 'static,
        P: DeserializeOwned + Send + Sync + 'static,
        D: ResultPayload + Send + 'static,
    {
        self.map_put_as_update_by_key_selected::<K, K, P, D>(pattern, Arc::new(|key: K| key))
    }

    pub(crate) fn map_put_as_update_by_key_selected<K, S, P, D>(
        &mut self,
        pattern: &str,
        select: Selector<K, S>,
    ) -> &mut Self
    where
        K: DeserializeOwned + Send + 'static,
        S: Send + Sync + 'static,
        P: DeserializeOwned + Send + Sync + 'static,
        D: ResultPayload + Send + 'static,
    {
        self.map_endpoint::<Update<S, P>, D, _, _>(
            Verb::Put,
            pattern,
            None,
            move |State(state): State<AppState>, Path(key): Path<K>, Json(payload): Json<P>| {
                let request = Update::new(select(key), payload);
                async move { dispatch::<Update<S, P>, D>(&state, request).await }
            },
        )
    }

    /// `DELETE` the `T` under the path key.
    pub fn map_delete_as_by_key<K, T>(&mut self, pattern: &str) -> &mut Self
    where
        K: DeserializeOwned + Send + Sync + 'static,
        T: 'static,
    {
        self.map_delete_as_by_key_selected::<K, K, T>(pattern, Arc::new(|key: K| key))
    }

    pub(crate) fn map_delete_as_by_key_selected<K, S, T>(&mut self, pattern: &str, select: Selector<K, S>) -> &mut Self
    where
        K: DeserializeOwned + Send + 'static,
        S: Send + Sync + 'static,
        T: 'static,
    {
        self.map_endpoint::<Delete<S, T>, (), _, _>(
            Verb::Delete,
            pattern,
            None,
            move |State(state): State<AppState>, Path(key): Path<K>| {
                let request = Delete::<S, T>::new(select(key));
                async move { dispatch::<Delete<S, T>, ()>(&state, request).await }
            },
        )
    }
}

impl Drop for RouteGroup<'_> {
    fn drop(&mut self) {
        if self.routes.is_describing() {
            return;
        }
        let mut router = std::mem::take(&mut self.router);
        if self.filtered {
            router = router.layer(map_response(validated_result_filter));
        }
        self.routes.merge_group(router);
    }
}
