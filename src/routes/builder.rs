//! Root route builder in its two modes and the group constructors.

use crate::case::to_kebab_case;
use crate::config::EndpointOptions;
use crate::dependencies::{Endpoint, EndpointHandler, HandlerInterface};
use crate::error::ServiceError;
use crate::routes::entity::{EntityKeySelectorRouteGroupBuilder, EntityRouteGroupBuilder};
use crate::routes::group::RouteGroup;
use crate::services::ServiceProvider;
use crate::state::AppState;
use crate::types::short_type_name;
use axum::Router;
use std::sync::Arc;

/// Application code that maps endpoints. Registered in the service collection and run twice:
/// once while describing (wiring) and once while binding (serving).
pub trait EndpointBuilder: Send + Sync {
    fn build(&self, routes: &mut EndpointRouteBuilder);
}

/// Link-time registration of an [`EndpointBuilder`], submitted with
/// [`submit_endpoint_builder!`](crate::submit_endpoint_builder) and picked up by
/// [`add_endpoint_builders`](crate::wiring::add_endpoint_builders).
pub struct EndpointBuilderRegistration {
    pub name: &'static str,
    pub create: fn() -> Arc<dyn EndpointBuilder>,
}

impl EndpointBuilderRegistration {
    pub const fn new(name: &'static str, create: fn() -> Arc<dyn EndpointBuilder>) -> Self {
        EndpointBuilderRegistration { name, create }
    }
}

inventory::collect!(EndpointBuilderRegistration);

/// Submit an [`EndpointBuilder`] type implementing `Default` for discovery by
/// [`add_endpoint_builders`](crate::wiring::add_endpoint_builders). Use at module scope.
#[macro_export]
macro_rules! submit_endpoint_builder {
    ($builder:ty) => {
        $crate::inventory::submit! {
            $crate::routes::EndpointBuilderRegistration::new(::std::stringify!($builder), || {
                ::std::sync::Arc::new(<$builder as ::std::default::Default>::default())
                    as ::std::sync::Arc<dyn $crate::routes::EndpointBuilder>
            })
        }
    };
}

enum Mode {
    Describe,
    Bind(Arc<ServiceProvider>),
}

pub struct EndpointRouteBuilder {
    options: EndpointOptions,
    mode: Mode,
    pending: Vec<HandlerInterface>,
    described: Vec<EndpointHandler>,
    router: Router<AppState>,
}

impl EndpointRouteBuilder {
    /// Records endpoints and their handler dependencies; builds no router.
    pub fn describe(options: EndpointOptions) -> Self {
        Self::with_mode(options, Mode::Describe)
    }

    /// Builds the real router; handlers are resolved from `services` per request.
    pub fn bind(options: EndpointOptions, services: Arc<ServiceProvider>) -> Self {
        Self::with_mode(options, Mode::Bind(services))
    }

    fn with_mode(options: EndpointOptions, mode: Mode) -> Self {
        EndpointRouteBuilder {
            options,
            mode,
            pending: Vec::new(),
            described: Vec::new(),
            router: Router::new(),
        }
    }

    pub fn options(&self) -> &EndpointOptions {
        &self.options
    }

    pub fn is_describing(&self) -> bool {
        matches!(self.mode, Mode::Describe)
    }

    /// The finished container.
    ///
    /// # Panics
    /// When describing: no container exists yet during wiring.
    pub fn services(&self) -> &Arc<ServiceProvider> {
        match &self.mode {
            Mode::Bind(services) => services,
            Mode::Describe => panic!("services are not available while describing endpoints"),
        }
    }

    pub(crate) fn declare(&mut self, handler: HandlerInterface) {
        self.pending.push(handler);
    }

    /// Pair the handler dependencies declared since the previous endpoint with `endpoint`.
    pub(crate) fn finish_endpoint(&mut self, endpoint: Endpoint) {
        for handler in self.pending.drain(..) {
            self.described.push(EndpointHandler::new(endpoint.clone(), handler));
        }
    }

    pub(crate) fn merge_group(&mut self, group: Router<AppState>) {
        let router = std::mem::take(&mut self.router);
        self.router = router.merge(group);
    }

    /// Endpoint/handler pairs recorded so far; leaves the builder empty.
    pub fn take_endpoint_handlers(&mut self) -> Vec<EndpointHandler> {
        std::mem::take(&mut self.described)
    }

    /// # Panics
    /// When describing.
    pub fn into_router(self) -> Router {
        match self.mode {
            Mode::Bind(services) => self.router.with_state(AppState::new(services)),
            Mode::Describe => panic!("a describing route builder cannot produce a router"),
        }
    }

    fn group_path(prefix: Option<&str>, name: &str) -> String {
        let name = name.trim_matches('/');
        match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
            Some(prefix) if name.is_empty() => format!("/{prefix}"),
            Some(prefix) => format!("/{prefix}/{name}"),
            None => format!("/{name}"),
        }
    }

    /// Plain group at `/{prefix}/{name}`; `name` is used as given. No response filter.
    pub fn map_route_group(&mut self, name: &str, prefix: Option<&str>, tag: Option<&str>) -> RouteGroup<'_> {
        let path = Self::group_path(prefix, name);
        RouteGroup::new(self, path, tag.map(str::to_string))
    }

    /// Plain group named after `T` (kebab-cased).
    pub fn map_route_group_for<T: ?Sized + 'static>(&mut self, prefix: Option<&str>, tag: Option<&str>) -> RouteGroup<'_> {
        let name = to_kebab_case(short_type_name(std::any::type_name::<T>()));
        self.map_route_group(&name, prefix, tag)
    }

    /// Filtered group at `/{api_prefix}/{kebab(T)}`, tagged with `T`'s name.
    pub fn map_root_route_group<T: ?Sized + 'static>(&mut self) -> RouteGroup<'_> {
        self.map_root_route_group_named(short_type_name(std::any::type_name::<T>()))
    }

    /// Filtered group at `/{api_prefix}/{kebab(name)}`, tagged with `name`.
    pub fn map_root_route_group_named(&mut self, name: &str) -> RouteGroup<'_> {
        let (path, tag) = self.conventional(name);
        RouteGroup::new(self, path, Some(tag)).with_result_filter()
    }

    fn conventional(&self, name: &str) -> (String, String) {
        let path = Self::group_path(Some(&self.options.api_prefix), &to_kebab_case(name));
        (path, name.to_string())
    }

    fn entity_group<E: 'static>(&mut self, name: Option<&str>, prefix: Option<&str>, tag: Option<&str>) -> RouteGroup<'_> {
        let type_name = short_type_name(std::any::type_name::<E>());
        let (path, tag) = match (name, prefix) {
            (None, None) => {
                let (path, default_tag) = self.conventional(type_name);
                (path, Some(tag.map(str::to_string).unwrap_or(default_tag)))
            }
            _ => {
                let segment = name.map(str::to_string).unwrap_or_else(|| to_kebab_case(type_name));
                (Self::group_path(prefix, &segment), tag.map(str::to_string))
            }
        };
        RouteGroup::new(self, path, tag)
            .with_entity::<E>()
            .with_result_filter()
    }

    /// `/{api_prefix}/{kebab(E)}` with entity metadata and the response filter.
    pub fn map_entity_route_group<E: 'static, K>(&mut self) -> EntityRouteGroupBuilder<'_, E, K> {
        EntityRouteGroupBuilder::new(self.entity_group::<E>(None, None, None))
    }

    /// `/{api_prefix}/{kebab(name)}`, tagged with `name`.
    pub fn map_entity_route_group_named<E: 'static, K>(&mut self, name: &str) -> EntityRouteGroupBuilder<'_, E, K> {
        EntityRouteGroupBuilder::new(self.named_entity_group::<E>(name))
    }

    /// `/{prefix}/{name}`; `name` defaults to `kebab(E)` and is used as given otherwise.
    pub fn map_entity_route_group_with<E: 'static, K>(
        &mut self,
        name: Option<&str>,
        prefix: Option<&str>,
        tag: Option<&str>,
    ) -> EntityRouteGroupBuilder<'_, E, K> {
        EntityRouteGroupBuilder::new(self.entity_group::<E>(name, prefix, tag))
    }

    /// Entity group answering with domain type `D` instead of `E`.
    pub fn map_entity_domain_route_group<E: 'static, K, D>(&mut self) -> EntityRouteGroupBuilder<'_, E, K, D> {
        EntityRouteGroupBuilder::new(self.entity_group::<E>(None, None, None))
    }

    pub fn map_entity_domain_route_group_named<E: 'static, K, D>(
        &mut self,
        name: &str,
    ) -> EntityRouteGroupBuilder<'_, E, K, D> {
        EntityRouteGroupBuilder::new(self.named_entity_group::<E>(name))
    }

    /// Entity group whose key is read from path parameters into `K` and projected to the
    /// entity key `P` by `selector`.
    pub fn map_entity_key_selector_route_group<E: 'static, K, P>(
        &mut self,
        selector: impl Fn(K) -> P + Send + Sync + 'static,
    ) -> EntityKeySelectorRouteGroupBuilder<'_, E, K, P> {
        let group = self.entity_group::<E>(None, None, None);
        EntityKeySelectorRouteGroupBuilder::new(group, Arc::new(selector))
    }

    /// Key-selector group at `/{api_prefix}/{kebab(name)}`, tagged with `name`.
    pub fn map_entity_key_selector_route_group_named<E: 'static, K, P>(
        &mut self,
        name: &str,
        selector: impl Fn(K) -> P + Send + Sync + 'static,
    ) -> EntityKeySelectorRouteGroupBuilder<'_, E, K, P> {
        let group = self.named_entity_group::<E>(name);
        EntityKeySelectorRouteGroupBuilder::new(group, Arc::new(selector))
    }

    /// Key-selector group at `/{prefix}/{name}`; `name` defaults to `kebab(E)`.
    pub fn map_entity_key_selector_route_group_with<E: 'static, K, P>(
        &mut self,
        name: Option<&str>,
        prefix: Option<&str>,
        tag: Option<&str>,
        selector: impl Fn(K) -> P + Send + Sync + 'static,
    ) -> EntityKeySelectorRouteGroupBuilder<'_, E, K, P> {
        let group = self.entity_group::<E>(name, prefix, tag);
        EntityKeySelectorRouteGroupBuilder::new(group, Arc::new(selector))
    }

    pub fn map_entity_key_selector_domain_route_group<E: 'static, K, P, D>(
        &mut self,
        selector: impl Fn(K) -> P + Send + Sync + 'static,
    ) -> EntityKeySelectorRouteGroupBuilder<'_, E, K, P, D> {
        let group = self.entity_group::<E>(None, None, None);
        EntityKeySelectorRouteGroupBuilder::new(group, Arc::new(selector))
    }

    pub fn map_entity_key_selector_domain_route_group_named<E: 'static, K, P, D>(
        &mut self,
        name: &str,
        selector: impl Fn(K) -> P + Send + Sync + 'static,
    ) -> EntityKeySelectorRouteGroupBuilder<'_, E, K, P, D> {
        let group = self.named_entity_group::<E>(name);
        EntityKeySelectorRouteGroupBuilder::new(group, Arc::new(selector))
    }

    fn named_entity_group<E: 'static>(&mut self, name: &str) -> RouteGroup<'_> {
        let (path, tag) = self.conventional(name);
        RouteGroup::new(self, path, Some(tag))
            .with_entity::<E>()
            .with_result_filter()
    }
}

/// Bind every registered [`EndpointBuilder`] into one router.
pub fn map_endpoint_builders(services: Arc<ServiceProvider>) -> Result<Router, ServiceError> {
    let builders = services.get_all::<dyn EndpointBuilder>()?;
    let options = services
        .get::<EndpointOptions>()
        .map(|o| (*o).clone())
        .unwrap_or_default();
    let mut routes = EndpointRouteBuilder::bind(options, services);
    for builder in &builders {
        builder.build(&mut routes);
    }
    tracing::debug!(builders = builders.len(), "endpoint builders mapped");
    Ok(routes.into_router())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{ByKey, Delete, Insert, NoFilter, Queryable, RequestShape, Update};
    use crate::services::ServiceCollection;
    use crate::types::TypeKey;
    use axum::http::Method;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct WidgetPart {
        id: i32,
    }

    #[derive(Deserialize)]
    struct PartKey {
        part_id: i32,
    }

    impl crate::operations::HandlerRequest<crate::file::FileResponse> for PartKey {}

    #[test]
    fn entity_group_describes_conventional_endpoints() {
        let mut routes = EndpointRouteBuilder::describe(EndpointOptions::default());
        routes
            .map_entity_route_group::<WidgetPart, i32>()
            .map_get_as_no_filter_queryable()
            .map_get_as_by_key()
            .map_post_as_insert::<WidgetPart>()
            .map_put_as_update_by_key::<WidgetPart>()
            .map_delete_as_by_key();

        let described = routes.take_endpoint_handlers();
        let summary: Vec<(Method, &str)> = described
            .iter()
            .map(|eh| (eh.endpoint.method.clone(), eh.endpoint.path.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Method::GET, "/api/widget-part"),
                (Method::GET, "/api/widget-part/:id"),
                (Method::POST, "/api/widget-part"),
                (Method::PUT, "/api/widget-part/:id"),
                (Method::DELETE, "/api/widget-part/:id"),
            ]
        );
        assert!(described
            .iter()
            .all(|eh| eh.endpoint.entity == Some(TypeKey::of::<WidgetPart>())
                && eh.endpoint.tags == vec!["WidgetPart".to_string()]));

        let interfaces: Vec<_> = described.iter().map(|eh| eh.handler).collect();
        assert_eq!(interfaces[0], HandlerInterface::of::<NoFilter, Queryable<WidgetPart>>());
        assert_eq!(interfaces[1], HandlerInterface::of::<ByKey<i32>, WidgetPart>());
        assert_eq!(interfaces[2], HandlerInterface::of::<Insert<WidgetPart>, WidgetPart>());
        assert_eq!(interfaces[3], HandlerInterface::of::<Update<i32, WidgetPart>, WidgetPart>());
        assert_eq!(interfaces[4], HandlerInterface::of::<Delete<i32, WidgetPart>, ()>());
        assert!(routes.take_endpoint_handlers().is_empty());
    }

    #[test]
    fn key_selector_group_depends_on_projected_key() {
        let mut routes = EndpointRouteBuilder::describe(EndpointOptions::default());
        routes
            .map_entity_key_selector_route_group::<WidgetPart, PartKey, i32>(|k: PartKey| k.part_id)
            .map_get_as_by_key("/:part_id");

        let described = routes.take_endpoint_handlers();
        assert_eq!(described.len(), 1);
        assert_eq!(described[0].endpoint.path, "/api/widget-part/:part_id");
        assert_eq!(
            described[0].handler.request(),
            RequestShape::ByKey { key: TypeKey::of::<i32>() }
        );
    }

    #[test]
    fn entity_group_key_pattern_is_configurable() {
        let mut routes = EndpointRouteBuilder::describe(EndpointOptions::default());
        {
            let mut parts = routes.map_entity_route_group::<WidgetPart, i32>();
            assert_eq!(parts.key_pattern(), "/:id");
            parts
                .with_key_pattern("/:part_id")
                .map_get_as_by_key()
                .map_put_as_update_by_key::<WidgetPart>()
                .map_delete_as_by_key();
        }

        let paths: Vec<String> = routes
            .take_endpoint_handlers()
            .into_iter()
            .map(|eh| eh.endpoint.path)
            .collect();
        assert_eq!(paths, vec!["/api/widget-part/:part_id"; 3]);
    }

    #[test]
    fn key_selector_groups_take_names_and_prefixes() {
        let mut routes = EndpointRouteBuilder::describe(EndpointOptions::default());
        routes
            .map_entity_key_selector_route_group_named::<WidgetPart, PartKey, i32>("Parts", |k: PartKey| k.part_id)
            .map_get_as_by_key("/:part_id");
        routes
            .map_entity_key_selector_route_group_with::<WidgetPart, PartKey, i32>(
                Some("parts"),
                Some("admin"),
                Some("Admin"),
                |k: PartKey| k.part_id,
            )
            .map_delete_as_by_key("/:part_id");

        let described = routes.take_endpoint_handlers();
        assert_eq!(described[0].endpoint.path, "/api/parts/:part_id");
        assert_eq!(described[0].endpoint.tags, vec!["Parts".to_string()]);
        assert_eq!(described[1].endpoint.path, "/admin/parts/:part_id");
        assert_eq!(described[1].endpoint.tags, vec!["Admin".to_string()]);
        assert!(described
            .iter()
            .all(|eh| eh.endpoint.entity == Some(TypeKey::of::<WidgetPart>())));
    }

    #[test]
    fn file_endpoints_record_their_content_type() {
        let mut routes = EndpointRouteBuilder::describe(EndpointOptions::default());
        routes
            .map_root_route_group::<WidgetPart>()
            .map_get_file::<PartKey>("/export");

        let described = routes.take_endpoint_handlers();
        assert_eq!(described[0].endpoint.produces, Some("application/octet-stream"));
        assert_eq!(
            described[0].endpoint.to_string(),
            "GET /api/widget-part/export -> application/octet-stream"
        );
    }

    #[test]
    fn plain_groups_use_name_as_given() {
        let mut routes = EndpointRouteBuilder::describe(EndpointOptions::with_api_prefix("v1").unwrap());
        {
            let group = routes.map_route_group("Reports", Some("internal"), None);
            assert_eq!(group.path(), "/internal/Reports");
            assert!(!group.is_filtered());
        }
        let root = routes.map_root_route_group::<WidgetPart>();
        assert_eq!(root.path(), "/v1/widget-part");
        assert_eq!(root.tag(), Some("WidgetPart"));
        assert!(root.is_filtered());
        assert!(root.entity().is_none());
    }

    #[test]
    fn custom_group_name_and_prefix() {
        let mut routes = EndpointRouteBuilder::describe(EndpointOptions::default());
        let builder = routes.map_entity_route_group_with::<WidgetPart, i32>(Some("parts"), Some("admin"), Some("Parts"));
        assert_eq!(builder.group().path(), "/admin/parts");
        assert_eq!(builder.group().tag(), Some("Parts"));
    }

    #[test]
    #[should_panic(expected = "describing")]
    fn describing_builder_has_no_services() {
        let routes = EndpointRouteBuilder::describe(EndpointOptions::default());
        let _ = routes.services();
    }

    #[test]
    #[should_panic(expected = "describing")]
    fn describing_builder_has_no_router() {
        let _ = EndpointRouteBuilder::describe(EndpointOptions::default()).into_router();
    }

    #[test]
    fn binding_builder_exposes_services() {
        let services = Arc::new(ServiceCollection::new().build());
        let routes = EndpointRouteBuilder::bind(EndpointOptions::default(), services.clone());
        assert!(!routes.is_describing());
        assert!(Arc::ptr_eq(routes.services(), &services));
    }
}
