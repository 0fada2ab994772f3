//! Discovering which handler interfaces the application's routes depend on.
//!
//! Every [`EndpointBuilder`] is run once against a describing [`EndpointRouteBuilder`]: mapping
//! an endpoint records its method, path, tags and entity metadata together with the
//! `dyn ValidatedHandler<Req, Res>` it will resolve at request time. No router is built and no
//! container is needed.

use crate::config::EndpointOptions;
use crate::handlers::HandlerBinding;
use crate::operations::{HandlerRequest, RequestShape, ResultShape};
use crate::routes::{EndpointBuilder, EndpointRouteBuilder};
use crate::services::{ServiceCollection, ServiceDescriptor};
use crate::types::{EntityDefinition, EntityDefinitionResolver, TypeKey};
use crate::resolver::EntityTypeResolver;
use crate::validated::ValidatedHandler;
use axum::http::Method;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A route as seen during discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub path: String,
    pub tags: Vec<String>,
    /// Entity attached by an entity route group.
    pub entity: Option<TypeKey>,
    /// Content type of a successful response when it is not JSON.
    pub produces: Option<&'static str>,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        match self.produces {
            Some(content_type) => write!(f, " -> {content_type}"),
            None => Ok(()),
        }
    }
}

type DescriptorFn = fn(HandlerBinding) -> Option<ServiceDescriptor>;

/// One `dyn ValidatedHandler<Req, Res>` dependency, described as data.
#[derive(Clone, Copy)]
pub struct HandlerInterface {
    service: TypeKey,
    request: RequestShape,
    result: ResultShape,
    generic: bool,
    descriptor: DescriptorFn,
}

impl HandlerInterface {
    pub fn of<Req, Res>() -> Self
    where
        Req: HandlerRequest<Res>,
        Res: Send + 'static,
    {
        HandlerInterface {
            service: TypeKey::of::<dyn ValidatedHandler<Req, Res>>(),
            request: Req::shape(),
            result: Req::result_shape(),
            generic: Req::generic_handler().is_some(),
            descriptor: generic_descriptor::<Req, Res>,
        }
    }

    /// Container key the route resolves.
    pub fn service(&self) -> TypeKey {
        self.service
    }

    pub fn request(&self) -> RequestShape {
        self.request
    }

    pub fn result(&self) -> ResultShape {
        self.result
    }

    /// Whether a generic implementation exists for this request shape.
    pub fn has_generic_handler(&self) -> bool {
        self.generic
    }

    /// Transient registration of the generic handler bound to `binding`.
    pub fn descriptor(&self, binding: HandlerBinding) -> Option<ServiceDescriptor> {
        (self.descriptor)(binding)
    }
}

fn generic_descriptor<Req, Res>(binding: HandlerBinding) -> Option<ServiceDescriptor>
where
    Req: HandlerRequest<Res>,
    Res: Send + 'static,
{
    let factory = Req::generic_handler()?;
    Some(ServiceDescriptor::transient::<dyn ValidatedHandler<Req, Res>, _>(
        move |provider| factory(&binding, provider),
    ))
}

impl PartialEq for HandlerInterface {
    fn eq(&self, other: &Self) -> bool {
        self.service == other.service
    }
}

impl Eq for HandlerInterface {}

impl Hash for HandlerInterface {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.service.hash(state);
    }
}

impl fmt::Debug for HandlerInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerInterface")
            .field("service", &self.service)
            .field("request", &self.request)
            .field("result", &self.result)
            .finish()
    }
}

impl fmt::Display for HandlerInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.service, f)
    }
}

/// A handler interface together with the endpoint that requires it.
#[derive(Clone, Debug)]
pub struct EndpointHandler {
    pub endpoint: Endpoint,
    pub handler: HandlerInterface,
}

impl EndpointHandler {
    pub fn new(endpoint: Endpoint, handler: HandlerInterface) -> Self {
        EndpointHandler { endpoint, handler }
    }
}

/// Entity and domain type a handler interface resolved to.
#[derive(Clone, Debug, Default)]
pub struct HandlerResolvedContext {
    pub entity_definition: Option<EntityDefinition>,
    pub domain_type: Option<TypeKey>,
}

impl HandlerResolvedContext {
    /// Resolution order: `resolution` is itself an entity; else the endpoint's entity
    /// metadata; else the type resolver. In the last two cases `resolution` is the domain type.
    pub fn create(
        resolution: TypeKey,
        endpoint: Option<&Endpoint>,
        definitions: &dyn EntityDefinitionResolver,
        resolver: &dyn EntityTypeResolver,
    ) -> Self {
        if let Some(definition) = definitions.get(resolution) {
            return HandlerResolvedContext {
                entity_definition: Some(definition),
                domain_type: None,
            };
        }

        let from_endpoint = endpoint
            .and_then(|e| resolver.entity_type_for_endpoint(e))
            .and_then(|entity| definitions.get(entity));
        let definition = from_endpoint.or_else(|| {
            resolver
                .entity_type(resolution)
                .and_then(|entity| definitions.get(entity))
        });

        match definition {
            Some(definition) => HandlerResolvedContext {
                entity_definition: Some(definition),
                domain_type: Some(resolution),
            },
            None => HandlerResolvedContext::default(),
        }
    }

    pub fn binding(&self) -> Option<HandlerBinding> {
        self.entity_definition
            .clone()
            .map(|entity| HandlerBinding::new(entity, self.domain_type))
    }
}

/// Runs the application's endpoint builders in describe mode.
pub struct EndpointHandlerDependencies {
    builders: Vec<Arc<dyn EndpointBuilder>>,
    options: EndpointOptions,
}

impl EndpointHandlerDependencies {
    pub fn new(builders: Vec<Arc<dyn EndpointBuilder>>, options: EndpointOptions) -> Self {
        EndpointHandlerDependencies { builders, options }
    }

    /// Builders and options registered in the collection.
    pub fn from_services(services: &ServiceCollection) -> Self {
        let options = services
            .instance::<EndpointOptions>()
            .map(|o| (*o).clone())
            .unwrap_or_default();
        Self::new(services.instances::<dyn EndpointBuilder>(), options)
    }

    /// Every (endpoint, handler interface) pair, in mapping order.
    pub fn get_endpoint_handlers(&self) -> Vec<EndpointHandler> {
        let mut routes = EndpointRouteBuilder::describe(self.options.clone());
        for builder in &self.builders {
            builder.build(&mut routes);
        }
        routes.take_endpoint_handlers()
    }

    /// Distinct handler interfaces, in first-seen order.
    pub fn get_handler_interfaces(&self) -> Vec<HandlerInterface> {
        let mut seen = HashSet::new();
        self.get_endpoint_handlers()
            .into_iter()
            .map(|eh| eh.handler)
            .filter(|h| seen.insert(h.service))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{ByKey, Delete, NoFilter, Queryable};
    use crate::resolver::{DomainTypeRegistry, EntityMetadataTypeResolver};
    use crate::types::{Entity, EntityRegistry};
    use serde::{Deserialize, Serialize};

    struct Widget;
    struct WidgetView;
    struct Gadget;

    impl Entity for Widget {
        type Key = i32;

        fn key(&self) -> i32 {
            0
        }
    }

    fn definitions() -> EntityRegistry {
        let mut registry = EntityRegistry::new();
        registry.register::<Widget>().unwrap();
        registry
    }

    fn endpoint(entity: Option<TypeKey>) -> Endpoint {
        Endpoint {
            method: Method::GET,
            path: "/api/widget/:id".into(),
            tags: vec!["Widget".into()],
            entity,
            produces: None,
        }
    }

    #[test]
    fn entity_resolves_directly_without_domain() {
        let ctx = HandlerResolvedContext::create(
            TypeKey::of::<Widget>(),
            None,
            &definitions(),
            &EntityMetadataTypeResolver::default(),
        );
        assert_eq!(ctx.entity_definition.unwrap().entity_type, TypeKey::of::<Widget>());
        assert!(ctx.domain_type.is_none());
    }

    #[test]
    fn endpoint_metadata_makes_resolution_a_domain() {
        let ep = endpoint(Some(TypeKey::of::<Widget>()));
        let ctx = HandlerResolvedContext::create(
            TypeKey::of::<WidgetView>(),
            Some(&ep),
            &definitions(),
            &EntityMetadataTypeResolver::default(),
        );
        assert_eq!(ctx.entity_definition.unwrap().entity_type, TypeKey::of::<Widget>());
        assert_eq!(ctx.domain_type, Some(TypeKey::of::<WidgetView>()));
    }

    #[test]
    fn domain_registry_is_the_last_resort() {
        let mut domains = DomainTypeRegistry::new();
        domains.map::<WidgetView, Widget>().unwrap();
        let ctx = HandlerResolvedContext::create(
            TypeKey::of::<WidgetView>(),
            Some(&endpoint(None)),
            &definitions(),
            &EntityMetadataTypeResolver::new(domains),
        );
        assert_eq!(ctx.domain_type, Some(TypeKey::of::<WidgetView>()));
        assert!(ctx.binding().is_some());
    }

    #[test]
    fn unknown_type_resolves_to_nothing() {
        let ctx = HandlerResolvedContext::create(
            TypeKey::of::<Gadget>(),
            Some(&endpoint(Some(TypeKey::of::<Gadget>()))),
            &definitions(),
            &EntityMetadataTypeResolver::default(),
        );
        assert!(ctx.entity_definition.is_none());
        assert!(ctx.domain_type.is_none());
    }

    #[test]
    fn interfaces_compare_by_service_key() {
        let a = HandlerInterface::of::<ByKey<i32>, WidgetView>();
        let b = HandlerInterface::of::<ByKey<i32>, WidgetView>();
        let c = HandlerInterface::of::<NoFilter, Queryable<WidgetView>>();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.service().name().contains("ValidatedHandler"));
        assert!(c.has_generic_handler());
    }

    #[derive(Serialize, Deserialize)]
    struct Part {
        id: i32,
    }

    struct PartEndpoints;

    impl EndpointBuilder for PartEndpoints {
        fn build(&self, routes: &mut EndpointRouteBuilder) {
            routes
                .map_entity_route_group::<Part, i32>()
                .map_get_as_by_key()
                .map_get_as_no_filter_queryable();
            routes
                .map_entity_route_group_named::<Part, i32>("Spares")
                .map_get_as_by_key()
                .map_delete_as_by_key();
        }
    }

    #[test]
    fn shared_interfaces_are_listed_once_in_first_seen_order() {
        let dependencies = EndpointHandlerDependencies::new(
            vec![Arc::new(PartEndpoints) as Arc<dyn EndpointBuilder>],
            EndpointOptions::default(),
        );
        assert_eq!(dependencies.get_endpoint_handlers().len(), 4);

        assert_eq!(
            dependencies.get_handler_interfaces(),
            vec![
                HandlerInterface::of::<ByKey<i32>, Part>(),
                HandlerInterface::of::<NoFilter, Queryable<Part>>(),
                HandlerInterface::of::<Delete<i32, Part>, ()>(),
            ]
        );
    }
}
