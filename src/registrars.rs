//! Shape registrars: recognise a handler interface and register the generic handler for it.
//!
//! Each registrar looks at the request/result shape of one discovered handler interface,
//! resolves the entity (and domain type, if any) it concerns and adds a transient registration
//! unless the interface is already registered. Registrars return `false` to let the next one try.

use crate::dependencies::{EndpointHandler, HandlerInterface, HandlerResolvedContext};
use crate::mapping::TypeMappers;
use crate::operations::{RequestShape, ResultShape};
use crate::resolver::EntityTypeResolver;
use crate::services::ServiceCollection;
use crate::types::{EntityDefinition, EntityDefinitionResolver, TypeKey};
use std::sync::Arc;

/// What a domain hook learns when a generic handler was bound to a domain type.
pub struct EntityDomainHandlerContext<'a> {
    pub services: &'a mut ServiceCollection,
    pub entity_definition: &'a EntityDefinition,
    pub domain_type: TypeKey,
    pub request: RequestShape,
    pub result: ResultShape,
}

/// Extra registrations needed when a handler works on a domain projection.
pub trait EntityDomainHandlerRegistrar: Send + Sync {
    fn register(&self, context: EntityDomainHandlerContext<'_>);
}

/// A conversion a domain-bound generic handler needs at request time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequiredMapping {
    pub from: TypeKey,
    pub to: TypeKey,
    /// Update payloads may also be merged instead of converted.
    pub merge: bool,
}

/// Default domain hook: warns when the conversions the generic handler will need at request
/// time are not registered in [`TypeMappers`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MappingCheckDomainHandlerRegistrar;

impl MappingCheckDomainHandlerRegistrar {
    /// Conversions `context` needs that `mappers` cannot perform. Everything is missing
    /// without mappers.
    pub fn missing_mappings(
        &self,
        context: &EntityDomainHandlerContext<'_>,
        mappers: Option<&TypeMappers>,
    ) -> Vec<RequiredMapping> {
        let entity = context.entity_definition.entity_type;
        let mut required = vec![RequiredMapping {
            from: entity,
            to: context.domain_type,
            merge: false,
        }];
        if let RequestShape::Update { payload, .. } = context.request {
            required.push(RequiredMapping {
                from: payload,
                to: entity,
                merge: true,
            });
        }
        required.retain(|m| match mappers {
            Some(mappers) if m.merge => !mappers.contains_merge(m.from, m.to),
            Some(mappers) => !mappers.contains(m.from, m.to),
            None => true,
        });
        required
    }
}

impl EntityDomainHandlerRegistrar for MappingCheckDomainHandlerRegistrar {
    fn register(&self, context: EntityDomainHandlerContext<'_>) {
        let mappers = context.services.instance::<TypeMappers>();
        if mappers.is_none() {
            tracing::warn!(
                entity = %context.entity_definition.entity_type,
                domain = %context.domain_type,
                "no type mappers registered"
            );
        }
        for missing in self.missing_mappings(&context, mappers.as_deref()) {
            if missing.merge {
                tracing::warn!(from = %missing.from, to = %missing.to, "missing update mapping");
            } else {
                tracing::warn!(from = %missing.from, to = %missing.to, "missing entity to domain mapping");
            }
        }
    }
}

/// Shared state of one wiring pass.
pub struct ValidatedHandlerRegistrarContext<'a> {
    pub services: &'a mut ServiceCollection,
    pub type_resolver: &'a dyn EntityTypeResolver,
    pub entity_definition_resolver: &'a dyn EntityDefinitionResolver,
    pub domain_handler_registrar: &'a dyn EntityDomainHandlerRegistrar,
}

impl ValidatedHandlerRegistrarContext<'_> {
    pub fn resolve(&self, resolution: TypeKey, endpoint_handler: &EndpointHandler) -> HandlerResolvedContext {
        HandlerResolvedContext::create(
            resolution,
            Some(&endpoint_handler.endpoint),
            self.entity_definition_resolver,
            self.type_resolver,
        )
    }

    /// Add the generic handler for `handler` bound to the resolved entity, if absent.
    /// Returns whether a registration was added.
    pub fn register(&mut self, handler: &HandlerInterface, resolved: &HandlerResolvedContext) -> bool {
        let Some(descriptor) = resolved.binding().and_then(|binding| handler.descriptor(binding)) else {
            return false;
        };
        let added = self.services.try_add(descriptor);
        if added {
            tracing::debug!(
                handler = %handler,
                entity = ?resolved.entity_definition.as_ref().map(|d| d.entity_type),
                domain = ?resolved.domain_type,
                "generic handler registered"
            );
        }
        added
    }

    /// Run the domain hook when a domain type was resolved.
    pub fn register_domain(&mut self, handler: &HandlerInterface, resolved: &HandlerResolvedContext) {
        if let (Some(entity_definition), Some(domain_type)) = (&resolved.entity_definition, resolved.domain_type) {
            let hook = self.domain_handler_registrar;
            hook.register(EntityDomainHandlerContext {
                services: &mut *self.services,
                entity_definition,
                domain_type,
                request: handler.request(),
                result: handler.result(),
            });
        }
    }
}

pub trait EndpointValidatedHandlerRegistrar: Send + Sync {
    /// `true` when this registrar claimed the interface; later registrars are not asked.
    fn handle(&self, endpoint_handler: &EndpointHandler, context: &mut ValidatedHandlerRegistrarContext<'_>) -> bool;
}

/// `ByKey<K> -> D`: `D` resolves to an entity whose key type is `K`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ByKeyEndpointValidatedHandlerRegistrar;

impl EndpointValidatedHandlerRegistrar for ByKeyEndpointValidatedHandlerRegistrar {
    fn handle(&self, endpoint_handler: &EndpointHandler, context: &mut ValidatedHandlerRegistrarContext<'_>) -> bool {
        let handler = &endpoint_handler.handler;
        let (RequestShape::ByKey { key }, ResultShape::Single(result)) = (handler.request(), handler.result()) else {
            return false;
        };
        let resolved = context.resolve(result, endpoint_handler);
        match &resolved.entity_definition {
            Some(entity) if entity.key_type == key => {}
            _ => return false,
        }
        context.register(handler, &resolved);
        context.register_domain(handler, &resolved);
        true
    }
}

/// `Insert<P> -> D`: resolution uses the result type `D`.
#[derive(Clone, Copy, Debug, Default)]
pub struct InsertEndpointValidatedHandlerRegistrar;

impl EndpointValidatedHandlerRegistrar for InsertEndpointValidatedHandlerRegistrar {
    fn handle(&self, endpoint_handler: &EndpointHandler, context: &mut ValidatedHandlerRegistrarContext<'_>) -> bool {
        let handler = &endpoint_handler.handler;
        let (RequestShape::Insert { .. }, ResultShape::Single(result)) = (handler.request(), handler.result()) else {
            return false;
        };
        let resolved = context.resolve(result, endpoint_handler);
        if resolved.entity_definition.is_none() {
            return false;
        }
        context.register(handler, &resolved);
        true
    }
}

/// `Update<K, P> -> D`: like by-key, and always notifies the domain hook for domain types.
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateEndpointValidatedHandlerRegistrar;

impl EndpointValidatedHandlerRegistrar for UpdateEndpointValidatedHandlerRegistrar {
    fn handle(&self, endpoint_handler: &EndpointHandler, context: &mut ValidatedHandlerRegistrarContext<'_>) -> bool {
        let handler = &endpoint_handler.handler;
        let (RequestShape::Update { key, .. }, ResultShape::Single(result)) = (handler.request(), handler.result()) else {
            return false;
        };
        let resolved = context.resolve(result, endpoint_handler);
        match &resolved.entity_definition {
            Some(entity) if entity.key_type == key => {}
            _ => return false,
        }
        context.register(handler, &resolved);
        context.register_domain(handler, &resolved);
        true
    }
}

/// `Delete<K, T> -> ()`: `T` only needs to resolve to an entity.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeleteEndpointValidatedHandlerRegistrar;

impl EndpointValidatedHandlerRegistrar for DeleteEndpointValidatedHandlerRegistrar {
    fn handle(&self, endpoint_handler: &EndpointHandler, context: &mut ValidatedHandlerRegistrarContext<'_>) -> bool {
        let handler = &endpoint_handler.handler;
        let (RequestShape::Delete { target, .. }, ResultShape::Unit) = (handler.request(), handler.result()) else {
            return false;
        };
        let resolved = context.resolve(target, endpoint_handler);
        if resolved.entity_definition.is_none() {
            return false;
        }
        context.register(handler, &resolved);
        true
    }
}

/// `NoFilter -> Queryable<T>`: `T` resolves like any result type.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFilterEndpointValidatedHandlerRegistrar;

impl EndpointValidatedHandlerRegistrar for NoFilterEndpointValidatedHandlerRegistrar {
    fn handle(&self, endpoint_handler: &EndpointHandler, context: &mut ValidatedHandlerRegistrarContext<'_>) -> bool {
        let handler = &endpoint_handler.handler;
        let (RequestShape::NoFilter, ResultShape::Queryable(item)) = (handler.request(), handler.result()) else {
            return false;
        };
        let resolved = context.resolve(item, endpoint_handler);
        if resolved.entity_definition.is_none() {
            return false;
        }
        context.register(handler, &resolved);
        context.register_domain(handler, &resolved);
        true
    }
}

/// The built-in registrars in the order they are tried.
pub fn default_registrars() -> Vec<Arc<dyn EndpointValidatedHandlerRegistrar>> {
    vec![
        Arc::new(ByKeyEndpointValidatedHandlerRegistrar),
        Arc::new(InsertEndpointValidatedHandlerRegistrar),
        Arc::new(UpdateEndpointValidatedHandlerRegistrar),
        Arc::new(DeleteEndpointValidatedHandlerRegistrar),
        Arc::new(NoFilterEndpointValidatedHandlerRegistrar),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependencies::Endpoint;
    use crate::operations::{ByKey, Delete, Insert, NoFilter, Queryable, Update};
    use crate::resolver::{DomainTypeRegistry, EntityMetadataTypeResolver};
    use crate::types::{Entity, EntityRegistry};
    use crate::validated::ValidatedHandler;
    use axum::http::Method;
    use parking_lot::Mutex;

    struct Widget;
    struct WidgetView;

    impl Entity for Widget {
        type Key = i32;

        fn key(&self) -> i32 {
            0
        }
    }

    #[derive(Default)]
    struct RecordingHook {
        seen: Mutex<Vec<TypeKey>>,
    }

    impl EntityDomainHandlerRegistrar for RecordingHook {
        fn register(&self, context: EntityDomainHandlerContext<'_>) {
            self.seen.lock().push(context.domain_type);
        }
    }

    struct Fixture {
        services: ServiceCollection,
        definitions: EntityRegistry,
        resolver: EntityMetadataTypeResolver,
        hook: RecordingHook,
    }

    impl Fixture {
        fn new() -> Self {
            let mut definitions = EntityRegistry::new();
            definitions.register::<Widget>().unwrap();
            let mut domains = DomainTypeRegistry::new();
            domains.map::<WidgetView, Widget>().unwrap();
            Fixture {
                services: ServiceCollection::new(),
                definitions,
                resolver: EntityMetadataTypeResolver::new(domains),
                hook: RecordingHook::default(),
            }
        }

        fn run(&mut self, registrar: &dyn EndpointValidatedHandlerRegistrar, handler: HandlerInterface) -> bool {
            let endpoint_handler = EndpointHandler::new(
                Endpoint {
                    method: Method::GET,
                    path: "/api/widget".into(),
                    tags: Vec::new(),
                    entity: None,
                    produces: None,
                },
                handler,
            );
            let mut context = ValidatedHandlerRegistrarContext {
                services: &mut self.services,
                type_resolver: &self.resolver,
                entity_definition_resolver: &self.definitions,
                domain_handler_registrar: &self.hook,
            };
            registrar.handle(&endpoint_handler, &mut context)
        }
    }

    #[test]
    fn by_key_registers_for_matching_key() {
        let mut fx = Fixture::new();
        assert!(fx.run(&ByKeyEndpointValidatedHandlerRegistrar, HandlerInterface::of::<ByKey<i32>, Widget>()));
        assert!(fx.services.is_registered::<dyn ValidatedHandler<ByKey<i32>, Widget>>());
        assert!(fx.hook.seen.lock().is_empty());
    }

    #[test]
    fn by_key_declines_key_mismatch() {
        let mut fx = Fixture::new();
        assert!(!fx.run(&ByKeyEndpointValidatedHandlerRegistrar, HandlerInterface::of::<ByKey<String>, Widget>()));
        assert!(fx.services.is_empty());
    }

    #[test]
    fn by_key_domain_triggers_hook() {
        let mut fx = Fixture::new();
        assert!(fx.run(&ByKeyEndpointValidatedHandlerRegistrar, HandlerInterface::of::<ByKey<i32>, WidgetView>()));
        assert_eq!(*fx.hook.seen.lock(), vec![TypeKey::of::<WidgetView>()]);
    }

    #[test]
    fn registrars_ignore_other_shapes() {
        let mut fx = Fixture::new();
        let by_key = HandlerInterface::of::<ByKey<i32>, Widget>();
        assert!(!fx.run(&InsertEndpointValidatedHandlerRegistrar, by_key));
        assert!(!fx.run(&UpdateEndpointValidatedHandlerRegistrar, by_key));
        assert!(!fx.run(&DeleteEndpointValidatedHandlerRegistrar, by_key));
        assert!(!fx.run(&NoFilterEndpointValidatedHandlerRegistrar, by_key));
        assert!(fx.services.is_empty());
    }

    #[test]
    fn insert_resolves_result_type() {
        let mut fx = Fixture::new();
        assert!(fx.run(&InsertEndpointValidatedHandlerRegistrar, HandlerInterface::of::<Insert<String>, WidgetView>()));
        assert!(fx.services.is_registered::<dyn ValidatedHandler<Insert<String>, WidgetView>>());
        assert!(fx.hook.seen.lock().is_empty());
        assert!(!fx.run(&InsertEndpointValidatedHandlerRegistrar, HandlerInterface::of::<Insert<String>, String>()));
    }

    #[test]
    fn update_checks_key_and_notifies_domain() {
        let mut fx = Fixture::new();
        assert!(!fx.run(&UpdateEndpointValidatedHandlerRegistrar, HandlerInterface::of::<Update<u64, String>, Widget>()));
        assert!(fx.run(&UpdateEndpointValidatedHandlerRegistrar, HandlerInterface::of::<Update<i32, String>, WidgetView>()));
        assert_eq!(fx.hook.seen.lock().len(), 1);
    }

    #[test]
    fn delete_needs_only_an_entity() {
        let mut fx = Fixture::new();
        assert!(fx.run(&DeleteEndpointValidatedHandlerRegistrar, HandlerInterface::of::<Delete<i32, WidgetView>, ()>()));
        assert!(!fx.run(&DeleteEndpointValidatedHandlerRegistrar, HandlerInterface::of::<Delete<i32, String>, ()>()));
    }

    #[test]
    fn no_filter_resolves_item_type() {
        let mut fx = Fixture::new();
        assert!(fx.run(&NoFilterEndpointValidatedHandlerRegistrar, HandlerInterface::of::<NoFilter, Queryable<Widget>>()));
        assert!(!fx.run(&NoFilterEndpointValidatedHandlerRegistrar, HandlerInterface::of::<NoFilter, Queryable<String>>()));
    }

    #[test]
    fn no_filter_domain_triggers_hook() {
        let mut fx = Fixture::new();
        assert!(fx.run(&NoFilterEndpointValidatedHandlerRegistrar, HandlerInterface::of::<NoFilter, Queryable<WidgetView>>()));
        assert_eq!(*fx.hook.seen.lock(), vec![TypeKey::of::<WidgetView>()]);
    }

    #[test]
    fn delete_on_a_domain_type_skips_hook() {
        let mut fx = Fixture::new();
        assert!(fx.run(&DeleteEndpointValidatedHandlerRegistrar, HandlerInterface::of::<Delete<i32, WidgetView>, ()>()));
        assert!(fx.hook.seen.lock().is_empty());
    }

    struct Rename;

    fn mapping_context<'a>(
        services: &'a mut ServiceCollection,
        definition: &'a EntityDefinition,
        request: RequestShape,
    ) -> EntityDomainHandlerContext<'a> {
        EntityDomainHandlerContext {
            services,
            entity_definition: definition,
            domain_type: TypeKey::of::<WidgetView>(),
            request,
            result: ResultShape::Single(TypeKey::of::<WidgetView>()),
        }
    }

    #[test]
    fn mapping_check_reports_what_is_missing() {
        let definition = EntityDefinition::of::<Widget>();
        let update = RequestShape::Update {
            key: TypeKey::of::<i32>(),
            payload: TypeKey::of::<Rename>(),
        };
        let mut services = ServiceCollection::new();
        let check = MappingCheckDomainHandlerRegistrar;

        let context = mapping_context(&mut services, &definition, update);
        assert_eq!(
            check.missing_mappings(&context, None),
            vec![
                RequiredMapping { from: TypeKey::of::<Widget>(), to: TypeKey::of::<WidgetView>(), merge: false },
                RequiredMapping { from: TypeKey::of::<Rename>(), to: TypeKey::of::<Widget>(), merge: true },
            ]
        );

        let mut mappers = TypeMappers::new();
        mappers.add_with(|_: Widget| WidgetView);
        let missing = check.missing_mappings(&context, Some(&mappers));
        assert_eq!(missing.len(), 1);
        assert!(missing[0].merge);

        mappers.add_with(|_: Rename| Widget);
        assert!(check.missing_mappings(&context, Some(&mappers)).is_empty());

        let by_key = mapping_context(&mut services, &definition, RequestShape::ByKey { key: TypeKey::of::<i32>() });
        assert!(check.missing_mappings(&by_key, Some(&mappers)).is_empty());
    }

    #[test]
    fn mapping_check_reads_registered_mappers() {
        let definition = EntityDefinition::of::<Widget>();
        let mut services = ServiceCollection::new();
        let mut mappers = TypeMappers::new();
        mappers.add_with(|_: Widget| WidgetView);
        services.add_singleton(Arc::new(mappers));
        let before = services.len();

        MappingCheckDomainHandlerRegistrar.register(mapping_context(
            &mut services,
            &definition,
            RequestShape::ByKey { key: TypeKey::of::<i32>() },
        ));
        assert_eq!(services.len(), before);
    }

    #[test]
    fn registration_is_add_if_absent() {
        let mut fx = Fixture::new();
        let handler = HandlerInterface::of::<ByKey<i32>, Widget>();
        assert!(fx.run(&ByKeyEndpointValidatedHandlerRegistrar, handler));
        assert!(fx.run(&ByKeyEndpointValidatedHandlerRegistrar, handler));
        assert_eq!(fx.services.count(handler.service()), 1);
    }
}
