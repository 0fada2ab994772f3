//! Startup wiring: discover the handlers routes depend on and register generic ones.
//!
//! Typical order:
//! 1. register entities (`add_entities`), domain mappings, stores, `TypeMappers` and builders
//!    (`add_endpoint_builder`, or `add_endpoint_builders` for submitted ones);
//! 2. register custom handlers;
//! 3. call [`add_endpoint_default_validated_handlers`];
//! 4. build the provider and call [`crate::routes::map_endpoint_builders`].

use crate::config::EndpointOptions;
use crate::dependencies::{EndpointHandlerDependencies, HandlerInterface};
use crate::error::ConfigError;
use crate::mapping::TypeMappers;
use crate::registrars::{
    default_registrars, EndpointValidatedHandlerRegistrar, EntityDomainHandlerRegistrar,
    MappingCheckDomainHandlerRegistrar, ValidatedHandlerRegistrarContext,
};
use crate::resolver::{DomainTypeRegistry, EntityMetadataTypeResolver, EntityTypeResolver};
use crate::routes::{EndpointBuilder, EndpointBuilderRegistration};
use crate::services::ServiceCollection;
use crate::types::{EntityDefinitionResolver, EntityRegistry};
use std::any::type_name;
use std::sync::Arc;

/// Outcome of one wiring pass.
#[derive(Clone, Debug, Default)]
pub struct WiringReport {
    /// Interfaces a registrar claimed in this pass.
    pub registered: Vec<HandlerInterface>,
    /// Interfaces that were already registered before the pass.
    pub existing: Vec<HandlerInterface>,
    /// Interfaces no registrar could satisfy; requests to them fail at runtime.
    pub unhandled: Vec<HandlerInterface>,
}

pub fn add_entities(services: &mut ServiceCollection, entities: EntityRegistry) -> &mut ServiceCollection {
    services.add_singleton::<dyn EntityDefinitionResolver>(Arc::new(entities))
}

pub fn add_domain_types(services: &mut ServiceCollection, domains: DomainTypeRegistry) -> &mut ServiceCollection {
    services.add_singleton(Arc::new(domains))
}

pub fn add_endpoint_builder<B>(services: &mut ServiceCollection, builder: B) -> &mut ServiceCollection
where
    B: EndpointBuilder + 'static,
{
    services.add_singleton::<dyn EndpointBuilder>(Arc::new(builder))
}

/// Marks a collection whose submitted builders were added.
struct SubmittedEndpointBuilders;

/// Register every builder submitted with [`submit_endpoint_builder!`](crate::submit_endpoint_builder)
/// anywhere in the binary. Returns how many were added; a second call adds none.
pub fn add_endpoint_builders(services: &mut ServiceCollection) -> usize {
    if !services.try_add_singleton(Arc::new(SubmittedEndpointBuilders)) {
        return 0;
    }
    let mut added = 0;
    for registration in inventory::iter::<EndpointBuilderRegistration> {
        tracing::debug!(builder = registration.name, "submitted endpoint builder added");
        services.add_singleton::<dyn EndpointBuilder>((registration.create)());
        added += 1;
    }
    tracing::info!(builders = added, "submitted endpoint builders added");
    added
}

/// Custom registrars run after the built-in ones, in registration order.
pub fn add_endpoint_validated_handler_registrar<R>(services: &mut ServiceCollection, registrar: R) -> &mut ServiceCollection
where
    R: EndpointValidatedHandlerRegistrar + 'static,
{
    services.add_singleton::<dyn EndpointValidatedHandlerRegistrar>(Arc::new(registrar))
}

/// Register generic handlers for every handler interface the endpoint builders depend on
/// that is not registered yet.
///
/// Requires a `dyn EntityDefinitionResolver`. Uses the registered `dyn EntityTypeResolver`
/// if any, else [`EntityMetadataTypeResolver`] over the registered [`DomainTypeRegistry`].
/// Running it again registers nothing new.
pub fn add_endpoint_default_validated_handlers(services: &mut ServiceCollection) -> Result<WiringReport, ConfigError> {
    services.try_add_singleton(Arc::new(TypeMappers::new()));
    services.try_add_singleton(Arc::new(EndpointOptions::default()));

    let definitions = services
        .instance::<dyn EntityDefinitionResolver>()
        .ok_or(ConfigError::MissingService(type_name::<dyn EntityDefinitionResolver>()))?;
    let type_resolver = services.instance::<dyn EntityTypeResolver>().unwrap_or_else(|| {
        let domains = services
            .instance::<DomainTypeRegistry>()
            .map(|d| (*d).clone())
            .unwrap_or_default();
        Arc::new(EntityMetadataTypeResolver::new(domains)) as Arc<dyn EntityTypeResolver>
    });
    let domain_hook = services
        .instance::<dyn EntityDomainHandlerRegistrar>()
        .unwrap_or_else(|| Arc::new(MappingCheckDomainHandlerRegistrar) as Arc<dyn EntityDomainHandlerRegistrar>);
    let mut registrars = default_registrars();
    registrars.extend(services.instances::<dyn EndpointValidatedHandlerRegistrar>());

    let endpoint_handlers = EndpointHandlerDependencies::from_services(services).get_endpoint_handlers();

    let mut report = WiringReport::default();
    let mut context = ValidatedHandlerRegistrarContext {
        services,
        type_resolver: &*type_resolver,
        entity_definition_resolver: &*definitions,
        domain_handler_registrar: &*domain_hook,
    };
    for endpoint_handler in &endpoint_handlers {
        let handler = endpoint_handler.handler;
        if report.registered.contains(&handler) || report.existing.contains(&handler) {
            continue;
        }
        if context.services.contains(handler.service()) {
            report.existing.push(handler);
            continue;
        }
        if registrars.iter().any(|r| r.handle(endpoint_handler, &mut context)) {
            report.registered.push(handler);
            report.unhandled.retain(|h| *h != handler);
        } else if !report.unhandled.contains(&handler) {
            report.unhandled.push(handler);
        }
    }

    if !report.unhandled.is_empty() {
        let names: Vec<String> = report.unhandled.iter().map(ToString::to_string).collect();
        tracing::warn!(handlers = %names.join(", "), "handler types could not be created by default");
    }
    tracing::info!(
        endpoints = endpoint_handlers.len(),
        registered = report.registered.len(),
        existing = report.existing.len(),
        unhandled = report.unhandled.len(),
        "default validated handlers wired"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependencies::EndpointHandler;
    use crate::operations::{ByKey, NoFilter, Queryable};
    use crate::routes::EndpointRouteBuilder;
    use crate::types::Entity;
    use crate::validated::ValidatedHandler;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize)]
    struct Widget {
        id: i32,
    }

    impl Entity for Widget {
        type Key = i32;

        fn key(&self) -> i32 {
            self.id
        }
    }

    #[derive(Deserialize)]
    struct Search {
        #[allow(dead_code)]
        text: String,
    }

    impl crate::operations::HandlerRequest<Queryable<Widget>> for Search {}

    struct WidgetEndpoints;

    impl EndpointBuilder for WidgetEndpoints {
        fn build(&self, routes: &mut EndpointRouteBuilder) {
            routes
                .map_entity_route_group::<Widget, i32>()
                .map_get_as_no_filter_queryable()
                .map_get_as_by_key()
                .map_delete_as_by_key();
            routes
                .map_route_group("widget-search", None, None)
                .map_get::<Search, Queryable<Widget>>("");
        }
    }

    fn services() -> ServiceCollection {
        let mut services = ServiceCollection::new();
        let mut entities = EntityRegistry::new();
        entities.register::<Widget>().unwrap();
        add_entities(&mut services, entities);
        add_endpoint_builder(&mut services, WidgetEndpoints);
        services
    }

    #[test]
    fn requires_entity_definitions() {
        let mut services = ServiceCollection::new();
        assert!(matches!(
            add_endpoint_default_validated_handlers(&mut services),
            Err(ConfigError::MissingService(_))
        ));
    }

    #[test]
    fn registers_generic_handlers_and_reports_custom_ones() {
        let mut services = services();
        let report = add_endpoint_default_validated_handlers(&mut services).unwrap();

        assert_eq!(report.registered.len(), 3);
        assert!(services.is_registered::<dyn ValidatedHandler<ByKey<i32>, Widget>>());
        assert!(services.is_registered::<dyn ValidatedHandler<NoFilter, Queryable<Widget>>>());
        assert_eq!(report.unhandled, vec![HandlerInterface::of::<Search, Queryable<Widget>>()]);
        assert!(services.is_registered::<TypeMappers>());
        assert!(services.is_registered::<EndpointOptions>());
    }

    #[test]
    fn second_pass_registers_nothing() {
        let mut services = services();
        add_endpoint_default_validated_handlers(&mut services).unwrap();
        let before = services.len();

        let report = add_endpoint_default_validated_handlers(&mut services).unwrap();
        assert!(report.registered.is_empty());
        assert_eq!(report.existing.len(), 3);
        assert_eq!(services.len(), before);
    }

    struct ClaimEverything;

    impl EndpointValidatedHandlerRegistrar for ClaimEverything {
        fn handle(&self, _: &EndpointHandler, _: &mut ValidatedHandlerRegistrarContext<'_>) -> bool {
            true
        }
    }

    #[test]
    fn custom_registrars_run_after_defaults() {
        let mut services = services();
        add_endpoint_validated_handler_registrar(&mut services, ClaimEverything);
        let report = add_endpoint_default_validated_handlers(&mut services).unwrap();

        assert!(report.unhandled.is_empty());
        assert_eq!(report.registered.len(), 4);
        assert!(services.is_registered::<dyn ValidatedHandler<ByKey<i32>, Widget>>());
        assert!(!services.is_registered::<dyn ValidatedHandler<Search, Queryable<Widget>>>());
    }

    #[derive(Clone, Default)]
    struct Recording {
        seen: Arc<parking_lot::Mutex<Vec<HandlerInterface>>>,
    }

    impl EndpointValidatedHandlerRegistrar for Recording {
        fn handle(&self, endpoint_handler: &EndpointHandler, _: &mut ValidatedHandlerRegistrarContext<'_>) -> bool {
            self.seen.lock().push(endpoint_handler.handler);
            false
        }
    }

    #[test]
    fn claimed_interfaces_skip_later_registrars() {
        let mut services = services();
        let recording = Recording::default();
        add_endpoint_validated_handler_registrar(&mut services, recording.clone());
        add_endpoint_default_validated_handlers(&mut services).unwrap();

        assert_eq!(
            *recording.seen.lock(),
            vec![HandlerInterface::of::<Search, Queryable<Widget>>()]
        );
    }

    #[derive(Serialize)]
    struct Card;

    struct CardEndpoints;

    impl EndpointBuilder for CardEndpoints {
        fn build(&self, routes: &mut EndpointRouteBuilder) {
            routes
                .map_route_group("cards", None, None)
                .map_get_as_by_key::<i32, Card>("/:id");
        }
    }

    struct CardsAreWidgets;

    impl EntityTypeResolver for CardsAreWidgets {
        fn entity_type(&self, candidate: crate::types::TypeKey) -> Option<crate::types::TypeKey> {
            candidate.is::<Card>().then(crate::types::TypeKey::of::<Widget>)
        }
    }

    fn card_services() -> ServiceCollection {
        let mut services = ServiceCollection::new();
        let mut entities = EntityRegistry::new();
        entities.register::<Widget>().unwrap();
        add_entities(&mut services, entities);
        add_endpoint_builder(&mut services, CardEndpoints);
        services
    }

    #[test]
    fn registered_type_resolver_replaces_the_default() {
        let mut services = card_services();
        let report = add_endpoint_default_validated_handlers(&mut services).unwrap();
        assert_eq!(report.unhandled, vec![HandlerInterface::of::<ByKey<i32>, Card>()]);

        let mut services = card_services();
        services.add_singleton::<dyn EntityTypeResolver>(Arc::new(CardsAreWidgets));
        let report = add_endpoint_default_validated_handlers(&mut services).unwrap();
        assert!(report.unhandled.is_empty());
        assert_eq!(report.registered, vec![HandlerInterface::of::<ByKey<i32>, Card>()]);
        assert!(services.is_registered::<dyn ValidatedHandler<ByKey<i32>, Card>>());
    }
}
