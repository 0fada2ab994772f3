//! Slicer SDK: convention-driven endpoint wiring over axum.
//!
//! Route groups declare the `dyn ValidatedHandler<Req, Res>` each endpoint needs. At startup
//! [`add_endpoint_default_validated_handlers`] discovers those dependencies and registers
//! generic store-backed handlers for the conventional shapes (by key, insert, update, delete,
//! list). [`map_endpoint_builders`] then binds the same routes into a router.

pub mod case;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod file;
pub mod handlers;
pub mod mapping;
pub mod operations;
pub mod registrars;
pub mod resolver;
pub mod result;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod validated;
pub mod wiring;

pub use inventory;

pub use config::EndpointOptions;
pub use dependencies::{Endpoint, EndpointHandler, EndpointHandlerDependencies, HandlerInterface};
pub use error::{AppError, ConfigError, ServiceError, StoreError};
pub use file::FileResponse;
pub use mapping::{MergeInto, TypeMappers};
pub use operations::{ByKey, Delete, HandlerRequest, Insert, NoFilter, Queryable, Update};
pub use registrars::{EndpointValidatedHandlerRegistrar, EntityDomainHandlerRegistrar};
pub use resolver::{DomainToEntity, DomainTypeRegistry, EntityTypeResolver};
pub use result::validated_result_filter;
pub use routes::{map_endpoint_builders, EndpointBuilder, EndpointRouteBuilder, RouteGroup};
pub use services::{ServiceCollection, ServiceProvider};
pub use state::AppState;
pub use store::{EntityStore, MemoryStore};
pub use telemetry::init_tracing;
pub use types::{Entity, EntityDefinition, EntityDefinitionResolver, EntityRegistry, TypeKey};
pub use validated::{HandlerResult, ValidatedHandler, ValidatedResult};
pub use wiring::{
    add_domain_types, add_endpoint_builder, add_endpoint_builders, add_endpoint_default_validated_handlers,
    add_endpoint_validated_handler_registrar, add_entities, WiringReport,
};
