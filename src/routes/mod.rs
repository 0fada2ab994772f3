//! Route-group builders: conventional entity endpoints over axum routing.

mod builder;
mod entity;
mod group;

pub use builder::{map_endpoint_builders, EndpointBuilder, EndpointBuilderRegistration, EndpointRouteBuilder};
pub use entity::{EntityKeySelectorRouteGroupBuilder, EntityRouteGroupBuilder, KEY_PATTERN};
pub use group::RouteGroup;
