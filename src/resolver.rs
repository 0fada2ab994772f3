//! Resolving a domain (projection) type to the entity it is stored as.

use crate::dependencies::Endpoint;
use crate::error::ConfigError;
use crate::types::{Entity, TypeKey};
use std::collections::HashMap;

/// Declares that a domain type is a projection of one entity.
///
/// The associated type makes "exactly one entity per domain type" a compile-time fact.
pub trait DomainToEntity: 'static {
    type Entity: Entity;
}

/// Startup registry of domain -> entity associations.
#[derive(Clone, Debug, Default)]
pub struct DomainTypeRegistry {
    by_domain: HashMap<TypeKey, TypeKey>,
}

impl DomainTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate domain type `D` with entity `E`. A domain type maps to at most one entity.
    pub fn map<D: 'static, E: Entity>(&mut self) -> Result<&mut Self, ConfigError> {
        let domain = TypeKey::of::<D>();
        if let Some(existing) = self.by_domain.get(&domain) {
            return Err(ConfigError::DuplicateDomainMapping {
                domain: domain.name(),
                entity: existing.name(),
            });
        }
        self.by_domain.insert(domain, TypeKey::of::<E>());
        Ok(self)
    }

    pub fn register<D: DomainToEntity>(&mut self) -> Result<&mut Self, ConfigError> {
        self.map::<D, D::Entity>()
    }

    pub fn entity_for(&self, domain: TypeKey) -> Option<TypeKey> {
        self.by_domain.get(&domain).copied()
    }

    pub fn len(&self) -> usize {
        self.by_domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_domain.is_empty()
    }
}

/// Finds the entity type behind a candidate type or an endpoint.
pub trait EntityTypeResolver: Send + Sync {
    fn entity_type(&self, candidate: TypeKey) -> Option<TypeKey>;

    /// Entity attached to an endpoint by its route group, if the strategy supports it.
    fn entity_type_for_endpoint(&self, _endpoint: &Endpoint) -> Option<TypeKey> {
        None
    }
}

/// Answers from domain registrations only.
#[derive(Clone, Debug, Default)]
pub struct DomainToEntityTypeResolver {
    domains: DomainTypeRegistry,
}

impl DomainToEntityTypeResolver {
    pub fn new(domains: DomainTypeRegistry) -> Self {
        DomainToEntityTypeResolver { domains }
    }
}

impl EntityTypeResolver for DomainToEntityTypeResolver {
    fn entity_type(&self, candidate: TypeKey) -> Option<TypeKey> {
        self.domains.entity_for(candidate)
    }
}

/// Default strategy: domain registrations plus the entity metadata entity route groups attach
/// to their endpoints.
#[derive(Clone, Debug, Default)]
pub struct EntityMetadataTypeResolver {
    domains: DomainTypeRegistry,
}

impl EntityMetadataTypeResolver {
    pub fn new(domains: DomainTypeRegistry) -> Self {
        EntityMetadataTypeResolver { domains }
    }
}

impl EntityTypeResolver for EntityMetadataTypeResolver {
    fn entity_type(&self, candidate: TypeKey) -> Option<TypeKey> {
        self.domains.entity_for(candidate)
    }

    fn entity_type_for_endpoint(&self, endpoint: &Endpoint) -> Option<TypeKey> {
        endpoint.entity
    }
}
