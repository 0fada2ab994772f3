//! Type identity and entity definitions.
//!
//! Rust has no runtime reflection over generic arguments, so every type that takes part in
//! handler matching is carried around as a [`TypeKey`]: its `TypeId` plus the readable name
//! used for routes, tags and log output.

use crate::error::{ConfigError, ServiceError};
use crate::services::ServiceProvider;
use crate::store::{EntityStore, ErasedStore, StoreAdapter};
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of a Rust type. Equality and hashing use the `TypeId` only.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeKey {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified name as reported by `std::any::type_name`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment without generic arguments.
    /// e.g. "my_app::model::Widget" -> "Widget", "my_app::Page<my_app::Widget>" -> "Page"
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.name)
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = match full.find('<') {
        Some(idx) => &full[..idx],
        None => full,
    };
    match base.rfind("::") {
        Some(idx) => &base[idx + 2..],
        None => base,
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A persistence-facing type with a declared key type.
pub trait Entity: Send + Sync + 'static {
    type Key: PartialEq + Send + Sync + 'static;

    fn key(&self) -> Self::Key;
}

type StoreAccessor =
    Arc<dyn Fn(&ServiceProvider) -> Result<Arc<dyn ErasedStore>, ServiceError> + Send + Sync>;

/// Describes a registered entity: its type, its key type and how to reach its store.
#[derive(Clone)]
pub struct EntityDefinition {
    pub entity_type: TypeKey,
    pub key_type: TypeKey,
    pub name: &'static str,
    store: StoreAccessor,
}

impl EntityDefinition {
    pub fn of<E: Entity>() -> Self {
        EntityDefinition {
            entity_type: TypeKey::of::<E>(),
            key_type: TypeKey::of::<E::Key>(),
            name: short_type_name(type_name::<E>()),
            store: Arc::new(|provider: &ServiceProvider| {
                let inner = provider.get::<dyn EntityStore<E>>()?;
                Ok(Arc::new(StoreAdapter::new(inner)) as Arc<dyn ErasedStore>)
            }),
        }
    }

    /// Resolve the entity's store from a finished container.
    pub(crate) fn store(&self, provider: &ServiceProvider) -> Result<Arc<dyn ErasedStore>, ServiceError> {
        (self.store)(provider)
    }
}

impl fmt::Debug for EntityDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDefinition")
            .field("entity_type", &self.entity_type)
            .field("key_type", &self.key_type)
            .field("name", &self.name)
            .finish()
    }
}

/// Looks up entity definitions by type.
pub trait EntityDefinitionResolver: Send + Sync {
    fn get(&self, ty: TypeKey) -> Option<EntityDefinition>;
}

/// In-memory entity definitions, populated at startup.
#[derive(Clone, Default)]
pub struct EntityRegistry {
    by_type: HashMap<TypeKey, EntityDefinition>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E: Entity>(&mut self) -> Result<&mut Self, ConfigError> {
        let definition = EntityDefinition::of::<E>();
        if self.by_type.contains_key(&definition.entity_type) {
            return Err(ConfigError::DuplicateEntity(definition.entity_type.name()));
        }
        self.by_type.insert(definition.entity_type, definition);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

impl EntityDefinitionResolver for EntityRegistry {
    fn get(&self, ty: TypeKey) -> Option<EntityDefinition> {
        self.by_type.get(&ty).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod model {
        pub struct Widget {
            pub id: i32,
        }
    }

    impl Entity for model::Widget {
        type Key = i32;

        fn key(&self) -> i32 {
            self.id
        }
    }

    #[test]
    fn short_name_strips_path_and_generics() {
        assert_eq!(TypeKey::of::<model::Widget>().short_name(), "Widget");
        assert_eq!(TypeKey::of::<Vec<model::Widget>>().short_name(), "Vec");
        assert_eq!(TypeKey::of::<i32>().short_name(), "i32");
    }

    #[test]
    fn type_keys_compare_by_type_id() {
        assert_eq!(TypeKey::of::<i32>(), TypeKey::of::<i32>());
        assert_ne!(TypeKey::of::<i32>(), TypeKey::of::<i64>());
        assert!(TypeKey::of::<model::Widget>().is::<model::Widget>());
    }

    #[test]
    fn registry_resolves_registered_entity() {
        let mut registry = EntityRegistry::new();
        registry.register::<model::Widget>().unwrap();

        let def = registry.get(TypeKey::of::<model::Widget>()).unwrap();
        assert_eq!(def.key_type, TypeKey::of::<i32>());
        assert_eq!(def.name, "Widget");
        assert!(registry.get(TypeKey::of::<String>()).is_none());
    }

    #[test]
    fn registry_rejects_duplicate_entity() {
        let mut registry = EntityRegistry::new();
        registry.register::<model::Widget>().unwrap();
        let err = registry.register::<model::Widget>().err().unwrap();
        assert!(matches!(err, ConfigError::DuplicateEntity(_)));
    }
}
