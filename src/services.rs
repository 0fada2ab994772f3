//! Minimal dependency-injection container.
//!
//! Two halves:
//! - [`ServiceCollection`]: mutable during startup. Registrations are keyed by the service type
//!   (usually a trait object such as `dyn ValidatedHandler<ByKey<i32>, Widget>`); several entries
//!   may share a key so that "all implementations of X" can be enumerated.
//! - [`ServiceProvider`]: immutable result of [`ServiceCollection::build`], shared through `Arc`
//!   with request handlers.
//!
//! Values are stored as `Arc<T>` inside `Box<dyn Any + Send + Sync>` and downcast on read.
//! Transient registrations hold a factory that runs on every resolution.

use crate::error::ServiceError;
use crate::types::TypeKey;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Boxed = Box<dyn Any + Send + Sync>;

/// Type-erased factory. Must return a boxed `Arc<T>` for the descriptor's service type.
type ServiceFactory = Arc<dyn Fn(&ServiceProvider) -> Result<Boxed, ServiceError> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceLifetime {
    Singleton,
    Transient,
}

enum ServiceSource {
    Instance(Boxed),
    Factory(ServiceFactory),
}

pub struct ServiceDescriptor {
    key: TypeKey,
    lifetime: ServiceLifetime,
    source: ServiceSource,
}

impl ServiceDescriptor {
    pub fn singleton<T>(instance: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        ServiceDescriptor {
            key: TypeKey::of::<T>(),
            lifetime: ServiceLifetime::Singleton,
            source: ServiceSource::Instance(Box::new(instance)),
        }
    }

    pub fn transient<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<Arc<T>, ServiceError> + Send + Sync + 'static,
    {
        ServiceDescriptor {
            key: TypeKey::of::<T>(),
            lifetime: ServiceLifetime::Transient,
            source: ServiceSource::Factory(Arc::new(move |provider: &ServiceProvider| {
                factory(provider).map(|svc| Box::new(svc) as Boxed)
            })),
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("key", &self.key)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Registrations collected during startup.
#[derive(Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a registration, even when the key is already present.
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        tracing::debug!(service = %descriptor.key, lifetime = ?descriptor.lifetime, "service added");
        self.descriptors.push(descriptor);
        self
    }

    /// Add the registration only if nothing is registered under its key yet.
    /// Returns whether it was added.
    pub fn try_add(&mut self, descriptor: ServiceDescriptor) -> bool {
        if self.contains(descriptor.key) {
            return false;
        }
        self.add(descriptor);
        true
    }

    pub fn add_singleton<T>(&mut self, instance: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::singleton(instance))
    }

    pub fn try_add_singleton<T>(&mut self, instance: Arc<T>) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.try_add(ServiceDescriptor::singleton(instance))
    }

    pub fn add_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<Arc<T>, ServiceError> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::transient(factory))
    }

    pub fn try_add_transient<T, F>(&mut self, factory: F) -> bool
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<Arc<T>, ServiceError> + Send + Sync + 'static,
    {
        self.try_add(ServiceDescriptor::transient(factory))
    }

    pub fn contains(&self, key: TypeKey) -> bool {
        self.descriptors.iter().any(|d| d.key == key)
    }

    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.contains(TypeKey::of::<T>())
    }

    /// Number of registrations under `key`.
    pub fn count(&self, key: TypeKey) -> usize {
        self.descriptors.iter().filter(|d| d.key == key).count()
    }

    /// All singleton instances registered under `T`, in registration order.
    /// Transient registrations are skipped: they can only be produced by a built provider.
    pub fn instances<T>(&self) -> Vec<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        self.descriptors
            .iter()
            .filter(|d| d.key == key)
            .filter_map(|d| match &d.source {
                ServiceSource::Instance(boxed) => boxed.downcast_ref::<Arc<T>>().cloned(),
                ServiceSource::Factory(_) => None,
            })
            .collect()
    }

    /// Last singleton instance registered under `T`.
    pub fn instance<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.instances::<T>().pop()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn build(self) -> ServiceProvider {
        let mut by_key: HashMap<TypeKey, Vec<ServiceSource>> = HashMap::new();
        for d in self.descriptors {
            by_key.entry(d.key).or_default().push(d.source);
        }
        ServiceProvider { by_key }
    }
}

/// Finished, read-only container.
pub struct ServiceProvider {
    by_key: HashMap<TypeKey, Vec<ServiceSource>>,
}

impl ServiceProvider {
    /// Resolve `T`; the last registration under its key wins.
    pub fn get<T>(&self) -> Result<Arc<T>, ServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        let source = self
            .by_key
            .get(&key)
            .and_then(|sources| sources.last())
            .ok_or(ServiceError::NotFound(key.name()))?;
        self.materialize::<T>(key, source)
    }

    /// Resolve every registration under `T`, in registration order.
    pub fn get_all<T>(&self) -> Result<Vec<Arc<T>>, ServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        match self.by_key.get(&key) {
            Some(sources) => sources.iter().map(|s| self.materialize::<T>(key, s)).collect(),
            None => Ok(Vec::new()),
        }
    }

    pub fn is_service(&self, key: TypeKey) -> bool {
        self.by_key.contains_key(&key)
    }

    fn materialize<T>(&self, key: TypeKey, source: &ServiceSource) -> Result<Arc<T>, ServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match source {
            ServiceSource::Instance(boxed) => boxed
                .downcast_ref::<Arc<T>>()
                .cloned()
                .ok_or(ServiceError::TypeMismatch(key.name())),
            ServiceSource::Factory(factory) => {
                let boxed = factory(self)?;
                boxed
                    .downcast::<Arc<T>>()
                    .map(|b| *b)
                    .map_err(|_| ServiceError::TypeMismatch(key.name()))
            }
        }
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("services", &self.by_key.len())
            .finish()
    }
}
