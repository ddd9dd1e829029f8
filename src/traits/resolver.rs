//! Resolver traits for post-bootstrap service lookup.

use std::any::type_name;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{key_of_trait, key_of_type, Key};
use crate::registration::AnyArc;

/// Core resolver trait for object-safe service lookup.
///
/// Works on erased values. Most users should use the [`Resolver`] trait
/// instead, which adds typed generic methods on top.
pub trait ResolverCore: Send + Sync {
    /// Resolves the first registered service compatible with `key` and the
    /// optional qualifier.
    ///
    /// Prototype-scoped services produce a fresh instance on every call.
    /// The value has the storage shape of `key`: `Arc<T>` for concrete types,
    /// `Arc<Arc<dyn Trait>>` for traits.
    fn resolve_any(&self, key: &Key, qualifier: Option<&str>) -> DiResult<AnyArc>;

    /// Resolves every registered service compatible with `key`, in
    /// registration order. An empty vector is not an error.
    fn resolve_many(&self, key: &Key, qualifier: Option<&str>) -> DiResult<Vec<AnyArc>>;
}

fn cast_type<T: Send + Sync + 'static>(any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(type_name::<T>()))
}

// Trait values are stored as Arc<Arc<dyn Trait>>.
fn cast_trait<T: ?Sized + Send + Sync + 'static>(any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast::<Arc<T>>()
        .map(|boxed| (*boxed).clone())
        .map_err(|_| DiError::TypeMismatch(type_name::<T>()))
}

/// High-level resolver interface with generic methods for type-safe lookup.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{Resolver, ServiceCollection, ServiceDescriptor};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str) -> String;
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) -> String { format!("LOG: {}", msg) }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_instance(42usize);
/// services.add(
///     ServiceDescriptor::service::<ConsoleLogger>()
///         .provides::<dyn Logger>(|l| l)
///         .constructor(|_| Ok(ConsoleLogger)),
/// );
///
/// let provider = services.build().unwrap();
/// assert_eq!(*provider.get_required::<usize>(), 42);
/// assert_eq!(provider.get_required_trait::<dyn Logger>().log("up"), "LOG: up");
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete service type.
    fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        cast_type(self.resolve_any(&key_of_type::<T>(), None)?)
    }

    /// Resolves a trait object.
    fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        cast_trait(self.resolve_any(&key_of_trait::<T>(), None)?)
    }

    /// Resolves a concrete service registered under a qualifier.
    fn get_named<T: Send + Sync + 'static>(&self, qualifier: &str) -> DiResult<Arc<T>> {
        cast_type(self.resolve_any(&key_of_type::<T>(), Some(qualifier))?)
    }

    /// Resolves a trait object registered under a qualifier.
    fn get_named_trait<T: ?Sized + Send + Sync + 'static>(&self, qualifier: &str) -> DiResult<Arc<T>> {
        cast_trait(self.resolve_any(&key_of_trait::<T>(), Some(qualifier))?)
    }

    /// Every registered service of type `T`.
    fn get_all<T: Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve_many(&key_of_type::<T>(), None)?
            .into_iter()
            .map(cast_type::<T>)
            .collect()
    }

    /// Every registered implementation of a trait.
    fn get_all_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        self.resolve_many(&key_of_trait::<T>(), None)?
            .into_iter()
            .map(cast_trait::<T>)
            .collect()
    }

    /// Resolves a concrete service, panicking if it cannot be resolved.
    ///
    /// # Panics
    ///
    /// Panics when the service is not registered or its construction fails.
    fn get_required<T: Send + Sync + 'static>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {}", type_name::<T>(), e))
    }

    /// Resolves a trait object, panicking if it cannot be resolved.
    ///
    /// # Panics
    ///
    /// Panics when no implementation is registered.
    fn get_required_trait<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.get_trait::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve trait {}: {}", type_name::<T>(), e))
    }

    /// Resolves a qualified concrete service, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics when no service carries the qualifier.
    fn get_named_required<T: Send + Sync + 'static>(&self, qualifier: &str) -> Arc<T> {
        self.get_named::<T>(qualifier).unwrap_or_else(|e| {
            panic!("Failed to resolve named {} ({}): {}", type_name::<T>(), qualifier, e)
        })
    }
}
