//! Service provider module for dependency injection.
//!
//! This module contains the post-bootstrap facade over the materialized
//! container: typed lookups, introspection, reload and teardown.

use std::sync::Arc;

use crate::descriptors::{ServiceDetails, ServiceId};
use crate::error::{DiError, DiResult};
use crate::instantiation::Engine;
use crate::key::{key_of_type, Key};
use crate::marker::Marker;
use crate::registration::AnyArc;
use crate::traits::{Resolver, ResolverCore};

/// Service provider for resolving dependencies from the DI container.
///
/// Returned by [`ServiceCollection::build`](crate::ServiceCollection::build)
/// once every service has been resolved, constructed and started. Lookups
/// pick the first compatible service in registration order. Prototype
/// services produce a fresh instance per lookup.
///
/// # Thread Safety
///
/// `ServiceProvider` is `Send + Sync` and cheap to clone (it uses `Arc`
/// internally). Reloads of one service are serialized; lookups never block
/// on them.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{Dependency, Resolver, ServiceCollection, ServiceDescriptor};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_instance(Database { url: "postgres://localhost".to_string() });
/// collection.add(
///     ServiceDescriptor::service::<UserService>()
///         .depends_on(Dependency::of::<Database>())
///         .constructor(|args| Ok(UserService { db: args.get::<Database>(0)? })),
/// );
///
/// let provider = collection.build().unwrap();
/// let user_service = provider.get_required::<UserService>();
/// assert_eq!(user_service.db.url, "postgres://localhost");
/// ```
pub struct ServiceProvider {
    inner: Arc<Engine>,
}

impl ServiceProvider {
    pub(crate) fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(engine),
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &Engine {
        &self.inner
    }

    /// A fresh, unregistered instance of `T`, even for singletons.
    ///
    /// ```
    /// use ferrous_ioc::{Resolver, ServiceCollection, ServiceDescriptor};
    /// use std::sync::Arc;
    ///
    /// struct Session;
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add(ServiceDescriptor::service::<Session>().constructor(|_| Ok(Session)));
    /// let provider = services.build().unwrap();
    ///
    /// let shared = provider.get_required::<Session>();
    /// let fresh = provider.new_instance::<Session>().unwrap();
    /// assert!(!Arc::ptr_eq(&shared, &fresh));
    /// ```
    pub fn new_instance<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let key = key_of_type::<T>();
        let id = self.inner().first_registered(&key, None)?;
        self.inner()
            .fresh_instance(id)?
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Details of the service a lookup for `key` would return.
    pub fn service_details(&self, key: &Key, qualifier: Option<&str>) -> Option<ServiceDetails> {
        let id = self.inner().first_registered(key, qualifier).ok()?;
        Some(self.inner().details(id))
    }

    /// Details of a service by id, including unregistered ones.
    pub fn details_of(&self, id: ServiceId) -> DiResult<ServiceDetails> {
        self.inner().descriptor(id).map(ServiceDetails::from)
    }

    /// Every registered service compatible with `key`.
    pub fn implementations(&self, key: &Key) -> Vec<ServiceDetails> {
        self.inner()
            .find_registered(key, None)
            .into_iter()
            .map(|id| self.inner().details(id))
            .collect()
    }

    /// Registered services carrying `marker`.
    ///
    /// The name matches case-insensitively. A marker without argument
    /// matches any argument.
    pub fn services_by_marker(&self, marker: &Marker) -> Vec<ServiceDetails> {
        self.inner()
            .by_marker(marker)
            .into_iter()
            .map(|id| self.inner().details(id))
            .collect()
    }

    /// Every registered service in registration order.
    pub fn all_services(&self) -> Vec<ServiceDetails> {
        self.inner()
            .registered()
            .into_iter()
            .map(|id| self.inner().details(id))
            .collect()
    }

    /// Service ids in construction order, beans right after their parent.
    pub fn construction_order(&self) -> &[ServiceId] {
        self.inner().order()
    }

    /// Destroys and rebuilds the service for `T` against its stored links.
    ///
    /// Consumers keep the instance they were built with, unless they hold a
    /// proxy façade. Beans of the service are rebuilt too.
    ///
    /// ```
    /// use ferrous_ioc::{Resolver, ServiceCollection, ServiceDescriptor};
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// struct Cache(usize);
    ///
    /// let generation = Arc::new(AtomicUsize::new(0));
    /// let g = generation.clone();
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add(
    ///     ServiceDescriptor::service::<Cache>()
    ///         .constructor(move |_| Ok(Cache(g.fetch_add(1, Ordering::SeqCst)))),
    /// );
    /// let provider = services.build().unwrap();
    /// assert_eq!(provider.get_required::<Cache>().0, 0);
    ///
    /// provider.reload::<Cache>().unwrap();
    /// assert_eq!(provider.get_required::<Cache>().0, 1);
    /// ```
    pub fn reload<T: Send + Sync + 'static>(&self) -> DiResult<()> {
        let id = self.inner().first_registered(&key_of_type::<T>(), None)?;
        self.inner().reload(id)
    }

    pub fn reload_id(&self, id: ServiceId) -> DiResult<()> {
        self.inner().reload(id)
    }

    /// Reloads `T`, then every service linked to something reloaded, in
    /// construction order. Returns the reloaded ids.
    pub fn reload_cascade<T: Send + Sync + 'static>(&self) -> DiResult<Vec<ServiceId>> {
        let id = self.inner().first_registered(&key_of_type::<T>(), None)?;
        self.inner().reload_cascade(id)
    }

    /// Replaces the instance of the service for `T`.
    ///
    /// With `destroy_old` the old instance's pre-destroy hook runs first.
    /// Fields are injected into the new instance, its post-construct hook
    /// runs and the service's beans are rebuilt from it.
    pub fn update<T: Send + Sync + 'static>(&self, instance: T, destroy_old: bool) -> DiResult<()> {
        let id = self.inner().first_registered(&key_of_type::<T>(), None)?;
        self.inner().update(id, Arc::new(instance), destroy_old)
    }

    /// Erased form of [`update`](Self::update).
    pub fn update_id(&self, id: ServiceId, instance: AnyArc, destroy_old: bool) -> DiResult<()> {
        self.inner().update(id, instance, destroy_old)
    }

    /// Runs every pre-destroy hook in reverse construction order.
    ///
    /// All hooks run even when some fail; failures are logged and the first
    /// one is returned. Lookups fail with [`DiError::NotFound`] afterwards.
    pub fn destroy_all(&self) -> DiResult<()> {
        self.inner().destroy_all()
    }
}

impl Clone for ServiceProvider {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("services", &self.inner().order().len())
            .field("registered", &self.inner().registered().len())
            .finish()
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve_any(&self, key: &Key, qualifier: Option<&str>) -> DiResult<AnyArc> {
        self.inner().lookup(key, qualifier)
    }

    fn resolve_many(&self, key: &Key, qualifier: Option<&str>) -> DiResult<Vec<AnyArc>> {
        self.inner().lookup_all(key, qualifier)
    }
}

impl Resolver for ServiceProvider {}
