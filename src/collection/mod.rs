//! Service collection module for dependency injection.
//!
//! This module contains the ServiceCollection type: the descriptor arena
//! filled at registration time and turned into a [`ServiceProvider`] by
//! [`ServiceCollection::build`].

use std::sync::Arc;
use std::thread;

use crate::config::InjectorConfig;
use crate::descriptors::{ServiceDescriptor, ServiceId};
use crate::error::{DiError, DiResult};
use crate::instantiation::bootstrap;
use crate::key::{key_of_trait, key_of_type};
use crate::provider::ServiceProvider;
use crate::registration::AnyArc;

const BOOTSTRAP_THREAD: &str = "ferrous-ioc-bootstrap";

/// Ordered set of service descriptors.
///
/// Discovery order is the order of [`add`](Self::add) calls, with each
/// service's beans following it. It decides collection injection order and
/// lookup precedence.
#[derive(Debug, Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }

    /// Adds a descriptor and its beans, returning the descriptor's id.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_ioc::{ServiceCollection, ServiceDescriptor};
    ///
    /// struct Pool;
    /// struct Connection;
    ///
    /// let mut services = ServiceCollection::new();
    /// let pool = services.add(
    ///     ServiceDescriptor::service::<Pool>()
    ///         .constructor(|_| Ok(Pool))
    ///         .bean(|_pool: &Pool| Ok(Connection), |b| b.qualifier("primary")),
    /// );
    ///
    /// let d = services.descriptor(pool).unwrap();
    /// assert_eq!(d.beans().len(), 1);
    /// let bean = services.descriptor(d.beans()[0]).unwrap();
    /// assert_eq!(bean.parent(), Some(pool));
    /// assert_eq!(bean.qualifier(), Some("primary"));
    /// ```
    pub fn add(&mut self, descriptor: impl Into<ServiceDescriptor>) -> ServiceId {
        let mut descriptor = descriptor.into();
        let pending = std::mem::take(&mut descriptor.pending_beans);

        let id = ServiceId(self.descriptors.len());
        descriptor.id = id;
        descriptor.beans.clear();
        self.descriptors.push(descriptor);

        for bean in pending {
            let bean_id = self.add(bean);
            self.descriptors[bean_id.0].parent = Some(id);
            self.descriptors[id.0].beans.push(bean_id);
        }
        id
    }

    /// Registers a pre-built instance.
    ///
    /// The instance is eligible as a producer, is never constructed or
    /// reloaded, and carries the `Provided` marker.
    ///
    /// ```rust
    /// # use ferrous_ioc::{Resolver, ServiceCollection};
    /// struct Config { database_url: String }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_instance(Config { database_url: "postgres://localhost".to_string() });
    ///
    /// let provider = services.build().unwrap();
    /// assert_eq!(provider.get_required::<Config>().database_url, "postgres://localhost");
    /// ```
    pub fn add_instance<T: Send + Sync + 'static>(&mut self, value: T) -> ServiceId {
        self.add(ServiceDescriptor::provided(key_of_type::<T>(), Arc::new(value)))
    }

    /// Registers a pre-built instance under a qualifier.
    pub fn add_named_instance<T: Send + Sync + 'static>(&mut self, qualifier: impl Into<String>, value: T) -> ServiceId {
        let mut descriptor = ServiceDescriptor::provided(key_of_type::<T>(), Arc::new(value));
        descriptor.qualifier = Some(qualifier.into());
        self.add(descriptor)
    }

    /// Registers a pre-built trait object, injectable as `I`.
    ///
    /// ```rust
    /// # use ferrous_ioc::{Resolver, ServiceCollection};
    /// # use std::sync::Arc;
    /// trait Clock: Send + Sync { fn now(&self) -> u64; }
    /// struct Fixed;
    /// impl Clock for Fixed { fn now(&self) -> u64 { 7 } }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_instance_trait::<dyn Clock>(Arc::new(Fixed));
    /// let provider = services.build().unwrap();
    /// assert_eq!(provider.get_required_trait::<dyn Clock>().now(), 7);
    /// ```
    pub fn add_instance_trait<I: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<I>) -> ServiceId {
        let stored: AnyArc = Arc::new(value);
        self.add(ServiceDescriptor::provided(key_of_trait::<I>(), stored))
    }

    pub fn descriptor(&self, id: ServiceId) -> Option<&ServiceDescriptor> {
        self.descriptors.get(id.0)
    }

    /// Every descriptor in discovery order.
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub(crate) fn into_descriptors(self) -> Vec<ServiceDescriptor> {
        self.descriptors
    }

    /// Resolves and instantiates every service with the default configuration.
    ///
    /// No partially built provider is returned: any missing, ambiguous or
    /// circular dependency, and any failing constructor or hook, fails the
    /// whole build.
    pub fn build(self) -> DiResult<ServiceProvider> {
        self.build_with(InjectorConfig::new())
    }

    /// Resolves and instantiates every service with `config`.
    ///
    /// With `run_in_new_thread` the work happens on a named worker thread
    /// that the caller joins.
    pub fn build_with(self, config: InjectorConfig) -> DiResult<ServiceProvider> {
        if !config.settings.run_in_new_thread {
            return bootstrap(self.descriptors, config).map(ServiceProvider::new);
        }

        let descriptors = self.descriptors;
        let worker = thread::Builder::new()
            .name(BOOTSTRAP_THREAD.to_string())
            .spawn(move || bootstrap(descriptors, config))
            .map_err(|e| DiError::Bootstrap(e.to_string()))?;
        let engine = worker
            .join()
            .map_err(|_| DiError::Bootstrap(format!("{} panicked", BOOTSTRAP_THREAD)))??;
        Ok(ServiceProvider::new(engine))
    }
}
