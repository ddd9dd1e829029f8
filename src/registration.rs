//! Service registration DSL.
//!
//! Descriptors are declared through [`ServiceBuilder`]: the constructor
//! signature, field injection points, beans, hooks and interception are
//! spelled out explicitly and erased into a [`ServiceDescriptor`].

use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::dependency::{Arguments, Dependency, Injected};
use crate::descriptors::{FacadeSpec, FieldPoint, Interception, Origin, Provision, ServiceDescriptor};
use crate::error::{BoxError, DiError};
use crate::interception::{Facade, ProxyHandle, ProxyParts};
use crate::key::{key_of_trait, key_of_type};
use crate::marker::Marker;
use crate::scope::Scope;

/// Type-erased Arc for storage
pub type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Ctor = Arc<dyn Fn(&Arguments) -> Result<AnyArc, BoxError> + Send + Sync>;
pub(crate) type BeanFactory = Arc<dyn Fn(&AnyArc) -> Result<AnyArc, BoxError> + Send + Sync>;
pub(crate) type Hook = Arc<dyn Fn(&AnyArc) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type FieldSetter = Arc<dyn Fn(&AnyArc, &Injected) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type Upcast = Arc<dyn Fn(&AnyArc) -> Option<AnyArc> + Send + Sync>;

fn typed<T: 'static>(any: &AnyArc) -> Result<&T, BoxError> {
    any.downcast_ref::<T>()
        .ok_or_else(|| DiError::TypeMismatch(type_name::<T>()).into())
}

fn erase_hook<T, F>(f: F) -> Hook
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(move |any: &AnyArc| f(typed::<T>(any)?))
}

/// Typed builder for one service descriptor.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Dependency, Resolver, ServiceCollection, ServiceDescriptor};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".into() }
/// }
///
/// struct Front { greeter: Arc<dyn Greeter> }
///
/// let mut services = ServiceCollection::new();
/// services.add(
///     ServiceDescriptor::service::<English>()
///         .provides::<dyn Greeter>(|e| e)
///         .constructor(|_| Ok(English)),
/// );
/// services.add(
///     ServiceDescriptor::service::<Front>()
///         .depends_on(Dependency::of_trait::<dyn Greeter>())
///         .constructor(|args| Ok(Front { greeter: args.get_trait::<dyn Greeter>(0)? })),
/// );
///
/// let provider = services.build().unwrap();
/// assert_eq!(provider.get_required::<Front>().greeter.greet(), "hello");
/// ```
pub struct ServiceBuilder<T> {
    descriptor: ServiceDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ServiceBuilder<T> {
    pub(crate) fn new(origin: Origin, marker: Marker) -> Self {
        let mut descriptor = ServiceDescriptor::empty(key_of_type::<T>(), origin);
        descriptor.markers.push(marker);
        Self {
            descriptor,
            _marker: PhantomData,
        }
    }

    /// Adds a capability marker.
    pub fn marker(mut self, marker: Marker) -> Self {
        if !self.descriptor.markers.contains(&marker) {
            self.descriptor.markers.push(marker);
        }
        self
    }

    pub fn qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.descriptor.qualifier = Some(qualifier.into());
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.descriptor.scope = scope;
        self
    }

    /// Makes the service injectable as the trait object `I`.
    pub fn provides<I>(mut self, cast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let upcast: Upcast = Arc::new(move |any: &AnyArc| {
            let concrete = any.clone().downcast::<T>().ok()?;
            Some(Arc::new(cast(concrete)) as AnyArc)
        });
        self.descriptor.provisions.push(Provision {
            key: key_of_trait::<I>(),
            upcast,
        });
        self
    }

    /// Appends a constructor parameter. Arguments keep declaration order.
    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.descriptor.params.push(dependency);
        self
    }

    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&Arguments) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let ctor: Ctor = Arc::new(move |args: &Arguments| Ok(Arc::new(f(args)?) as AnyArc));
        self.descriptor.origin = Origin::Constructor(ctor);
        self
    }

    /// Declares a field injection point, applied after construction.
    ///
    /// The setter receives the shared instance, so the field needs interior
    /// mutability (`OnceLock`, `Mutex`, ...).
    pub fn field<F>(mut self, dependency: Dependency, setter: F) -> Self
    where
        F: Fn(&T, &Injected) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let setter: FieldSetter =
            Arc::new(move |any: &AnyArc, value: &Injected| setter(typed::<T>(any)?, value));
        self.descriptor.fields.push(FieldPoint { dependency, setter });
        self
    }

    pub fn post_construct<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.descriptor.post_construct = Some(erase_hook(f));
        self
    }

    pub fn pre_destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.descriptor.pre_destroy = Some(erase_hook(f));
        self
    }

    /// Runs once after the whole graph has been materialized.
    pub fn on_startup<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.descriptor.startup = Some(erase_hook(f));
        self
    }

    /// Routes calls to `method` through the aspect service `A`.
    ///
    /// `A` must be registered with
    /// [`ServiceDescriptor::aspect`](crate::ServiceDescriptor::aspect).
    /// Bindings on the same method run in declaration order. Interception
    /// implies [`Scope::Proxy`].
    pub fn intercept<A: Send + Sync + 'static>(mut self, method: impl Into<String>, marker: Marker) -> Self {
        self.descriptor.interceptions.push(Interception {
            method: method.into(),
            aspect: key_of_type::<A>(),
            marker,
        });
        self.descriptor.scope = Scope::Proxy;
        self
    }

    /// Registers the façade handed to consumers of `I`.
    ///
    /// The façade holds a [`ProxyHandle`] and forwards every call through
    /// [`ProxyHandle::invoke`]. Implies [`Scope::Proxy`].
    pub fn proxy<I, F>(mut self, build: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(ProxyHandle<T>) -> Arc<I> + Send + Sync + 'static,
    {
        self.descriptor.facade = Some(FacadeSpec {
            key: key_of_trait::<I>(),
            build: Arc::new(move |parts: ProxyParts| Facade::new(build(ProxyHandle::from_parts(parts)))),
        });
        self.descriptor.scope = Scope::Proxy;
        self
    }

    /// Declares a bean produced from this service's instance.
    ///
    /// `configure` shapes the bean descriptor (qualifier, scope, fields,
    /// hooks). Beans take no constructor parameters: declaring one with
    /// `depends_on` fails resolution.
    pub fn bean<B, F>(mut self, factory: F, configure: impl FnOnce(ServiceBuilder<B>) -> ServiceBuilder<B>) -> Self
    where
        B: Send + Sync + 'static,
        F: Fn(&T) -> Result<B, BoxError> + Send + Sync + 'static,
    {
        let factory: BeanFactory =
            Arc::new(move |parent: &AnyArc| Ok(Arc::new(factory(typed::<T>(parent)?)?) as AnyArc));
        let bean = configure(ServiceBuilder::<B>::new(Origin::Factory(factory), Marker::BEAN));
        self.descriptor.pending_beans.push(bean.build());
        self
    }

    pub fn build(self) -> ServiceDescriptor {
        self.descriptor
    }
}

impl<T: Send + Sync + 'static> From<ServiceBuilder<T>> for ServiceDescriptor {
    fn from(builder: ServiceBuilder<T>) -> Self {
        builder.build()
    }
}
