//! Dependency declarations, their resolved form, and injected values.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::descriptors::ServiceId;
use crate::error::{DiError, DiResult};
use crate::key::{key_of_trait, key_of_type, Key};
use crate::marker::Marker;
use crate::registration::AnyArc;
use crate::traits::ExternalResolver;

/// Whether a parameter takes one producer or all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Multiplicity {
    Single,
    /// Injected as a `Vec` in discovery order.
    Collection,
}

/// A dependency as declared on a service builder.
///
/// ```rust
/// use ferrous_ioc::{Dependency, Marker, Multiplicity};
///
/// trait Plugin: Send + Sync {}
///
/// let db = Dependency::of::<String>().named("primary");
/// assert_eq!(db.qualifier(), Some("primary"));
/// assert!(db.is_required());
///
/// let plugins = Dependency::all_trait::<dyn Plugin>().optional();
/// assert_eq!(plugins.multiplicity(), Multiplicity::Collection);
/// assert!(!plugins.is_required());
///
/// let url = Dependency::of::<String>().marked(Marker::value("db.url"));
/// assert_eq!(url.markers().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Dependency {
    key: Key,
    qualifier: Option<String>,
    required: bool,
    multiplicity: Multiplicity,
    markers: Vec<Marker>,
}

impl Dependency {
    fn new(key: Key, multiplicity: Multiplicity) -> Self {
        Self {
            key,
            qualifier: None,
            required: true,
            multiplicity,
            markers: Vec::new(),
        }
    }

    /// A single concrete `T`, injected as `Arc<T>`.
    pub fn of<T: Send + Sync + 'static>() -> Self {
        Self::new(key_of_type::<T>(), Multiplicity::Single)
    }

    /// A single trait object, injected as `Arc<dyn Trait>`.
    pub fn of_trait<T: ?Sized + Send + Sync + 'static>() -> Self {
        Self::new(key_of_trait::<T>(), Multiplicity::Single)
    }

    /// Every producer of `T`, injected as `Vec<Arc<T>>`.
    pub fn all<T: Send + Sync + 'static>() -> Self {
        Self::new(key_of_type::<T>(), Multiplicity::Collection)
    }

    /// Every producer of a trait, injected as `Vec<Arc<dyn Trait>>`.
    pub fn all_trait<T: ?Sized + Send + Sync + 'static>() -> Self {
        Self::new(key_of_trait::<T>(), Multiplicity::Collection)
    }

    /// Restricts candidates to producers with this qualifier (case-insensitive).
    pub fn named(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// An unresolved optional dependency is injected as absent instead of failing.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn marked(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }
}

/// A dependency parameter during and after resolution.
///
/// Carries the declaration plus the links chosen by the resolver: the bound
/// producers, the eligible set for collections, and the external resolver
/// that claimed the parameter, if any.
#[derive(Clone)]
pub struct DependencyParam {
    declared: Dependency,
    producers: Vec<ServiceId>,
    eligible: Vec<ServiceId>,
    resolver: Option<Arc<dyn ExternalResolver>>,
}

impl DependencyParam {
    pub(crate) fn new(declared: Dependency) -> Self {
        Self {
            declared,
            producers: Vec::new(),
            eligible: Vec::new(),
            resolver: None,
        }
    }

    pub fn key(&self) -> &Key {
        &self.declared.key
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.declared.qualifier()
    }

    pub fn is_required(&self) -> bool {
        self.declared.required
    }

    pub fn is_collection(&self) -> bool {
        self.declared.multiplicity == Multiplicity::Collection
    }

    pub fn markers(&self) -> &[Marker] {
        &self.declared.markers
    }

    /// First marker with this name (case-insensitive).
    pub fn marker(&self, name: &str) -> Option<&Marker> {
        self.declared.markers.iter().find(|m| m.is(name))
    }

    /// Producers bound to this parameter, in discovery order.
    pub fn producers(&self) -> &[ServiceId] {
        &self.producers
    }

    /// Every producer a collection parameter must contain.
    pub fn eligible(&self) -> &[ServiceId] {
        &self.eligible
    }

    pub fn resolver(&self) -> Option<&Arc<dyn ExternalResolver>> {
        self.resolver.as_ref()
    }

    /// True once producers or a resolver are bound.
    pub fn is_resolved(&self) -> bool {
        !self.producers.is_empty() || self.resolver.is_some()
    }

    pub(crate) fn bind_single(&mut self, producer: ServiceId) {
        self.producers = vec![producer];
    }

    pub(crate) fn bind_all(&mut self, producers: Vec<ServiceId>) {
        self.eligible = producers.clone();
        self.producers = producers;
    }

    pub(crate) fn bind_resolver(&mut self, resolver: Arc<dyn ExternalResolver>) {
        self.resolver = Some(resolver);
    }
}

impl fmt::Debug for DependencyParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyParam")
            .field("key", &self.declared.key)
            .field("qualifier", &self.declared.qualifier)
            .field("required", &self.declared.required)
            .field("multiplicity", &self.declared.multiplicity)
            .field("producers", &self.producers)
            .field("external", &self.resolver.is_some())
            .finish()
    }
}

/// A value gathered for one parameter or field.
#[derive(Clone)]
pub enum Injected {
    /// Optional dependency with nothing bound.
    Absent,
    One(AnyArc),
    Many(Vec<AnyArc>),
}

fn downcast_type<T: Send + Sync + 'static>(any: &AnyArc) -> DiResult<Arc<T>> {
    any.clone()
        .downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(type_name::<T>()))
}

fn downcast_trait<T: ?Sized + Send + Sync + 'static>(any: &AnyArc) -> DiResult<Arc<T>> {
    any.downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(DiError::TypeMismatch(type_name::<T>()))
}

impl Injected {
    pub fn is_absent(&self) -> bool {
        matches!(self, Injected::Absent)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        match self {
            Injected::One(any) => downcast_type::<T>(any),
            Injected::Absent => Err(DiError::NotFound(type_name::<T>().to_string())),
            Injected::Many(_) => Err(DiError::TypeMismatch(type_name::<T>())),
        }
    }

    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        match self {
            Injected::One(any) => downcast_trait::<T>(any),
            Injected::Absent => Err(DiError::NotFound(type_name::<T>().to_string())),
            Injected::Many(_) => Err(DiError::TypeMismatch(type_name::<T>())),
        }
    }

    /// `None` when absent or of another type.
    pub fn optional<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.get::<T>().ok()
    }

    pub fn optional_trait<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.get_trait::<T>().ok()
    }

    /// Collection values. An absent optional collection is empty.
    pub fn all<T: Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        match self {
            Injected::Many(items) => items.iter().map(downcast_type::<T>).collect(),
            Injected::Absent => Ok(Vec::new()),
            Injected::One(any) => downcast_type::<T>(any).map(|v| vec![v]),
        }
    }

    pub fn all_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        match self {
            Injected::Many(items) => items.iter().map(downcast_trait::<T>).collect(),
            Injected::Absent => Ok(Vec::new()),
            Injected::One(any) => downcast_trait::<T>(any).map(|v| vec![v]),
        }
    }
}

impl fmt::Debug for Injected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Injected::Absent => f.write_str("Absent"),
            Injected::One(_) => f.write_str("One(..)"),
            Injected::Many(items) => write!(f, "Many({})", items.len()),
        }
    }
}

/// Constructor arguments in declaration order.
///
/// ```rust
/// use ferrous_ioc::{Dependency, Resolver, ServiceCollection, ServiceDescriptor};
/// use std::sync::Arc;
///
/// struct Config { url: &'static str }
/// struct Pool { url: &'static str, size: Option<Arc<usize>> }
///
/// let mut services = ServiceCollection::new();
/// services.add_instance(Config { url: "postgres://localhost" });
/// services.add(
///     ServiceDescriptor::service::<Pool>()
///         .depends_on(Dependency::of::<Config>())
///         .depends_on(Dependency::of::<usize>().optional())
///         .constructor(|args| {
///             let config = args.get::<Config>(0)?;
///             Ok(Pool { url: config.url, size: args.optional::<usize>(1) })
///         }),
/// );
///
/// let pool = services.build().unwrap().get_required::<Pool>();
/// assert_eq!(pool.url, "postgres://localhost");
/// assert!(pool.size.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<Injected>,
}

impl Arguments {
    pub(crate) fn new(values: Vec<Injected>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at `index`.
    pub fn injected(&self, index: usize) -> DiResult<&Injected> {
        self.values
            .get(index)
            .ok_or_else(|| DiError::NotFound(format!("constructor argument #{}", index)))
    }

    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> DiResult<Arc<T>> {
        self.injected(index)?.get::<T>()
    }

    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> DiResult<Arc<T>> {
        self.injected(index)?.get_trait::<T>()
    }

    pub fn optional<T: Send + Sync + 'static>(&self, index: usize) -> Option<Arc<T>> {
        self.values.get(index).and_then(Injected::optional::<T>)
    }

    pub fn optional_trait<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Option<Arc<T>> {
        self.values.get(index).and_then(Injected::optional_trait::<T>)
    }

    pub fn all<T: Send + Sync + 'static>(&self, index: usize) -> DiResult<Vec<Arc<T>>> {
        self.injected(index)?.all::<T>()
    }

    pub fn all_trait<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> DiResult<Vec<Arc<T>>> {
        self.injected(index)?.all_trait::<T>()
    }
}
